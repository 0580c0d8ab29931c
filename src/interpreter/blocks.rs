//! Block boundary resolution
//!
//! There is no parse tree: a block's extent is found by scanning forward
//! from its header and counting same-kind headers and terminators. Only
//! headers of the same kind affect the depth, so a WHILE inside a FOR does
//! not disturb the search for ENDFOR.

use super::errors::RuntimeError;
use super::parser::classify;
use super::types::{is_skippable, Program, Stmt, Terminator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    If,
    While,
    For,
    Function,
    Every,
    Tick,
}

impl BlockKind {
    pub fn keyword(self) -> &'static str {
        match self {
            BlockKind::If => "IF",
            BlockKind::While => "WHILE",
            BlockKind::For => "FOR",
            BlockKind::Function => "FUNCTION",
            BlockKind::Every => "EVERY",
            BlockKind::Tick => "TICK",
        }
    }

    fn opens(self, stmt: &Stmt) -> bool {
        matches!(
            (self, stmt),
            (BlockKind::If, Stmt::If { .. })
                | (BlockKind::While, Stmt::While { .. })
                | (BlockKind::For, Stmt::For { .. })
                | (BlockKind::Function, Stmt::Function { .. })
                | (BlockKind::Every, Stmt::Every { .. })
                | (BlockKind::Tick, Stmt::Tick { .. })
        )
    }

    fn closes(self, stmt: &Stmt) -> bool {
        matches!(
            (self, stmt),
            (BlockKind::If, Stmt::EndIf)
                | (BlockKind::While, Stmt::Terminator(Terminator::EndWhile))
                | (BlockKind::For, Stmt::Terminator(Terminator::EndFor))
                | (BlockKind::Function, Stmt::Terminator(Terminator::EndFn))
                | (BlockKind::Every, Stmt::Terminator(Terminator::EndEvery))
                | (BlockKind::Tick, Stmt::Terminator(Terminator::End))
        )
    }
}

/// Where a false IF condition resumes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    Else(usize),
    EndIf(usize),
}

/// Classified statements of `(header, limit)`, skipping blanks, comments and
/// lines that match no command
fn statements(
    program: &Program,
    header: usize,
    limit: usize,
) -> impl Iterator<Item = (usize, Stmt)> + '_ {
    (header + 1..limit.min(program.len())).filter_map(move |i| {
        let line = program.line(i);
        if is_skippable(line) {
            return None;
        }
        classify(line).ok().map(|stmt| (i, stmt))
    })
}

fn unterminated(program: &Program, header: usize, kind: BlockKind) -> RuntimeError {
    RuntimeError::UnterminatedBlock {
        keyword: kind.keyword(),
        line: program.line(header).to_string(),
    }
}

/// Index of the terminator matching the header at `header`
///
/// The search stops at `limit` (exclusive), the end of the enclosing range.
pub fn find_end(
    program: &Program,
    header: usize,
    limit: usize,
    kind: BlockKind,
) -> Result<usize, RuntimeError> {
    let mut depth = 0usize;
    for (i, stmt) in statements(program, header, limit) {
        if kind.opens(&stmt) {
            depth += 1;
        } else if kind.closes(&stmt) {
            if depth == 0 {
                return Ok(i);
            }
            depth -= 1;
        }
    }
    Err(unterminated(program, header, kind))
}

/// The ELSE or ENDIF at the same nesting depth as the IF at `header`
pub fn find_branch(program: &Program, header: usize, limit: usize) -> Result<Branch, RuntimeError> {
    let mut depth = 0usize;
    for (i, stmt) in statements(program, header, limit) {
        match stmt {
            Stmt::If { .. } => depth += 1,
            Stmt::Else if depth == 0 => return Ok(Branch::Else(i)),
            Stmt::EndIf if depth == 0 => return Ok(Branch::EndIf(i)),
            Stmt::EndIf => depth -= 1,
            _ => {}
        }
    }
    Err(unterminated(program, header, BlockKind::If))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program(lines: &[&str]) -> Program {
        Program::from_source(&lines.join("\n"))
    }

    #[test]
    fn test_nested_same_kind() {
        let p = program(&[
            "WHILE a < 3",
            "WHILE b < 3",
            "ADD b BY 1",
            "ENDWHILE",
            "ADD a BY 1",
            "ENDWHILE",
        ]);
        assert_eq!(find_end(&p, 0, p.len(), BlockKind::While).unwrap(), 5);
        assert_eq!(find_end(&p, 1, p.len(), BlockKind::While).unwrap(), 3);
    }

    #[test]
    fn test_other_kinds_do_not_count() {
        let p = program(&[
            "FOR i FROM 0 TO 2",
            "WHILE x",
            "ENDWHILE",
            "ENDFOR",
        ]);
        assert_eq!(find_end(&p, 0, p.len(), BlockKind::For).unwrap(), 3);
    }

    #[test]
    fn test_tick_ends_at_end() {
        let p = program(&["TICK 0", "ADD n BY 1", "end"]);
        assert_eq!(find_end(&p, 0, p.len(), BlockKind::Tick).unwrap(), 2);
    }

    #[test]
    fn test_unterminated_respects_limit() {
        let p = program(&["FUNCTION f()", "RETURN 1", "ENDFN"]);
        assert!(find_end(&p, 0, p.len(), BlockKind::Function).is_ok());
        match find_end(&p, 0, 2, BlockKind::Function) {
            Err(RuntimeError::UnterminatedBlock { keyword, line }) => {
                assert_eq!(keyword, "FUNCTION");
                assert_eq!(line, "FUNCTION f()");
            }
            other => panic!("Expected UnterminatedBlock, got {:?}", other),
        }
    }

    #[test]
    fn test_branch_skips_nested_if() {
        let p = program(&[
            "IF a THEN",
            "IF b THEN",
            "PRINT 1",
            "ELSE",
            "PRINT 2",
            "ENDIF",
            "ELSE",
            "PRINT 3",
            "ENDIF",
        ]);
        assert_eq!(find_branch(&p, 0, p.len()).unwrap(), Branch::Else(6));
        assert_eq!(find_branch(&p, 1, p.len()).unwrap(), Branch::Else(3));
        assert_eq!(find_end(&p, 6, p.len(), BlockKind::If).unwrap(), 8);
    }

    #[test]
    fn test_branch_without_else() {
        let p = program(&["IF a THEN", "// comment", "PRINT 1", "ENDIF"]);
        assert_eq!(find_branch(&p, 0, p.len()).unwrap(), Branch::EndIf(3));
        assert!(find_branch(&p, 0, 3).is_err());
    }
}
