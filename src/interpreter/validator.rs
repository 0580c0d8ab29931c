//! Static program check
//!
//! Classifies every line and resolves every block header against the whole
//! program without running anything. Used by `linescript check`.
//!
//! Headers are resolved against the end of the program, not the enclosing
//! block, so a terminator that only exists after an enclosing block's own
//! terminator is accepted here and still fails at run time.

use super::blocks::{find_branch, find_end, BlockKind};
use super::errors::RuntimeError;
use super::parser::classify;
use super::types::{is_skippable, Program, Stmt};

/// One problem found by `check`
#[derive(Debug)]
pub struct Diagnostic {
    /// One-based line number
    pub line: usize,
    pub error: RuntimeError,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.error)
    }
}

fn header_kind(stmt: &Stmt) -> Option<BlockKind> {
    match stmt {
        Stmt::While { .. } => Some(BlockKind::While),
        Stmt::For { .. } => Some(BlockKind::For),
        Stmt::Function { .. } => Some(BlockKind::Function),
        Stmt::Every { .. } => Some(BlockKind::Every),
        Stmt::Tick { .. } => Some(BlockKind::Tick),
        _ => None,
    }
}

/// Report unknown statements and unterminated blocks, in line order
pub fn check(program: &Program) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let limit = program.len();

    for index in 0..limit {
        let line = program.line(index);
        if is_skippable(line) {
            continue;
        }

        let resolved = classify(line).and_then(|stmt| match stmt {
            Stmt::If { .. } => find_branch(program, index, limit).map(|_| ()),
            other => match header_kind(&other) {
                Some(kind) => find_end(program, index, limit, kind).map(|_| ()),
                None => Ok(()),
            },
        });

        if let Err(error) = resolved {
            diagnostics.push(Diagnostic {
                line: index + 1,
                error,
            });
        }
    }

    diagnostics
}
