//! Line classifier - PEST-based parser for the command grammar
//!
//! Turns one trimmed program line into a typed `Stmt`. There is no parse
//! tree above the line level: block structure is resolved at run time by
//! the block resolver.

use pest::iterators::{Pair, Pairs};
use pest::Parser;
use pest_derive::Parser;

use super::errors::RuntimeError;
use super::types::{ArithOp, DeclKind, KeyPhase, Stmt, Terminator};


/* ===================== PEST Parser ===================== */

#[derive(Parser)]
#[grammar = "interpreter/parser/line.pest"]
struct LineParser;

pub type ParseResult<T> = Result<T, RuntimeError>;

/* ===================== Public API ===================== */

/// Classify one trimmed, non-empty, non-comment line
///
/// Fails with `UnknownStatement` carrying the raw line when no command form
/// matches the whole line.
pub fn classify(line: &str) -> ParseResult<Stmt> {
    let unknown = || RuntimeError::UnknownStatement {
        line: line.to_string(),
    };

    let mut pairs = LineParser::parse(Rule::line, line).map_err(|_| unknown())?;
    let stmt = pairs
        .next()
        .and_then(|line_pair| line_pair.into_inner().next())
        .ok_or_else(unknown)?;

    build_statement(stmt).ok_or_else(unknown)
}

/// Split a comma-separated argument list at top level
///
/// Commas inside quotes, parentheses, brackets and braces do not split.
/// An empty or all-whitespace list yields no arguments.
pub fn split_args(text: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for ch in text.chars() {
        match quote {
            Some(q) => {
                if ch == q {
                    quote = None;
                }
                current.push(ch);
            }
            None => match ch {
                '"' | '\'' => {
                    quote = Some(ch);
                    current.push(ch);
                }
                '(' | '[' | '{' => {
                    depth += 1;
                    current.push(ch);
                }
                ')' | ']' | '}' => {
                    depth = depth.saturating_sub(1);
                    current.push(ch);
                }
                ',' if depth == 0 => {
                    args.push(current.trim().to_string());
                    current.clear();
                }
                _ => current.push(ch),
            },
        }
    }

    if !current.trim().is_empty() || !args.is_empty() {
        args.push(current.trim().to_string());
    }
    args
}

/* ===================== Statement Builder ===================== */

/// Next captured piece of text, or `None` if the grammar produced fewer
/// captures than the builder expects
fn text(inner: &mut Pairs<Rule>) -> Option<String> {
    inner.next().map(|p| p.as_str().to_string())
}

fn number<T: std::str::FromStr>(inner: &mut Pairs<Rule>) -> Option<T> {
    inner.next().and_then(|p| p.as_str().parse().ok())
}

fn build_statement(pair: Pair<Rule>) -> Option<Stmt> {
    let rule = pair.as_rule();
    let mut inner = pair.into_inner();
    let i = &mut inner;

    let stmt = match rule {
        // Structure
        Rule::endif_stmt => Stmt::EndIf,
        Rule::else_stmt => Stmt::Else,
        Rule::endwhile_stmt => Stmt::Terminator(Terminator::EndWhile),
        Rule::endfor_stmt => Stmt::Terminator(Terminator::EndFor),
        Rule::endfn_stmt => Stmt::Terminator(Terminator::EndFn),
        Rule::endevery_stmt => Stmt::Terminator(Terminator::EndEvery),
        Rule::end_stmt => Stmt::Terminator(Terminator::End),

        // Declarations & variables
        Rule::set_stmt | Rule::let_stmt => Stmt::Set {
            name: text(i)?,
            expr: text(i)?,
        },
        Rule::const_stmt => Stmt::Const {
            name: text(i)?,
            expr: text(i)?,
        },
        Rule::alias_stmt => Stmt::Alias {
            alias: text(i)?,
            target: text(i)?,
        },
        Rule::declare_stmt => {
            let kind = match text(i)?.to_ascii_uppercase().as_str() {
                "STRUCT" => DeclKind::Struct,
                "ENUM" => DeclKind::Enum,
                _ => DeclKind::Namespace,
            };
            Stmt::Declare {
                kind,
                body: text(i)?,
            }
        }

        // Math & random
        Rule::arith_stmt => {
            let op = match text(i)?.to_ascii_uppercase().as_str() {
                "ADD" => ArithOp::Add,
                "SUB" => ArithOp::Sub,
                "MUL" => ArithOp::Mul,
                "DIV" => ArithOp::Div,
                _ => ArithOp::Mod,
            };
            Stmt::Arith {
                op,
                name: text(i)?,
                expr: text(i)?,
            }
        }
        Rule::random_stmt => Stmt::Random {
            min: text(i)?,
            max: text(i)?,
            into: text(i)?,
        },
        Rule::math_stmt => Stmt::Math {
            func: text(i)?,
            expr: text(i)?,
            into: text(i)?,
        },

        // Blocks
        Rule::if_stmt => Stmt::If { cond: text(i)? },
        Rule::while_stmt => Stmt::While { cond: text(i)? },
        Rule::for_stmt => Stmt::For {
            var: text(i)?,
            from: text(i)?,
            to: text(i)?,
            step: text(i),
        },
        Rule::function_stmt => Stmt::Function {
            name: text(i)?,
            params: split_args(&text(i)?),
        },
        Rule::call_stmt => Stmt::Call {
            name: text(i)?,
            args: split_args(&text(i)?),
            into: text(i),
        },
        Rule::return_stmt => Stmt::Return { expr: text(i) },

        // Lists & records
        Rule::array_stmt => Stmt::Array {
            name: text(i)?,
            literal: text(i)?,
        },
        Rule::push_stmt => Stmt::Push {
            expr: text(i)?,
            into: text(i)?,
        },
        Rule::pop_stmt => Stmt::Pop {
            source: text(i)?,
            into: text(i)?,
        },
        Rule::len_stmt => Stmt::Len {
            source: text(i)?,
            into: text(i)?,
        },
        Rule::object_stmt => Stmt::Object {
            name: text(i)?,
            literal: text(i)?,
        },
        Rule::setfield_stmt => Stmt::SetField {
            object: text(i)?,
            field: text(i)?,
            expr: text(i)?,
        },
        Rule::getfield_stmt => Stmt::GetField {
            object: text(i)?,
            field: text(i)?,
            into: text(i)?,
        },
        Rule::merge_stmt => Stmt::Merge {
            left: text(i)?,
            right: text(i)?,
            into: text(i)?,
        },

        // I/O & debug
        Rule::print_stmt => Stmt::Print { expr: text(i)? },
        Rule::alert_stmt => Stmt::Alert { expr: text(i)? },
        Rule::input_stmt => Stmt::Input {
            prompt: text(i)?,
            into: text(i)?,
        },
        Rule::trace_stmt => Stmt::Trace {
            on: text(i)?.eq_ignore_ascii_case("ON"),
        },

        // Time & timers
        Rule::sleep_stmt => Stmt::Sleep { millis: number(i)? },
        Rule::time_stmt => Stmt::TimeNow { into: text(i)? },
        Rule::every_stmt => Stmt::Every {
            millis: number(i)?,
            name: text(i),
        },
        Rule::tick_stmt => Stmt::Tick {
            millis: number(i)?,
            name: text(i),
        },
        Rule::cancel_stmt => Stmt::Cancel { name: text(i)? },
        Rule::halt_stmt => Stmt::Halt,

        // Drawing
        Rule::canvas_stmt => Stmt::CanvasSize {
            width: number(i)?,
            height: number(i)?,
        },
        Rule::color_stmt => Stmt::Color { expr: text(i)? },
        Rule::clear_stmt => Stmt::Clear,
        Rule::rect_stmt => Stmt::Rect {
            x: text(i)?,
            y: text(i)?,
            w: text(i)?,
            h: text(i)?,
        },
        Rule::circle_stmt => Stmt::Circle {
            x: text(i)?,
            y: text(i)?,
            r: text(i)?,
        },
        Rule::line_stmt => Stmt::Line {
            x1: text(i)?,
            y1: text(i)?,
            x2: text(i)?,
            y2: text(i)?,
        },
        Rule::text_stmt => Stmt::Text {
            x: text(i)?,
            y: text(i)?,
            expr: text(i)?,
        },
        Rule::font_stmt => Stmt::Font { expr: text(i)? },

        // Keyboard
        Rule::onkey_stmt => {
            let phase = if text(i)?.eq_ignore_ascii_case("DOWN") {
                KeyPhase::Down
            } else {
                KeyPhase::Up
            };
            Stmt::OnKey {
                phase,
                key: text(i)?,
                stmt: text(i)?,
            }
        }
        Rule::key_stmt => Stmt::Key {
            key: text(i)?,
            into: text(i)?,
        },

        // Storage
        Rule::store_stmt => Stmt::Store {
            key: text(i)?,
            expr: text(i)?,
        },
        Rule::load_stmt => Stmt::Load {
            key: text(i)?,
            into: text(i)?,
        },
        Rule::delete_stmt => Stmt::Delete { key: text(i)? },
        Rule::keys_stmt => Stmt::Keys { into: text(i)? },

        // Network
        Rule::fetch_stmt => Stmt::Fetch {
            url: text(i)?,
            into: text(i)?,
        },
        Rule::fetchjson_stmt => Stmt::FetchJson {
            url: text(i)?,
            into: text(i)?,
        },

        // Sound
        Rule::beep_stmt => Stmt::Beep {
            freq: number(i)?,
            millis: number(i)?,
        },
        Rule::playaudio_stmt => Stmt::PlayAudio { url: text(i)? },

        // Entities
        Rule::entity_stmt => Stmt::EntityNew { into: text(i)? },
        Rule::comp_set_stmt => Stmt::CompSet {
            entity: text(i)?,
            component: text(i)?,
            value: text(i)?,
        },
        Rule::comp_get_stmt => Stmt::CompGet {
            entity: text(i)?,
            component: text(i)?,
            into: text(i)?,
        },
        Rule::comp_has_stmt => Stmt::CompHas {
            entity: text(i)?,
            component: text(i)?,
            into: text(i)?,
        },
        Rule::comp_del_stmt => Stmt::CompDel {
            entity: text(i)?,
            component: text(i)?,
        },

        _ => return None,
    };

    Some(stmt)
}
