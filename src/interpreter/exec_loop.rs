//! Core execution loop
//!
//! `run_range` drives one stream: it walks a cursor through a line range,
//! classifies each line, hands it to the statement dispatcher and acts on
//! the control signal that comes back. Every stream of a run (top level,
//! loop instance, timer trigger, function call, key handler) goes through
//! here.

use std::future::Future;
use std::ops::Range;
use std::pin::Pin;
use std::sync::Arc;

use tracing::trace;

use super::blocks::{find_end, BlockKind};
use super::environment::Scope;
use super::errors::RuntimeError;
use super::parser::classify;
use super::runtime::RunContext;
use super::scheduler;
use super::statements;
use super::types::{is_skippable, Control, Cursor, Flow, Program, Stmt};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What started a stream; decides whether `RETURN` ends it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    TopLevel,
    Loop,
    Timer,
    Function,
    Handler,
}

/// One sequential execution over a line range
#[derive(Debug, Clone)]
pub struct Stream {
    pub ctx: Arc<RunContext>,
    pub program: Arc<Program>,
    pub scope: Arc<Scope>,
    pub kind: StreamKind,
}

impl Stream {
    /// Stream over the run's own program
    pub fn new(ctx: Arc<RunContext>, scope: Arc<Scope>, kind: StreamKind) -> Self {
        let program = ctx.program.clone();
        Self {
            ctx,
            program,
            scope,
            kind,
        }
    }

    /// Same program and scope, different kind (loop bodies)
    pub fn fork(&self, kind: StreamKind) -> Self {
        Self {
            kind,
            ..self.clone()
        }
    }
}

/* ===================== Public API ===================== */

/// Run the lines `range` of the stream's program
///
/// Stops at the end of the range, at a `RETURN` in a function stream, when
/// the run is halted, or on the first error.
pub fn run_range<'a>(stream: &'a Stream, range: Range<usize>) -> BoxFuture<'a, Result<Flow, RuntimeError>> {
    Box::pin(async move {
        let mut cursor = Cursor::new(range.start, range.end);

        while let Some(index) = cursor.advance() {
            if stream.ctx.is_halted() {
                return Ok(Flow::Halted);
            }

            let line = stream.program.line(index);
            if is_skippable(line) {
                continue;
            }

            let stmt = classify(line)?;
            trace!(line = index + 1, kind = ?stream.kind, "{}", line);

            if stream.ctx.trace_enabled() {
                stream.ctx.output(&format!("> {}", line));
            }

            match stmt {
                // Reached by running off the end of a taken IF branch
                Stmt::Else => {
                    let end = find_end(&stream.program, index, cursor.end(), BlockKind::If)?;
                    cursor.jump_to(end + 1);
                    continue;
                }
                // Stray terminators are inert
                Stmt::EndIf | Stmt::Terminator(_) => continue,
                _ => {}
            }

            match statements::execute(&stmt, stream).await? {
                Control::Normal => {}
                Control::Return(value) => {
                    if stream.kind == StreamKind::Function {
                        return Ok(Flow::Returned(value));
                    }
                }
                Control::EnterBlock(block) => {
                    scheduler::enter_block(stream, block, index, &mut cursor)?;
                }
            }
        }

        if stream.ctx.is_halted() {
            return Ok(Flow::Halted);
        }
        Ok(Flow::Completed)
    })
}
