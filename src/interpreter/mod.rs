//! # Line-oriented interpreter
//!
//! A program is a plain sequence of lines. Nothing is parsed ahead of time:
//! each line is classified when it is reached, and block extents are found
//! by scanning forward from the header when the header runs.
//!
//! ## Layout
//!
//! - `parser`: line classification into `Stmt`
//! - `expressions`: the default expression evaluator
//! - `environment`: scopes with parent fallback and constants
//! - `blocks`: block extent resolution
//! - `statements`: one handler per statement form
//! - `exec_loop`: the per-stream cursor loop
//! - `scheduler`: loop, timer and key-handler tasks
//! - `functions`: function table and calls
//! - `runtime`: run lifecycle (`start`/`stop`)
//! - `validator`: static check without running

pub mod blocks;
pub mod ecs;
pub mod environment;
pub mod errors;
pub mod exec_loop;
pub mod expressions;
pub mod functions;
pub mod parser;
pub mod runtime;
pub mod scheduler;
pub mod statements;
pub mod types;
pub mod validator;

#[cfg(test)]
mod tests;

// Re-export commonly used items
pub use environment::Scope;
pub use errors::RuntimeError;
pub use expressions::{Bindings, Evaluator, ExprError, ExprEvaluator};
pub use parser::classify;
pub use runtime::{RunContext, Runtime, RuntimeSettings, StopHandle};
pub use types::{Program, Stmt, Val};
pub use validator::{check, Diagnostic};
