//! Runtime error kinds
//!
//! Every error aborts the stream that raised it. Errors from the top-level
//! stream are returned by `Runtime::start`; errors from background streams
//! are recorded on the run and surfaced by `Runtime::settle`.

use super::expressions::ExprError;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Undefined: {name}")]
    UndefinedName { name: String },

    #[error("Cannot assign CONST {name}")]
    ConstAssignment { name: String },

    #[error("Unknown statement: {line}")]
    UnknownStatement { line: String },

    #[error("Bad expression: {expr}")]
    BadExpression {
        expr: String,
        #[source]
        source: ExprError,
    },

    #[error("No such function: {name}")]
    UndefinedFunction { name: String },

    #[error("Unterminated {keyword} block: {line}")]
    UnterminatedBlock { keyword: &'static str, line: String },

    #[error("No drawing surface attached")]
    MissingSurface,

    #[error("Type mismatch: {message}")]
    TypeMismatch { message: String },

    #[error("{command} failed")]
    Host {
        command: &'static str,
        #[source]
        source: BoxError,
    },
}

impl RuntimeError {
    pub fn type_mismatch(message: impl Into<String>) -> Self {
        RuntimeError::TypeMismatch {
            message: message.into(),
        }
    }

    pub fn host(command: &'static str, source: impl Into<BoxError>) -> Self {
        RuntimeError::Host {
            command,
            source: source.into(),
        }
    }
}
