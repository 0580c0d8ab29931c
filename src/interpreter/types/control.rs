//! Control signals produced by statement execution

use super::values::Val;
use std::time::Duration;

/* ===================== Control Flow ===================== */

/// Result of executing one statement
///
/// `EnterBlock` means the cursor already sits on the first line after a
/// block header; the stream runner resolves the body's extent and decides
/// what to do with it. `Return` only ends a function-call stream and is
/// ignored everywhere else.
#[derive(Debug, Clone, PartialEq)]
pub enum Control {
    Normal,
    EnterBlock(Block),
    Return(Val),
}

/// Block header details carried by `Control::EnterBlock`
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    /// `taken` is the already-evaluated condition
    If { taken: bool },
    While { cond: String },
    /// Bounds are evaluated once, when the header runs
    For {
        var: String,
        from: f64,
        to: f64,
        step: f64,
    },
    Function { name: String, params: Vec<String> },
    Every {
        period: Duration,
        name: Option<String>,
    },
    Tick {
        delay: Duration,
        name: Option<String>,
    },
}

/* ===================== Stream Outcome ===================== */

/// How a stream over a line range ended
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    /// Ran off the end of the range
    Completed,
    /// A function body produced `RETURN`
    Returned(Val),
    /// The run was halted while the stream was active
    Halted,
}
