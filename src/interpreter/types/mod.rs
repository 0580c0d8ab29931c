//! Type definitions for the interpreter
//!
//! - Runtime values (Val)
//! - Control signals (Control, Block, Flow)
//! - Classified statements (Stmt)
//! - Line sequence and cursor (Program, Cursor)

pub mod control;
pub mod program;
pub mod statement;
pub mod values;

// Re-export all types for convenient access
pub use control::{Block, Control, Flow};
pub use program::{is_skippable, Cursor, Program};
pub use statement::{ArithOp, DeclKind, KeyPhase, Stmt, Terminator};
pub use values::{format_number, Val};
