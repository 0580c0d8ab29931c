pub mod cli;
pub mod config;
pub mod host;
pub mod init;
pub mod interpreter;

// Re-export main types
pub use interpreter::{Runtime, RuntimeError, RuntimeSettings, StopHandle, Val};

// Re-export init API for convenience
pub use init::{initialize, InitBuilder, InitOptions};
