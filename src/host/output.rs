//! Output sinks

use std::io::Write;
use std::sync::{Mutex, PoisonError};
use tracing::info;

use super::OutputSink;

/// Default sink: every line becomes an `info` event on `linescript::output`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl OutputSink for TracingSink {
    fn write(&self, text: &str) {
        info!(target: "linescript::output", "{}", text);
    }
}

/// Plain stdout, one line per write
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn write(&self, text: &str) {
        let mut out = std::io::stdout().lock();
        // A closed stdout is not the program's problem
        let _ = writeln!(out, "{}", text);
    }
}

/// Collects lines in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl OutputSink for MemorySink {
    fn write(&self, text: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(text.to_string());
    }
}
