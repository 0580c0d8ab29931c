//! Line sequence and cursor types

use sha2::{Digest, Sha256};

/// Immutable line sequence of one run
///
/// Lines are stored trimmed; indices match the source's line numbers
/// (zero-based).
#[derive(Debug, Clone, Default)]
pub struct Program {
    lines: Vec<String>,
    digest: String,
}

impl Program {
    pub fn from_source(source: &str) -> Self {
        let lines = source.lines().map(|l| l.trim().to_string()).collect();
        let digest = format!("{:x}", Sha256::digest(source.as_bytes()));
        Self { lines, digest }
    }

    /// Single-statement program, used by key handlers
    pub fn single(line: &str) -> Self {
        Self::from_source(line)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn line(&self, index: usize) -> &str {
        self.lines.get(index).map(String::as_str).unwrap_or("")
    }

    /// SHA-256 of the source text, hex encoded (short form used in logs)
    pub fn digest(&self) -> &str {
        &self.digest[..12.min(self.digest.len())]
    }
}

/// Whether a trimmed line carries no statement
pub fn is_skippable(line: &str) -> bool {
    line.is_empty() || line.starts_with("//") || line.starts_with('#')
}

/// Position of one stream inside its line range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pos: usize,
    end: usize,
}

impl Cursor {
    pub fn new(start: usize, end: usize) -> Self {
        Self { pos: start, end }
    }

    /// Take the current line index and step past it
    pub fn advance(&mut self) -> Option<usize> {
        if self.pos >= self.end {
            return None;
        }
        let index = self.pos;
        self.pos += 1;
        Some(index)
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn jump_to(&mut self, index: usize) {
        self.pos = index.min(self.end);
    }
}
