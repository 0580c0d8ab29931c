//! Dialogs

use anyhow::Result;
use std::collections::VecDeque;
use std::io::{BufRead, Write};
use std::sync::{Mutex, PoisonError};

use super::Dialog;

/// Terminal dialogs: alerts go to stdout, prompts read one stdin line
#[derive(Debug, Default, Clone, Copy)]
pub struct StdDialog;

impl Dialog for StdDialog {
    fn alert(&self, text: &str) -> Result<()> {
        let mut out = std::io::stdout().lock();
        writeln!(out, "[alert] {}", text)?;
        Ok(())
    }

    fn prompt(&self, text: &str) -> Result<Option<String>> {
        {
            let mut out = std::io::stdout().lock();
            write!(out, "{} ", text)?;
            out.flush()?;
        }
        let mut line = String::new();
        let read = std::io::stdin().lock().read_line(&mut line)?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }
}

/// Canned answers, for embedding without a user
#[derive(Debug, Default)]
pub struct ScriptedDialog {
    answers: Mutex<VecDeque<Option<String>>>,
    alerts: Mutex<Vec<String>>,
}

impl ScriptedDialog {
    pub fn new(answers: impl IntoIterator<Item = Option<String>>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().collect()),
            alerts: Mutex::default(),
        }
    }

    pub fn alerts(&self) -> Vec<String> {
        self.alerts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Dialog for ScriptedDialog {
    fn alert(&self, text: &str) -> Result<()> {
        self.alerts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(text.to_string());
        Ok(())
    }

    /// Answers run out into `None`, as if the prompt was dismissed
    fn prompt(&self, _text: &str) -> Result<Option<String>> {
        Ok(self
            .answers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .flatten())
    }
}
