//! Host capabilities
//!
//! Everything a program can touch outside its own variables goes through
//! one of these traits: printed output, the drawing surface, key/value
//! storage, network fetch, audio, keyboard state and dialogs. The runtime
//! only sees trait objects, so an embedder swaps any of them out through
//! `Host` (or `InitBuilder`).
//!
//! Capability calls return `anyhow::Result`; the dispatcher wraps failures
//! into `RuntimeError::Host` with the command that made the call.

use anyhow::Result;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::interpreter::expressions::{Evaluator, ExprEvaluator};
use crate::interpreter::types::KeyPhase;

pub mod audio;
pub mod dialog;
pub mod keyboard;
pub mod network;
pub mod output;
pub mod storage;
pub mod surface;

pub use audio::LogAudio;
pub use dialog::{ScriptedDialog, StdDialog};
pub use keyboard::KeyboardState;
pub use network::HttpNetwork;
pub use output::{MemorySink, StdoutSink, TracingSink};
pub use storage::{FileStore, MemoryStore};
pub use surface::{DrawOp, RecordingSurface};

/* ===================== Capability Traits ===================== */

/// Destination of PRINT and trace output
pub trait OutputSink: Send + Sync {
    fn write(&self, text: &str);
}

/// 2D drawing surface
///
/// Colors are CSS color strings; the runtime tracks the current color and
/// passes it with every fill or stroke.
pub trait Surface: Send + Sync {
    fn resize(&self, width: u32, height: u32);
    fn clear(&self);
    fn fill_rect(&self, color: &str, x: f64, y: f64, w: f64, h: f64);
    fn fill_circle(&self, color: &str, x: f64, y: f64, r: f64);
    fn stroke_line(&self, color: &str, x1: f64, y1: f64, x2: f64, y2: f64);
    fn fill_text(&self, color: &str, x: f64, y: f64, text: &str);
    fn set_font(&self, font: &str);
}

/// Persistent string key/value store
pub trait KeyValueStore: Send + Sync {
    fn put(&self, key: &str, value: &str) -> Result<()>;
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn delete(&self, key: &str) -> Result<()>;
    fn keys(&self) -> Result<Vec<String>>;
}

/// Blocking HTTP fetch; callers move these calls off the scheduler
pub trait Network: Send + Sync {
    fn fetch_text(&self, url: &str) -> Result<String>;
    fn fetch_json(&self, url: &str) -> Result<JsonValue>;
}

pub trait Audio: Send + Sync {
    fn play_tone(&self, freq_hz: u32, duration_ms: u64) -> Result<()>;
    fn play_clip(&self, url: &str) -> Result<()>;
}

/// One key edge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: String,
    pub phase: KeyPhase,
}

pub trait Keyboard: Send + Sync {
    fn is_key_down(&self, key: &str) -> bool;

    /// Feed of key edges for ONKEY handlers; `None` if the host never
    /// produces key events
    fn subscribe(&self) -> Option<broadcast::Receiver<KeyEvent>>;
}

/// Blocking user dialogs; callers move these calls off the scheduler
pub trait Dialog: Send + Sync {
    fn alert(&self, text: &str) -> Result<()>;

    /// `None` when the user dismissed the prompt
    fn prompt(&self, text: &str) -> Result<Option<String>>;
}

/* ===================== Host ===================== */

/// The full set of capabilities handed to a runtime
///
/// The drawing surface is not part of it: a surface belongs to one run and
/// is passed to `Runtime::start`.
#[derive(Clone)]
pub struct Host {
    pub evaluator: Arc<dyn Evaluator>,
    pub output: Arc<dyn OutputSink>,
    pub storage: Arc<dyn KeyValueStore>,
    pub network: Arc<dyn Network>,
    pub audio: Arc<dyn Audio>,
    pub keyboard: Arc<dyn Keyboard>,
    pub dialog: Arc<dyn Dialog>,
}

impl Default for Host {
    fn default() -> Self {
        Self {
            evaluator: Arc::new(ExprEvaluator::new()),
            output: Arc::new(TracingSink),
            storage: Arc::new(MemoryStore::default()),
            network: Arc::new(HttpNetwork::default()),
            audio: Arc::new(LogAudio),
            keyboard: Arc::new(KeyboardState::new()),
            dialog: Arc::new(StdDialog),
        }
    }
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host").finish_non_exhaustive()
    }
}
