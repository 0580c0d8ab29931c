//! Test helpers for interpreter tests
//!
//! Common utilities for building runtimes with in-memory host capabilities

use anyhow::{anyhow, Result};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::host::{
    Host, KeyboardState, MemorySink, MemoryStore, Network, RecordingSurface, ScriptedDialog,
    Surface,
};
use crate::interpreter::{RuntimeError, Runtime, RuntimeSettings, Val};

/// Canned HTTP responses keyed by URL
#[derive(Debug, Default)]
pub struct StubNetwork {
    pages: HashMap<String, String>,
}

impl StubNetwork {
    pub fn new(pages: HashMap<String, String>) -> Self {
        Self { pages }
    }
}

impl Network for StubNetwork {
    fn fetch_text(&self, url: &str) -> Result<String> {
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("404 for {}", url))
    }

    fn fetch_json(&self, url: &str) -> Result<JsonValue> {
        Ok(serde_json::from_str(&self.fetch_text(url)?)?)
    }
}

/// A runtime plus handles on every in-memory capability it was built with
pub struct Harness {
    pub runtime: Runtime,
    pub output: Arc<MemorySink>,
    pub surface: Arc<RecordingSurface>,
    pub keyboard: Arc<KeyboardState>,
    pub dialog: Arc<ScriptedDialog>,
    pub storage: Arc<MemoryStore>,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(RuntimeSettings::default(), Vec::new(), HashMap::new())
    }

    /// Harness with a custom frame interval (TICK pacing)
    pub fn with_frame_interval(millis: u64) -> Self {
        let settings = RuntimeSettings {
            frame_interval: Duration::from_millis(millis),
            ..RuntimeSettings::default()
        };
        Self::build(settings, Vec::new(), HashMap::new())
    }

    /// Harness whose INPUT prompts get `answers` in order
    pub fn with_answers(answers: Vec<Option<String>>) -> Self {
        Self::build(RuntimeSettings::default(), answers, HashMap::new())
    }

    /// Harness whose FETCH/FETCHJSON read from `pages`
    pub fn with_pages(pages: HashMap<String, String>) -> Self {
        Self::build(RuntimeSettings::default(), Vec::new(), pages)
    }

    fn build(
        settings: RuntimeSettings,
        answers: Vec<Option<String>>,
        pages: HashMap<String, String>,
    ) -> Self {
        let output = Arc::new(MemorySink::new());
        let surface = Arc::new(RecordingSurface::new());
        let keyboard = Arc::new(KeyboardState::new());
        let dialog = Arc::new(ScriptedDialog::new(answers));
        let storage = Arc::new(MemoryStore::default());

        let host = Host {
            output: output.clone(),
            keyboard: keyboard.clone(),
            dialog: dialog.clone(),
            storage: storage.clone(),
            network: Arc::new(StubNetwork::new(pages)),
            ..Host::default()
        };

        Self {
            runtime: Runtime::new(host, settings),
            output,
            surface,
            keyboard,
            dialog,
            storage,
        }
    }

    /// Run the top level only; loops and timers keep going
    pub async fn start(&mut self, source: &str) -> Result<(), RuntimeError> {
        let surface: Arc<dyn Surface> = self.surface.clone();
        self.runtime.start(source, Some(surface)).await
    }

    /// Run the top level and wait for every WHILE/FOR it started
    pub async fn run(&mut self, source: &str) -> Result<(), RuntimeError> {
        self.start(source).await?;
        self.runtime.settle().await
    }

    pub fn get(&self, name: &str) -> Val {
        self.runtime
            .get(name)
            .unwrap_or_else(|| panic!("Variable {} is not defined", name))
    }

    pub fn num(&self, name: &str) -> f64 {
        match self.get(name) {
            Val::Num(n) => n,
            other => panic!("Expected {} to be a number, got {:?}", name, other),
        }
    }

    pub fn output(&self) -> Vec<String> {
        self.output.lines()
    }
}

/// Run `source` to completion, panicking on failure
pub async fn run_program(source: &str) -> Harness {
    let mut harness = Harness::new();
    harness.run(source).await.expect("Program failed");
    harness
}

/// Run `source` to completion and return its error
pub async fn run_failing(source: &str) -> (Harness, RuntimeError) {
    let mut harness = Harness::new();
    let err = harness
        .run(source)
        .await
        .expect_err("Program should have failed");
    (harness, err)
}

/// Let spawned tasks run without moving the clock
pub async fn let_tasks_run() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}
