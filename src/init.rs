//! Runtime assembly
//!
//! Builds a ready-to-use `Runtime` from configuration plus optional host
//! capability overrides. Embedders that only want the defaults call
//! `InitBuilder::new().init()`; anything not overridden is derived from
//! `Config` (file-backed storage when `storage.path` is set, HTTP with the
//! configured timeout).
//!
//! # Example
//!
//! ```no_run
//! use linescript_core::init::InitBuilder;
//! use linescript_core::host::StdoutSink;
//! use std::sync::Arc;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let mut runtime = InitBuilder::new()
//!     .output(Arc::new(StdoutSink))
//!     .trace(true)
//!     .init()?;
//! runtime.start("PRINT 1 + 1", None).await?;
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use crate::config::Config;
use crate::host::{
    Audio, Dialog, FileStore, Host, HttpNetwork, Keyboard, KeyValueStore, MemoryStore, Network,
    OutputSink,
};
use crate::interpreter::{Evaluator, Runtime, RuntimeSettings};

/// Options for building a runtime
///
/// Every `None` falls back to what the configuration or `Host::default`
/// provides.
#[derive(Clone, Default)]
pub struct InitOptions {
    /// Already-loaded configuration; loaded from file and environment if absent
    pub config: Option<Config>,

    /// Config file path (overrides default search)
    pub config_path: Option<PathBuf>,

    /// Initial TRACE state (overrides `runtime.trace`)
    pub trace: Option<bool>,

    pub evaluator: Option<Arc<dyn Evaluator>>,
    pub output: Option<Arc<dyn OutputSink>>,
    pub storage: Option<Arc<dyn KeyValueStore>>,
    pub network: Option<Arc<dyn Network>>,
    pub audio: Option<Arc<dyn Audio>>,
    pub keyboard: Option<Arc<dyn Keyboard>>,
    pub dialog: Option<Arc<dyn Dialog>>,
}

/// Builder for constructing InitOptions
#[derive(Default)]
pub struct InitBuilder {
    options: InitOptions,
}

impl InitBuilder {
    /// Create a new builder with default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Use this configuration instead of loading one
    pub fn config(mut self, config: Config) -> Self {
        self.options.config = Some(config);
        self
    }

    /// Set the config file path
    pub fn config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn trace(mut self, on: bool) -> Self {
        self.options.trace = Some(on);
        self
    }

    pub fn evaluator(mut self, evaluator: Arc<dyn Evaluator>) -> Self {
        self.options.evaluator = Some(evaluator);
        self
    }

    pub fn output(mut self, output: Arc<dyn OutputSink>) -> Self {
        self.options.output = Some(output);
        self
    }

    pub fn storage(mut self, storage: Arc<dyn KeyValueStore>) -> Self {
        self.options.storage = Some(storage);
        self
    }

    pub fn network(mut self, network: Arc<dyn Network>) -> Self {
        self.options.network = Some(network);
        self
    }

    pub fn audio(mut self, audio: Arc<dyn Audio>) -> Self {
        self.options.audio = Some(audio);
        self
    }

    pub fn keyboard(mut self, keyboard: Arc<dyn Keyboard>) -> Self {
        self.options.keyboard = Some(keyboard);
        self
    }

    pub fn dialog(mut self, dialog: Arc<dyn Dialog>) -> Self {
        self.options.dialog = Some(dialog);
        self
    }

    /// Build the runtime with the configured options
    pub fn init(self) -> Result<Runtime> {
        initialize(self.options)
    }
}

/// Build a runtime from the given options
///
/// This function:
/// - Loads configuration unless one was supplied
/// - Opens the storage file named by `storage.path`, if any
/// - Fills every capability that was not overridden
pub fn initialize(options: InitOptions) -> Result<Runtime> {
    let config = match options.config {
        Some(config) => config,
        None => Config::builder()
            .config_path(options.config_path)
            .build()
            .context("Failed to load configuration")?,
    };

    let defaults = Host::default();

    let storage: Arc<dyn KeyValueStore> = match (options.storage, &config.storage.path) {
        (Some(storage), _) => storage,
        (None, Some(path)) => Arc::new(
            FileStore::open(path)
                .with_context(|| format!("Failed to open storage file {}", path.display()))?,
        ),
        (None, None) => Arc::new(MemoryStore::default()),
    };

    let network: Arc<dyn Network> = match options.network {
        Some(network) => network,
        None => Arc::new(HttpNetwork::new(config.network.timeout())),
    };

    let host = Host {
        evaluator: options.evaluator.unwrap_or(defaults.evaluator),
        output: options.output.unwrap_or(defaults.output),
        storage,
        network,
        audio: options.audio.unwrap_or(defaults.audio),
        keyboard: options.keyboard.unwrap_or(defaults.keyboard),
        dialog: options.dialog.unwrap_or(defaults.dialog),
    };

    let settings = RuntimeSettings {
        frame_interval: config.runtime.frame_interval(),
        trace: options.trace.unwrap_or(config.runtime.trace),
    };
    debug!(?settings, storage = ?config.storage.path, "runtime assembled");

    Ok(Runtime::new(host, settings))
}
