//! Configuration loading
//!
//! Sources, lowest precedence first:
//! 1. Built-in defaults
//! 2. TOML file (`linescript.toml`, or the path in `LINESCRIPT_CONFIG_PATH`)
//! 3. `.env` file, loaded into the process environment
//! 4. Environment variables prefixed `LINESCRIPT_`, `__` between levels
//!    (`LINESCRIPT_RUNTIME__FRAME_INTERVAL_MS=8`)
//! 5. Programmatic overrides from `ConfigBuilder`

use anyhow::{Context, Result};
use config::{Environment, File, FileFormat};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

pub const CONFIG_PATH_ENV: &str = "LINESCRIPT_CONFIG_PATH";
const DEFAULT_CONFIG_FILE: &str = "linescript.toml";
const ENV_PREFIX: &str = "LINESCRIPT";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub runtime: RuntimeConfig,
    pub storage: StorageConfig,
    pub network: NetworkConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeConfig {
    /// TICK pacing; a TICK body waits one frame plus its own delay
    pub frame_interval_ms: u64,
    /// Initial TRACE state of each run
    pub trace: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Backing file for STORE/LOAD; in-memory when absent
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directive; `RUST_LOG` wins if set
    pub filter: String,
}

impl RuntimeConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

impl NetworkConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            runtime: RuntimeConfig {
                frame_interval_ms: 16,
                trace: false,
            },
            storage: StorageConfig { path: None },
            network: NetworkConfig { timeout_secs: 10 },
            log: LogConfig {
                filter: "info".to_string(),
            },
        }
    }
}

impl Config {
    /// Load from file and environment with no overrides
    pub fn load() -> Result<Self> {
        Self::builder().build()
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Programmatic overrides applied on top of file and environment
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config_path: Option<PathBuf>,
    frame_interval_ms: Option<u64>,
    trace: Option<bool>,
    storage_path: Option<PathBuf>,
    network_timeout_secs: Option<u64>,
    log_filter: Option<String>,
    skip_env: bool,
}

impl ConfigBuilder {
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    pub fn frame_interval_ms(mut self, ms: u64) -> Self {
        self.frame_interval_ms = Some(ms);
        self
    }

    pub fn trace(mut self, on: bool) -> Self {
        self.trace = Some(on);
        self
    }

    pub fn storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = Some(path.into());
        self
    }

    pub fn network_timeout_secs(mut self, secs: u64) -> Self {
        self.network_timeout_secs = Some(secs);
        self
    }

    pub fn log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = Some(filter.into());
        self
    }

    /// Ignore `.env`, environment variables and the default config file
    ///
    /// An explicit `config_path` is still read.
    pub fn isolated(mut self) -> Self {
        self.skip_env = true;
        self
    }

    pub fn build(self) -> Result<Config> {
        let defaults = Config::default();
        let mut builder = config::Config::builder()
            .set_default("runtime.frame_interval_ms", defaults.runtime.frame_interval_ms)?
            .set_default("runtime.trace", defaults.runtime.trace)?
            .set_default("network.timeout_secs", defaults.network.timeout_secs)?
            .set_default("log.filter", defaults.log.filter)?;

        if !self.skip_env {
            // Missing .env is the normal case
            let _ = dotenvy::dotenv();
        }

        let explicit_path = self.config_path.clone().or_else(|| {
            if self.skip_env {
                None
            } else {
                std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from)
            }
        });

        match explicit_path {
            Some(path) => {
                builder = builder.add_source(
                    File::from(path.clone())
                        .format(FileFormat::Toml)
                        .required(true),
                );
            }
            None if !self.skip_env => {
                builder = builder.add_source(
                    File::with_name(DEFAULT_CONFIG_FILE)
                        .format(FileFormat::Toml)
                        .required(false),
                );
            }
            None => {}
        }

        if !self.skip_env {
            builder = builder.add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );
        }

        if let Some(ms) = self.frame_interval_ms {
            builder = builder.set_override("runtime.frame_interval_ms", ms)?;
        }
        if let Some(on) = self.trace {
            builder = builder.set_override("runtime.trace", on)?;
        }
        if let Some(path) = &self.storage_path {
            builder = builder.set_override("storage.path", path.to_string_lossy().to_string())?;
        }
        if let Some(secs) = self.network_timeout_secs {
            builder = builder.set_override("network.timeout_secs", secs)?;
        }
        if let Some(filter) = self.log_filter {
            builder = builder.set_override("log.filter", filter)?;
        }

        let config: Config = builder
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        if config.runtime.frame_interval_ms == 0 {
            anyhow::bail!("runtime.frame_interval_ms must be at least 1");
        }
        Ok(config)
    }
}
