//! HTTP fetch over a blocking `ureq` agent

use anyhow::{Context, Result};
use serde_json::Value as JsonValue;
use std::time::Duration;
use ureq::Agent;

use super::Network;

pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct HttpNetwork {
    agent: Agent,
}

impl HttpNetwork {
    pub fn new(timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }
}

impl Default for HttpNetwork {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }
}

impl Network for HttpNetwork {
    fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self
            .agent
            .get(url)
            .call()
            .with_context(|| format!("GET {url}"))?;
        Ok(response.into_string()?)
    }

    fn fetch_json(&self, url: &str) -> Result<JsonValue> {
        let response = self
            .agent
            .get(url)
            .call()
            .with_context(|| format!("GET {url}"))?;
        response
            .into_json()
            .with_context(|| format!("Response from {url} is not JSON"))
    }
}
