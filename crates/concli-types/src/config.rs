//! Engine configuration loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working configuration.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ConcliError, Result};

/// Tunables for the shared command-line engine.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EngineConfig {
    /// How often a pending read re-checks input readiness and cancellation.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Reserved token that ends the scan loop when fed back after a cancel.
    #[serde(default = "default_sentinel")]
    pub sentinel: String,
    /// Total budget for executor shutdown. Each phase gets half of it.
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
    /// Idle time after which a pool worker retires.
    #[serde(default = "default_worker_keep_alive_ms")]
    pub worker_keep_alive_ms: u64,
    /// Prefix for every thread the engine spawns.
    #[serde(default = "default_thread_name_prefix")]
    pub thread_name_prefix: String,
}

fn default_poll_interval_ms() -> u64 {
    50
}
fn default_sentinel() -> String {
    "__concli_cancel__".to_string()
}
fn default_shutdown_timeout_ms() -> u64 {
    5_000
}
fn default_worker_keep_alive_ms() -> u64 {
    60_000
}
fn default_thread_name_prefix() -> String {
    "concli".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            sentinel: default_sentinel(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
            worker_keep_alive_ms: default_worker_keep_alive_ms(),
            thread_name_prefix: default_thread_name_prefix(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        log::debug!("loaded engine config from {}", path.display());
        Ok(config)
    }

    /// Reject values that would make the engine spin or never finish.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(ConcliError::Config(
                "poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.shutdown_timeout_ms == 0 {
            return Err(ConcliError::Config(
                "shutdown_timeout_ms must be greater than zero".to_string(),
            ));
        }
        let sentinel = self.sentinel.trim();
        if sentinel.is_empty() || sentinel.split_whitespace().count() != 1 {
            return Err(ConcliError::Config(format!(
                "sentinel must be a single non-blank token, got {:?}",
                self.sentinel
            )));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn worker_keep_alive(&self) -> Duration {
        Duration::from_millis(self.worker_keep_alive_ms)
    }
}
