//! Console configuration management.
//!
//! Configuration is stored as TOML:
//! - Linux: `$XDG_CONFIG_HOME/remotectl/console.toml` (or `~/.config/...`)
//! - Windows: `%APPDATA%/remotectl/console.toml`

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};

use remotectl_hub_connection::{HubConfig, ReconnectConfig};
use remotectl_hub_log::DEFAULT_CAPACITY;
use remotectl_protocol::builder::{DEFAULT_FRAME_TYPE, DEFAULT_SENDER_ID};

/// Console configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// `senderId` stamped on every composed frame.
    #[serde(default = "default_sender_id")]
    pub sender_id: String,

    /// `type` stamped on every composed frame.
    #[serde(default = "default_frame_type")]
    pub frame_type: String,

    /// Number of log entries kept in memory.
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,

    /// Reconnect delays in seconds. Only the first entry is used per cycle;
    /// an empty list disables reconnection.
    #[serde(default = "default_reconnect_schedule")]
    pub reconnect_schedule_secs: Vec<u64>,

    /// Keepalive ping interval in seconds.
    #[serde(default)]
    pub keepalive_secs: Option<u64>,

    /// Upper bound for incoming WebSocket messages, in bytes.
    #[serde(default)]
    pub max_message_size: Option<usize>,

    /// Endpoint registry file; the platform default when unset.
    #[serde(default)]
    pub servers_path: Option<PathBuf>,
}

fn default_sender_id() -> String {
    DEFAULT_SENDER_ID.into()
}

fn default_frame_type() -> String {
    DEFAULT_FRAME_TYPE.into()
}

fn default_log_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_reconnect_schedule() -> Vec<u64> {
    vec![1, 2, 5, 10, 20]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sender_id: default_sender_id(),
            frame_type: default_frame_type(),
            log_capacity: default_log_capacity(),
            reconnect_schedule_secs: default_reconnect_schedule(),
            keepalive_secs: None,
            max_message_size: None,
            servers_path: None,
        }
    }
}

impl Config {
    /// Loads configuration from the platform path, creating it if missing.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&config_path()?)
    }

    /// Loads configuration from `path`, writing defaults there if missing.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?
        } else {
            let config = Config::default();
            config.save_to(path)?;
            config
        };
        config.validate()?;
        Ok(config)
    }

    /// Saves the configuration to `path`.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.log_capacity == 0 {
            bail!("log_capacity must be greater than zero");
        }
        if self.keepalive_secs == Some(0) {
            bail!("keepalive_secs must be greater than zero");
        }
        Ok(())
    }

    /// Hub tuning derived from this configuration.
    pub fn hub_config(&self) -> HubConfig {
        HubConfig {
            reconnect: ReconnectConfig {
                schedule: self
                    .reconnect_schedule_secs
                    .iter()
                    .copied()
                    .map(Duration::from_secs)
                    .collect(),
            },
            keepalive: self.keepalive_secs.map(Duration::from_secs),
            max_message_size: self.max_message_size,
        }
    }
}

/// Returns the platform-specific configuration file path.
fn config_path() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        let base = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
            .context("neither XDG_CONFIG_HOME nor HOME is set")?;
        Ok(base.join("remotectl").join("console.toml"))
    }

    #[cfg(target_os = "windows")]
    {
        let appdata = std::env::var("APPDATA").context("APPDATA is not set")?;
        Ok(PathBuf::from(appdata).join("remotectl").join("console.toml"))
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        let home = std::env::var("HOME").context("HOME is not set")?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("remotectl")
            .join("console.toml"))
    }
}
