//! Client configuration.
//!
//! Supports reading settings from `~/.config/arcana/config.toml`. A missing
//! file yields the defaults; the environment variable `ARCANA_BASE_URL` and
//! command-line flags override the file (resolved by the callers).

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ArcanaError, Result};

/// Default backend address when nothing is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Default request timeout, standing in for the browser default the web
/// front end relied on.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Settings for talking to the reading backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the reading backend.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Loads the configuration file from ~/.config/arcana/config.toml.
///
/// Returns the defaults when the file does not exist.
pub fn load_config() -> Result<ClientConfig> {
    let path = config_path()?;
    if !path.exists() {
        return Ok(ClientConfig::default());
    }
    load_config_from(&path)
}

/// Loads the configuration from an explicit path.
pub fn load_config_from(path: &Path) -> Result<ClientConfig> {
    let content = fs::read_to_string(path).map_err(|e| {
        ArcanaError::config(format!(
            "Failed to read configuration file at {}: {}",
            path.display(),
            e
        ))
    })?;

    toml::from_str(&content).map_err(|e| {
        ArcanaError::config(format!(
            "Failed to parse configuration file at {}: {}",
            path.display(),
            e
        ))
    })
}

/// Returns the path to the configuration file: ~/.config/arcana/config.toml
pub fn config_path() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ArcanaError::config("Could not determine home directory"))?;
    Ok(home.join(".config").join("arcana").join("config.toml"))
}
