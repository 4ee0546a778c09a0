//! Configuration management for parla.
//!
//! This module provides core configuration that doesn't depend on
//! platform-specific audio libraries.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::APP_NAME;

/// Core configuration structure for the application.
///
/// This contains settings that are platform-agnostic. Device selection
/// and other platform concerns are handled by the audio layer.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Base URL of the voice server
    #[serde(
        default = "default_server_url",
        skip_serializing_if = "is_default_server_url"
    )]
    pub server_url: String,

    /// Bearer token sent with upload requests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,

    /// Stop recording automatically after this many seconds
    #[serde(
        default = "default_max_clip_secs",
        skip_serializing_if = "is_default_max_clip_secs"
    )]
    pub max_clip_secs: u64,

    /// Give up on an upload after this many seconds
    #[serde(
        default = "default_upload_timeout_secs",
        skip_serializing_if = "is_default_upload_timeout_secs"
    )]
    pub upload_timeout_secs: u64,
}

fn default_server_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn is_default_server_url(v: &str) -> bool {
    v == default_server_url()
}

fn default_max_clip_secs() -> u64 {
    300
}

fn is_default_max_clip_secs(v: &u64) -> bool {
    *v == default_max_clip_secs()
}

fn default_upload_timeout_secs() -> u64 {
    30
}

fn is_default_upload_timeout_secs(v: &u64) -> bool {
    *v == default_upload_timeout_secs()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            auth_token: None,
            max_clip_secs: default_max_clip_secs(),
            upload_timeout_secs: default_upload_timeout_secs(),
        }
    }
}

impl Config {
    /// Get the voice server base URL
    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// Get the bearer token, if configured
    pub fn auth_token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }

    /// Get the recording cap as a Duration
    pub fn max_clip_duration(&self) -> Duration {
        Duration::from_secs(self.max_clip_secs)
    }

    /// Get the upload timeout as a Duration
    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }
}

/// Manages loading and saving configuration files.
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Creates a new ConfigManager with the default configuration directory.
    pub fn new() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        Ok(Self { config_path })
    }

    /// Creates a new ConfigManager with a specified configuration directory.
    #[cfg(test)]
    pub fn with_config_dir<P: AsRef<std::path::Path>>(dir: P) -> Self {
        let config_path = dir.as_ref().join(format!("{}.toml", APP_NAME));
        Self { config_path }
    }

    /// Returns the default path to the configuration file.
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to retrieve configuration directory")?;
        Ok(config_dir.join(APP_NAME).join(format!("{}.toml", APP_NAME)))
    }

    /// Loads the configuration from the config file or returns default.
    pub fn load(&self) -> Result<Config> {
        if !self.config_path.exists() {
            return Ok(Config::default());
        }

        let config_content = fs::read_to_string(&self.config_path)
            .with_context(|| format!("Failed to read config file at {:?}", self.config_path))?;

        let config: Config = toml::from_str(&config_content)
            .with_context(|| format!("Failed to parse config file at {:?}", self.config_path))?;

        if config.auth_token().is_none() {
            warn!(
                "Auth token is not set. Uploads will be rejected by servers \
                 that require authentication. Edit the config file to set one."
            );
        }

        Ok(config)
    }

    /// Saves the configuration to the config file.
    pub fn save(&self, config: &Config) -> Result<()> {
        let config_dir = self
            .config_path
            .parent()
            .with_context(|| format!("Failed to get parent directory of {:?}", self.config_path))?;

        fs::create_dir_all(config_dir)
            .with_context(|| format!("Failed to create config directory at {:?}", config_dir))?;

        let serialized =
            toml::to_string_pretty(&config).context("Failed to serialize configuration")?;

        fs::write(&self.config_path, serialized)
            .with_context(|| format!("Failed to write config file at {:?}", self.config_path))?;

        Ok(())
    }

    /// Returns the path to the configuration file.
    pub fn config_path(&self) -> &std::path::Path {
        &self.config_path
    }
}
