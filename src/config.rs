//! Configuration Management
//!
//! Handles persistent configuration storage for the `superset` CLI.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Server used when nothing else is configured
pub const DEFAULT_URL: &str = "http://localhost:8088";

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Superset server root
    #[serde(default)]
    pub url: Option<String>,
    /// Login used when no token is given
    #[serde(default)]
    pub username: Option<String>,
    /// Pre-issued access token
    #[serde(default)]
    pub access_token: Option<String>,
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("superset-client").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load configuration from `path`; a missing or unreadable file yields defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring malformed config {}: {}", path.display(), e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Err(Error::Config("no configuration directory on this platform".to_string()));
        };
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create parent directory
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| Error::io(path, e))?;

        Ok(())
    }

    /// Get effective server url (CLI/env > config > default)
    pub fn effective_url(&self, flag: Option<&str>) -> String {
        flag.map(str::to_string)
            .or_else(|| self.url.clone())
            .unwrap_or_else(|| DEFAULT_URL.to_string())
    }

    /// Get effective username (CLI/env > config)
    pub fn effective_username(&self, flag: Option<&str>) -> Option<String> {
        flag.map(str::to_string).or_else(|| self.username.clone())
    }

    /// Get effective token (CLI/env > config)
    pub fn effective_token(&self, flag: Option<&str>) -> Option<String> {
        flag.map(str::to_string).or_else(|| self.access_token.clone())
    }

    /// Set url and save
    pub fn set_url(&mut self, url: &str) -> Result<()> {
        self.url = Some(url.to_string());
        self.save()
    }
}
