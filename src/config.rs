//! Configuration management.
//!
//! Handles loading and saving configuration from TOML files.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::gtp::EngineProfile;

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Engine launch settings
    pub engine: EngineProfile,
}

impl Config {
    /// Default configuration file location
    /// (`<config_dir>/sente/config.toml`).
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("sente").join("config.toml"))
    }

    /// Load from the default location, falling back to defaults if the file
    /// is missing or unreadable.
    pub fn load() -> Self {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path).unwrap_or_else(|err| {
                warn!(path = %path.display(), error = %err, "falling back to default configuration");
                Self::default()
            }),
            _ => Self::default(),
        }
    }

    /// Load from a specific file.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Save to a specific file, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let text = toml::to_string_pretty(self).context("failed to serialize configuration")?;
        fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))
    }
}
