//! Persisted user settings
//!
//! A small JSON file under the platform config directory, currently holding
//! the cloud API key. Unreadable or corrupt files fall back to defaults so a
//! bad edit never blocks local-only processing.

use crate::error::{NukkiError, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// User settings persisted between runs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// API key for the cloud vision model; `None` disables enhancement
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Settings {
    /// Default settings file path under the platform config directory
    ///
    /// # Errors
    /// Platforms without a resolvable config directory
    pub fn default_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("nukki").join("config.json"))
            .ok_or_else(|| {
                NukkiError::invalid_config("no config directory available on this platform")
            })
    }

    /// Load settings from `path`, falling back to defaults
    ///
    /// A missing file is the normal first-run case; a corrupt one is logged
    /// and ignored.
    #[must_use]
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(settings) => settings,
                Err(e) => {
                    warn!("Ignoring corrupt settings at {}: {e}", path.display());
                    Self::default()
                },
            },
            Err(e) => {
                debug!("No settings at {} ({e}), using defaults", path.display());
                Self::default()
            },
        }
    }

    /// Load settings from the default location
    #[must_use]
    pub fn load() -> Self {
        Self::default_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    /// Persist settings to `path`, creating parent directories
    ///
    /// # Errors
    /// Directory creation, serialization or write failures
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| NukkiError::file_io("create config directory", parent, &e))?;
            }
        }
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| NukkiError::invalid_config(format!("failed to serialize settings: {e}")))?;
        fs::write(path, text).map_err(|e| NukkiError::file_io("write settings", path, &e))?;
        Ok(())
    }
}
