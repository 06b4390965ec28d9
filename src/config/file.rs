//! TOML settings file loading
//!
//! Supports `~/.config/aura/settings.toml` as the persistent settings
//! record. All fields are optional — the file is a partial overlay on
//! top of defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// On-disk settings record schema
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct SettingsFile {
    /// Generation backend base URL (e.g. "http://localhost:11434")
    pub base_url: Option<String>,

    /// Selected model identifier (e.g. "llama3.2")
    pub model: Option<String>,

    /// System prompt prepended to every conversation
    pub system_prompt: Option<String>,

    /// Sampling temperature (0.0–2.0)
    pub temperature: Option<f64>,

    /// Wake phrase for voice activation
    pub trigger_phrase: Option<String>,
}

/// Load the settings file from the given path
///
/// Returns `SettingsFile::default()` if the file doesn't exist or can't
/// be parsed — missing or corrupt settings never block startup.
pub fn load_settings_file(path: &Path) -> SettingsFile {
    if !path.exists() {
        return SettingsFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(file) => {
                tracing::info!(path = %path.display(), "loaded settings file");
                file
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse settings file, using defaults"
                );
                SettingsFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read settings file"
            );
            SettingsFile::default()
        }
    }
}

/// Write the settings file to the given path, creating parent
/// directories as needed
///
/// # Errors
///
/// Returns error if the directory cannot be created or the file cannot
/// be written.
pub fn save_settings_file(path: &Path, file: &SettingsFile) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = toml::to_string_pretty(file)
        .map_err(|e| Error::Config(format!("failed to serialize settings: {e}")))?;
    std::fs::write(path, content)?;

    tracing::debug!(path = %path.display(), "settings saved");
    Ok(())
}

/// Return the settings file path: `~/.config/aura/settings.toml`
pub fn settings_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("aura").join("settings.toml"))
}
