//! Settings management for the Aura assistant
//!
//! A single settings record, persisted as a TOML file and threaded
//! explicitly through the orchestrator and inference client
//! constructors. Never ambient state.

pub mod file;

use std::path::{Path, PathBuf};

use crate::Result;
use file::SettingsFile;

/// Default generation backend base URL
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Default model identifier
pub const DEFAULT_MODEL: &str = "llama3.2";

/// Default system prompt
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a friendly voice assistant. \
Keep replies short and conversational — they are spoken aloud.";

/// Default sampling temperature
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Default wake phrase
pub const DEFAULT_TRIGGER_PHRASE: &str = "hey assistant";

/// Assistant settings
///
/// The trigger phrase is always stored lowercase; temperature is always
/// within 0.0–2.0.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Generation backend base URL
    pub base_url: String,

    /// Selected model identifier
    pub model: String,

    /// System prompt prepended to every conversation
    pub system_prompt: String,

    temperature: f64,
    trigger_phrase: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            trigger_phrase: DEFAULT_TRIGGER_PHRASE.to_string(),
        }
    }
}

impl Settings {
    /// Load settings from the standard path, falling back to defaults
    /// for missing fields
    #[must_use]
    pub fn load() -> Self {
        file::settings_file_path().map_or_else(Self::default, |path| Self::load_from(&path))
    }

    /// Load settings from an explicit path
    #[must_use]
    pub fn load_from(path: &Path) -> Self {
        Self::from_file(file::load_settings_file(path))
    }

    /// Build settings from a partial file record, normalizing values
    #[must_use]
    pub fn from_file(record: SettingsFile) -> Self {
        let mut settings = Self::default();
        if let Some(url) = record.base_url {
            settings.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(model) = record.model {
            settings.model = model;
        }
        if let Some(prompt) = record.system_prompt {
            settings.system_prompt = prompt;
        }
        if let Some(temp) = record.temperature {
            settings.set_temperature(temp);
        }
        if let Some(phrase) = record.trigger_phrase {
            settings.set_trigger_phrase(&phrase);
        }
        settings
    }

    /// Persist settings to the standard path
    ///
    /// # Errors
    ///
    /// Returns error if no config directory is available or the file
    /// cannot be written.
    pub fn save(&self) -> Result<()> {
        let path = file::settings_file_path()
            .ok_or_else(|| crate::Error::Config("no config directory available".to_string()))?;
        self.save_to(&path)
    }

    /// Persist settings to an explicit path
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        file::save_settings_file(path, &self.to_file())
    }

    /// Convert to the on-disk record
    #[must_use]
    pub fn to_file(&self) -> SettingsFile {
        SettingsFile {
            base_url: Some(self.base_url.clone()),
            model: Some(self.model.clone()),
            system_prompt: Some(self.system_prompt.clone()),
            temperature: Some(self.temperature),
            trigger_phrase: Some(self.trigger_phrase.clone()),
        }
    }

    /// Sampling temperature (0.0–2.0)
    #[must_use]
    pub const fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Set the sampling temperature, clamped to 0.0–2.0
    pub fn set_temperature(&mut self, temperature: f64) {
        self.temperature = temperature.clamp(0.0, 2.0);
    }

    /// Wake phrase, always lowercase
    #[must_use]
    pub fn trigger_phrase(&self) -> &str {
        &self.trigger_phrase
    }

    /// Set the wake phrase, normalized to lowercase
    pub fn set_trigger_phrase(&mut self, phrase: &str) {
        let normalized = phrase.trim().to_lowercase();
        if !normalized.is_empty() {
            self.trigger_phrase = normalized;
        }
    }
}

/// Return the directory holding the settings file, for display
#[must_use]
pub fn settings_path_display() -> PathBuf {
    file::settings_file_path().unwrap_or_else(|| PathBuf::from("settings.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_documented_values() {
        let settings = Settings::default();
        assert_eq!(settings.base_url, "http://localhost:11434");
        assert_eq!(settings.model, "llama3.2");
        assert!((settings.temperature() - 0.7).abs() < f64::EPSILON);
        assert_eq!(settings.trigger_phrase(), "hey assistant");
    }

    #[test]
    fn temperature_is_clamped() {
        let mut settings = Settings::default();
        settings.set_temperature(3.5);
        assert!((settings.temperature() - 2.0).abs() < f64::EPSILON);
        settings.set_temperature(-1.0);
        assert!(settings.temperature().abs() < f64::EPSILON);
    }

    #[test]
    fn trigger_phrase_is_lowercased() {
        let mut settings = Settings::default();
        settings.set_trigger_phrase("  Hey AURA ");
        assert_eq!(settings.trigger_phrase(), "hey aura");
    }

    #[test]
    fn blank_trigger_phrase_is_ignored() {
        let mut settings = Settings::default();
        settings.set_trigger_phrase("   ");
        assert_eq!(settings.trigger_phrase(), "hey assistant");
    }

    #[test]
    fn partial_file_overlays_defaults() {
        let record = SettingsFile {
            model: Some("mistral".to_string()),
            temperature: Some(1.2),
            ..SettingsFile::default()
        };
        let settings = Settings::from_file(record);
        assert_eq!(settings.model, "mistral");
        assert_eq!(settings.base_url, "http://localhost:11434");
        assert!((settings.temperature() - 1.2).abs() < f64::EPSILON);
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let record = SettingsFile {
            base_url: Some("http://localhost:11434/".to_string()),
            ..SettingsFile::default()
        };
        let settings = Settings::from_file(record);
        assert_eq!(settings.base_url, "http://localhost:11434");
    }

    #[test]
    fn settings_roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");

        let mut settings = Settings::default();
        settings.model = "mistral".to_string();
        settings.set_trigger_phrase("Hey Aura");
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path);
        assert_eq!(loaded.model, "mistral");
        assert_eq!(loaded.trigger_phrase(), "hey aura");
        assert_eq!(loaded.base_url, "http://localhost:11434");
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "not = [valid").unwrap();

        let loaded = Settings::load_from(&path);
        assert_eq!(loaded.model, "llama3.2");
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Settings::load_from(&dir.path().join("absent.toml"));
        assert_eq!(loaded.trigger_phrase(), "hey assistant");
    }
}
