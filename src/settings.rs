//! Persisted user settings.
//!
//! A single JSON blob holding the OpenAI API key. Loading merges whatever
//! is on disk over the defaults, so a missing file or a missing field both
//! come back as an empty key.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub openai_api_key: String,
}

impl Settings {
    /// The key as handed to the container: surrounding whitespace removed.
    pub fn api_key(&self) -> &str {
        self.openai_api_key.trim()
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key().is_empty()
    }

    /// The key with everything but the last four characters hidden.
    pub fn masked_api_key(&self) -> String {
        let key = self.api_key();
        if key.is_empty() {
            return "(not set)".to_string();
        }
        let chars: Vec<char> = key.chars().collect();
        if chars.len() <= 4 {
            return "****".to_string();
        }
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("****{}", tail)
    }
}

/// Reads and writes [`Settings`] at a fixed path.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Settings> {
        if !self.path.exists() {
            return Ok(Settings::default());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings: {}", self.path.display()))?;
        if content.trim().is_empty() {
            return Ok(Settings::default());
        }
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse settings: {}", self.path.display()))
    }

    pub fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create settings directory: {}", parent.display())
                })?;
            }
        }
        let json = serde_json::to_string_pretty(settings)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write settings: {}", self.path.display()))
    }

    /// Load, apply `edit`, save. Mirrors a settings field's on-change hook.
    pub fn update<F>(&self, edit: F) -> Result<Settings>
    where
        F: FnOnce(&mut Settings),
    {
        let mut settings = self.load()?;
        edit(&mut settings);
        self.save(&settings)?;
        Ok(settings)
    }
}
