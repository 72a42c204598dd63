use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::source::DEFAULT_TRANSLATION;

pub const DEFAULT_START_REFERENCE: &str = "Romans 1";

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub translation: Option<String>,
    pub start_reference: Option<String>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from the config directory, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::get_config_path()?)?;
        config.apply_env();
        Ok(config)
    }

    /// Read a config file; a missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    /// `LECTIO_API_URL`, `LECTIO_API_KEY` and `LECTIO_TRANSLATION` win over the file.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if let Some(url) = non_empty("LECTIO_API_URL") {
            self.base_url = Some(url);
        }
        if let Some(key) = non_empty("LECTIO_API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(translation) = non_empty("LECTIO_TRANSLATION") {
            self.translation = Some(translation);
        }
    }

    pub fn translation(&self) -> &str {
        self.translation.as_deref().unwrap_or(DEFAULT_TRANSLATION)
    }

    pub fn start_reference(&self) -> &str {
        self.start_reference
            .as_deref()
            .unwrap_or(DEFAULT_START_REFERENCE)
    }

    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;

        Ok(config_dir.join("lectio"))
    }

    fn get_config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }
}
