use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Context, Result, anyhow};

use crate::http::DEFAULT_PROMPT_FIELD;
use crate::state::{HistoryPolicy, ResponseMode};

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8000/chat";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    #[default]
    Light,
    Dark,
}

impl ThemeMode {
    pub fn toggled(self) -> Self {
        match self {
            ThemeMode::Light => ThemeMode::Dark,
            ThemeMode::Dark => ThemeMode::Light,
        }
    }
}

/// On-disk settings, every field optional
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub endpoint: Option<String>,
    pub mode: Option<ResponseMode>,
    pub history: Option<HistoryPolicy>,
    pub prompt_field: Option<String>,
    pub theme: Option<ThemeMode>,
}

/// Values given on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub endpoint: Option<String>,
    pub mode: Option<ResponseMode>,
    pub history: Option<HistoryPolicy>,
}

/// Fully resolved settings
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub endpoint: String,
    pub mode: ResponseMode,
    pub history: HistoryPolicy,
    pub prompt_field: String,
    pub theme: ThemeMode,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from the default location. A missing file yields defaults.
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Config = serde_json::from_str(&config_content)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    /// Overrides win over the file, the file wins over defaults
    pub fn resolve(&self, overrides: Overrides) -> Settings {
        Settings {
            endpoint: overrides
                .endpoint
                .or_else(|| self.endpoint.clone())
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            mode: overrides.mode.or(self.mode).unwrap_or_default(),
            history: overrides.history.or(self.history).unwrap_or_default(),
            prompt_field: self
                .prompt_field
                .clone()
                .unwrap_or_else(|| DEFAULT_PROMPT_FIELD.to_string()),
            theme: self.theme.unwrap_or_default(),
        }
    }

    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("parley"))
    }

    fn get_config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }
}
