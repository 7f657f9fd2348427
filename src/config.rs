use serde::{Deserialize, Serialize};
use std::path::Path;
use crate::error::{Result, TranslateError};

/// Model used when none is configured
pub const DEFAULT_MODEL: &str = "mistral-small:latest";

/// Target language used when none is configured
pub const DEFAULT_LANGUAGE: &str = "English";

fn default_enabled() -> bool {
    true
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

/// Settings read by the translator. Any change requires a reload: the host
/// builds a new orchestrator from the new values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Whether comment annotations are produced at all
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Language the comments are translated into
    #[serde(default = "default_language")]
    pub language: String,
    /// Ollama model identifier used for pull and chat
    #[serde(default = "default_model")]
    pub model: String,
    /// Ollama endpoint URL; the client default is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            language: default_language(),
            model: default_model(),
            address: None,
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TranslateError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| TranslateError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| TranslateError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| TranslateError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Apply per-invocation overrides on top of the loaded values
    pub fn with_overrides(
        mut self,
        language: Option<String>,
        model: Option<String>,
        address: Option<String>,
    ) -> Self {
        if let Some(language) = language {
            self.language = language;
        }
        if let Some(model) = model {
            self.model = model;
        }
        if address.is_some() {
            self.address = address;
        }
        self
    }
}
