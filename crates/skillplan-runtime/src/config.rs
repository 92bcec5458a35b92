#![forbid(unsafe_code)]

//! Editor configuration loaded from TOML or JSON.
//!
//! # Loading
//!
//! ```toml
//! # skillplan.toml
//! [preview]
//! debounce_ms = 200
//!
//! [history]
//! max_depth = 100
//!
//! [logging]
//! filter = "info,skillplan.history=debug"
//! ```
//!
//! ```rust,ignore
//! let config = EditorConfig::load_validated_toml_file("skillplan.toml")?;
//! ```
//!
//! # Defaults
//!
//! Every section is optional; missing fields take the same values as
//! `EditorConfig::default()`.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::notification::NotificationConfig;
use crate::preview::PreviewConfig;
use crate::undo::HistoryConfig;

/// Longest accepted debounce.
pub const MAX_DEBOUNCE_MS: u64 = 10_000;

/// Logging bootstrap settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `SKILLPLAN_LOG` is unset.
    pub filter: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".into(),
            json: false,
        }
    }
}

/// Top-level configuration for one editor process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Drag validation preview.
    pub preview: PreviewConfig,
    /// Undo/redo history.
    pub history: HistoryConfig,
    /// Logging bootstrap.
    pub logging: LoggingConfig,
    /// Failure notifications.
    pub notifications: NotificationConfig,
}

/// Errors that can occur when loading a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("validation errors: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("invalid log filter: {0}")]
    Filter(String),
}

impl EditorConfig {
    /// Load from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Load from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Load from a JSON string.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Load from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// Serialize back to TOML.
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string(self)
    }

    /// Validate all parameters are within acceptable ranges.
    ///
    /// Returns a list of validation errors. An empty list means the config
    /// is valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.preview.debounce_ms == 0 || self.preview.debounce_ms > MAX_DEBOUNCE_MS {
            errors.push(format!(
                "preview.debounce_ms must be in 1..={MAX_DEBOUNCE_MS}, got {}",
                self.preview.debounce_ms
            ));
        }

        if self.history.max_depth == 0 {
            errors.push("history.max_depth must be > 0".into());
        }

        if self.notifications.max_queued == 0 {
            errors.push("notifications.max_queued must be > 0".into());
        }

        if self.logging.filter.trim().is_empty() {
            errors.push("logging.filter must not be empty".into());
        }

        errors
    }

    fn validated(self) -> Result<Self, ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// [`from_toml_str`](Self::from_toml_str) followed by [`validate`](Self::validate).
    pub fn load_validated_toml_str(s: &str) -> Result<Self, ConfigError> {
        Self::from_toml_str(s)?.validated()
    }

    /// [`from_toml_file`](Self::from_toml_file) followed by [`validate`](Self::validate).
    pub fn load_validated_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_toml_file(path)?.validated()
    }

    /// [`from_json_file`](Self::from_json_file) followed by [`validate`](Self::validate).
    pub fn load_validated_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_json_file(path)?.validated()
    }
}
