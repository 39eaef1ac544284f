//! Guard configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors from loading guard options.
#[derive(Error, Debug)]
pub enum OptionsError {
    #[error("Failed to read options file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Unsupported options file extension: {0:?}")]
    UnsupportedFormat(String),
}

/// Options recognized by the entry-point guard.
///
/// ```yaml
/// induced: true
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GuardOptions {
    /// Induced seismicity mode: injection fields become mandatory and are
    /// checked as hydjson.
    pub induced: bool,
}

impl GuardOptions {
    /// Options with induced seismicity mode switched on.
    pub fn induced() -> Self {
        Self { induced: true }
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, OptionsError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_json(json: &str) -> Result<Self, OptionsError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load options from a `.yaml`, `.yml` or `.json` file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, OptionsError> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        match extension.as_str() {
            "yaml" | "yml" => Self::from_yaml(&fs::read_to_string(path)?),
            "json" => Self::from_json(&fs::read_to_string(path)?),
            other => Err(OptionsError::UnsupportedFormat(other.to_string())),
        }
    }
}
