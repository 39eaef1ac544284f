//! Typed model input, parsed from a raw mapping, JSON or YAML.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use thiserror::Error;

use super::coerce;
use super::validator::validate_input_schema;

/// Errors that can occur when building a [`ModelInput`].
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Failed to read input file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Input does not match schema: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

impl SchemaError {
    /// Individual violation messages, one per schema error.
    pub fn violations(&self) -> Vec<String> {
        match self {
            SchemaError::Invalid(errors) => errors.clone(),
            other => vec![other.to_string()],
        }
    }
}

/// The input bundle handed to a forecast model.
///
/// Built fresh per call and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ModelInput {
    /// Start of the forecast window
    #[serde(deserialize_with = "coerce::deserialize_timestamp")]
    pub forecast_start: DateTime<Utc>,

    /// End of the forecast window
    #[serde(deserialize_with = "coerce::deserialize_timestamp")]
    pub forecast_end: DateTime<Utc>,

    /// Serialized event catalog (QuakeML)
    pub seismic_catalog: String,

    /// Forecast region as well-known text
    pub bounding_polygon: String,

    /// Upper depth bound in km below reference
    #[serde(default, deserialize_with = "coerce::deserialize_number")]
    pub depth_min: Option<f64>,

    /// Lower depth bound in km below reference
    #[serde(default, deserialize_with = "coerce::deserialize_number")]
    pub depth_max: Option<f64>,

    /// Observed hydraulics, one hydjson record per well, in well order
    #[serde(default)]
    pub injection_observation: Option<Vec<Option<Value>>>,

    /// Planned injection, one hydjson record per well
    #[serde(default)]
    pub injection_plan: Option<Vec<Value>>,

    /// Model parameters, passed through untouched
    #[serde(default)]
    pub model_parameters: Map<String, Value>,

    /// Model settings, passed through untouched
    #[serde(default)]
    pub model_settings: Map<String, Value>,
}

impl ModelInput {
    /// Build a model input from a raw mapping.
    ///
    /// Runs JSON Schema validation first, then typed deserialization
    /// (timestamp and number coercion, defaults for optional fields).
    pub fn from_value(raw: Value) -> Result<Self, SchemaError> {
        validate_input_schema(&raw).map_err(SchemaError::Invalid)?;

        let input: ModelInput = serde_json::from_value(raw)?;

        if input.forecast_window() <= Duration::zero() {
            tracing::warn!(
                forecast_start = %input.forecast_start,
                forecast_end = %input.forecast_end,
                "Forecast window is empty or inverted"
            );
        }

        Ok(input)
    }

    /// Parse a model input from JSON string.
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        let raw: Value = serde_json::from_str(json)?;
        Self::from_value(raw)
    }

    /// Parse a model input from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, SchemaError> {
        let raw: Value = serde_yaml::from_str(yaml)?;
        Self::from_value(raw)
    }

    /// Parse a model input from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Parse a model input from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Length of the forecast window. Negative if the bounds are inverted.
    pub fn forecast_window(&self) -> Duration {
        self.forecast_end - self.forecast_start
    }
}
