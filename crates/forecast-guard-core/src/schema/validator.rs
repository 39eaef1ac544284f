//! JSON Schema validation for model inputs.
//!
//! The input bundle is validated against `schema/model_input.schema.json`,
//! embedded at compile time. The schema is strict: unknown top-level keys
//! are rejected (`additionalProperties: false`).

use std::sync::OnceLock;

/// Embedded model input schema (loaded at compile time).
const MODEL_INPUT_SCHEMA_JSON: &str = include_str!("../../schema/model_input.schema.json");

/// Compiled model input validator (initialized once, reused).
static MODEL_INPUT_SCHEMA: CompiledSchema = CompiledSchema::new(MODEL_INPUT_SCHEMA_JSON);

/// A JSON Schema document compiled lazily on first use.
///
/// Shared by the input schema and the built-in hydjson parser.
pub(crate) struct CompiledSchema {
    source: &'static str,
    compiled: OnceLock<Result<jsonschema::Validator, String>>,
}

impl CompiledSchema {
    pub(crate) const fn new(source: &'static str) -> Self {
        Self {
            source,
            compiled: OnceLock::new(),
        }
    }

    /// Get or initialize the compiled validator.
    pub(crate) fn validator(&self) -> Result<&jsonschema::Validator, String> {
        let result = self.compiled.get_or_init(|| {
            let schema_value: serde_json::Value = match serde_json::from_str(self.source) {
                Ok(v) => v,
                Err(e) => return Err(format!("Invalid schema JSON: {}", e)),
            };

            match jsonschema::options().build(&schema_value) {
                Ok(v) => Ok(v),
                Err(e) => Err(format!("Failed to compile schema: {}", e)),
            }
        });

        match result {
            Ok(v) => Ok(v),
            Err(e) => Err(e.clone()),
        }
    }

    /// Validate `instance`, collecting every violation with its location.
    pub(crate) fn validate(&self, instance: &serde_json::Value) -> Result<(), Vec<String>> {
        let validator = self.validator().map_err(|e| vec![e])?;

        let errors: Vec<String> = validator
            .iter_errors(instance)
            .map(|e| {
                let path = e.instance_path.to_string();
                if path.is_empty() {
                    e.to_string()
                } else {
                    format!("{} at {}", e, path)
                }
            })
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub(crate) fn is_valid(&self, instance: &serde_json::Value) -> bool {
        self.validator()
            .map(|v| v.is_valid(instance))
            .unwrap_or(false)
    }
}

/// The raw model input JSON Schema document.
pub fn input_schema() -> &'static str {
    MODEL_INPUT_SCHEMA_JSON
}

/// Validate a raw model input against the schema.
///
/// # Returns
///
/// * `Ok(())` - Input is structurally valid
/// * `Err(Vec<String>)` - List of validation errors
pub fn validate_input_schema(input: &serde_json::Value) -> Result<(), Vec<String>> {
    MODEL_INPUT_SCHEMA.validate(input)
}

/// Check if a raw model input is valid against the schema.
///
/// Use `validate_input_schema` for detailed error messages.
pub fn is_valid_input(input: &serde_json::Value) -> bool {
    MODEL_INPUT_SCHEMA.is_valid(input)
}
