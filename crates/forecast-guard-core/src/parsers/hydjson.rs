//! Borehole hydraulics records in hydjson form.
//!
//! Structure is checked against an embedded JSON Schema; sample timestamps
//! must also parse.

use serde_json::Value;

use super::{FormatError, HydraulicsParser, HydraulicsSummary, ParseFailure};
use crate::schema::{parse_timestamp, CompiledSchema};

const HYDJSON_SCHEMA_JSON: &str = include_str!("../../schema/hydjson.schema.json");

static HYDJSON_SCHEMA: CompiledSchema = CompiledSchema::new(HYDJSON_SCHEMA_JSON);

/// Built-in hydjson borehole parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct HydJsonParser;

impl HydJsonParser {
    fn check(&self, record: &Value) -> Result<HydraulicsSummary, FormatError> {
        HYDJSON_SCHEMA
            .validate(record)
            .map_err(|errors| FormatError::new("hydjson", errors.join("; ")))?;

        let sections = record["sections"].as_array().map(Vec::as_slice).unwrap_or_default();

        let mut samples = 0;
        for (i, section) in sections.iter().enumerate() {
            let hydraulics = section["hydraulics"].as_array().map(Vec::as_slice).unwrap_or_default();
            for (j, sample) in hydraulics.iter().enumerate() {
                let raw = sample["datetime"]["value"].as_str().unwrap_or_default();
                parse_timestamp(raw).map_err(|e| {
                    FormatError::new("hydjson", format!("sections/{}/hydraulics/{}: {}", i, j, e))
                })?;
            }
            samples += hydraulics.len();
        }

        Ok(HydraulicsSummary {
            sections: sections.len(),
            samples,
        })
    }
}

impl HydraulicsParser for HydJsonParser {
    fn parse(&self, record: &Value) -> Result<HydraulicsSummary, ParseFailure> {
        Ok(self.check(record)?)
    }
}
