//! Input schema for forecast model entry points.
//!
//! A model input bundle is structured data validated against JSON Schema
//! and then deserialized into a typed [`ModelInput`]. This module handles
//! both layers. Semantic checks of the embedded payloads (catalog, polygon,
//! hydraulics) are not done here; the guard layers them on top.

mod coerce;
mod input;
mod validator;

pub use input::{ModelInput, SchemaError};
pub use validator::{input_schema, is_valid_input, validate_input_schema};

#[cfg(feature = "hydraulics")]
pub(crate) use coerce::parse_timestamp;
#[cfg(feature = "hydraulics")]
pub(crate) use validator::CompiledSchema;
