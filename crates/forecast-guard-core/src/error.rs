//! Contract violation taxonomy.

use thiserror::Error;

use crate::schema::SchemaError;

/// A violation of the entry-point contract.
///
/// Flat, one variant per category. Semantic variants carry a fixed message;
/// the parser detail behind them is intentionally dropped.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GuardError {
    #[error("Only one argument is allowed, got {0}")]
    InvalidArity(usize),

    #[error("Invalid model input: {}", .0.join("; "))]
    SchemaViolation(Vec<String>),

    #[error("{0} support is not available, enable it to use induced seismicity features")]
    CapabilityUnavailable(&'static str),

    #[error("Invalid injection observation, please use valid hydjson")]
    InvalidInjectionObservation,

    #[error("Invalid injection plan, please use valid hydjson")]
    InvalidInjectionPlan,

    #[error("Invalid format for seismic catalog, please use valid QuakeML")]
    InvalidSeismicCatalog,

    #[error("Invalid format for bounding polygon, please use valid WKT")]
    InvalidGeometry,

    #[error("Result {0} is not a point catalog, rate grid summary or tabular forecast")]
    InvalidResultType(usize),

    #[error("Results are missing required columns")]
    MissingResultColumns,
}

impl GuardError {
    /// Stable snake_case identifier for the violation category.
    pub fn kind(&self) -> &'static str {
        match self {
            GuardError::InvalidArity(_) => "invalid_arity",
            GuardError::SchemaViolation(_) => "schema_violation",
            GuardError::CapabilityUnavailable(_) => "capability_unavailable",
            GuardError::InvalidInjectionObservation => "invalid_injection_observation",
            GuardError::InvalidInjectionPlan => "invalid_injection_plan",
            GuardError::InvalidSeismicCatalog => "invalid_seismic_catalog",
            GuardError::InvalidGeometry => "invalid_geometry",
            GuardError::InvalidResultType(_) => "invalid_result_type",
            GuardError::MissingResultColumns => "missing_result_columns",
        }
    }
}

impl From<SchemaError> for GuardError {
    fn from(err: SchemaError) -> Self {
        GuardError::SchemaViolation(err.violations())
    }
}

/// Failure of a guarded call.
///
/// Contract violations and the model's own errors stay separate: a model
/// error is handed back exactly as the model returned it.
#[derive(Error, Debug)]
pub enum CallError<E> {
    #[error(transparent)]
    Contract(#[from] GuardError),

    #[error(transparent)]
    Model(E),
}

impl<E> CallError<E> {
    /// The contract violation, if this is one.
    pub fn contract(&self) -> Option<&GuardError> {
        match self {
            CallError::Contract(e) => Some(e),
            CallError::Model(_) => None,
        }
    }

    /// The model's own error, if this is one.
    pub fn into_model(self) -> Option<E> {
        match self {
            CallError::Model(e) => Some(e),
            CallError::Contract(_) => None,
        }
    }
}
