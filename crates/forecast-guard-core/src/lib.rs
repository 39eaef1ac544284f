//! # forecast-guard-core
//!
//! Contract enforcement for earthquake-forecast model entry points.
//!
//! A forecast model takes one input bundle (forecast window, seismic
//! catalog, bounding polygon, optional injection data, free-form
//! parameters) and returns point catalogs, rate grids or tables. This
//! crate checks everything that crosses that boundary:
//! - Does the input bundle match the schema?
//! - Do the embedded catalog, polygon and hydraulics payloads parse?
//! - Are the returned results recognized kinds with the required columns?
//!
//! ## Key Guarantees
//!
//! 1. **Ordered gates**: checks run in a fixed order and the first
//!    violation aborts the call
//! 2. **Stable errors**: nine violation kinds, parser detail never leaks
//! 3. **Clean boundary**: the model's own errors are returned untouched
//! 4. **Stateless**: one guard can serve concurrent calls
//!
//! ## Example
//!
//! ```rust,ignore
//! use forecast_guard_core::{guard, CallError, ForecastResult, ModelInput};
//! use serde_json::{Map, Value};
//!
//! let forecast = guard(|input: &ModelInput, _: &Map<String, Value>| {
//!     Ok::<_, MyModelError>(vec![ForecastResult::RateGridSummary(run(input))])
//! });
//!
//! match forecast.call(raw_input) {
//!     Ok(results) => publish(results),
//!     Err(CallError::Contract(violation)) => eprintln!("{}: {}", violation.kind(), violation),
//!     Err(CallError::Model(e)) => return Err(e),
//! }
//! ```

pub mod error;
pub mod guard;
pub mod options;
pub mod parsers;
pub mod results;
pub mod schema;

// Re-export main types at crate root
pub use error::{CallError, GuardError};
pub use guard::{
    check_results, guard, guard_with_options, EntryPointGuard, PrecheckReport, HYDRAULICS_CAPABILITY,
};
pub use options::{GuardOptions, OptionsError};
pub use parsers::{
    CatalogParser, CatalogSummary, Collaborators, Geometry, GeometryParser, HydraulicsParser,
    HydraulicsSummary, ParseFailure,
};
pub use results::{ForecastOutput, ForecastResult, ResultKind, Table, GRID_COLUMNS, POINT_COLUMNS};
pub use schema::{validate_input_schema, ModelInput, SchemaError};
