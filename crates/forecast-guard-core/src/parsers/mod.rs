//! External format collaborators and the adapter boundary around them.
//!
//! Catalog, geometry and hydraulics parsing belong to other libraries. The
//! guard only needs to know whether a payload parses. Each `check_*`
//! function below is the single place where a parser's failure (an `Err`
//! or a panic) is caught and collapsed into one normalized [`GuardError`].

mod quakeml;
mod wkt;

#[cfg(feature = "hydraulics")]
mod hydjson;

pub use quakeml::{CatalogSummary, QuakeMlParser};
pub use wkt::{Coord, Geometry, Polygon, WktParser};

#[cfg(feature = "hydraulics")]
pub use hydjson::HydJsonParser;

use serde_json::Value;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use thiserror::Error;

use crate::error::GuardError;

/// Failure reported by a parser. Its content never reaches the caller.
pub type ParseFailure = Box<dyn std::error::Error + Send + Sync>;

/// Rejection reason from one of the built-in parsers.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{format}: {reason}")]
pub struct FormatError {
    pub format: &'static str,
    pub reason: String,
}

impl FormatError {
    pub(crate) fn new(format: &'static str, reason: impl Into<String>) -> Self {
        Self {
            format,
            reason: reason.into(),
        }
    }
}

/// Summary of one borehole hydraulics record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HydraulicsSummary {
    /// Number of borehole sections
    pub sections: usize,
    /// Number of hydraulic samples across all sections
    pub samples: usize,
}

/// Parses serialized seismic event catalogs.
pub trait CatalogParser: Send + Sync {
    fn parse(&self, raw: &str) -> Result<CatalogSummary, ParseFailure>;
}

/// Parses well-known-text geometries.
pub trait GeometryParser: Send + Sync {
    fn parse(&self, wkt: &str) -> Result<Geometry, ParseFailure>;
}

/// Parses borehole hydraulics records.
pub trait HydraulicsParser: Send + Sync {
    fn parse(&self, record: &Value) -> Result<HydraulicsSummary, ParseFailure>;
}

impl<F> CatalogParser for F
where
    F: Fn(&str) -> Result<CatalogSummary, ParseFailure> + Send + Sync,
{
    fn parse(&self, raw: &str) -> Result<CatalogSummary, ParseFailure> {
        self(raw)
    }
}

impl<F> GeometryParser for F
where
    F: Fn(&str) -> Result<Geometry, ParseFailure> + Send + Sync,
{
    fn parse(&self, wkt: &str) -> Result<Geometry, ParseFailure> {
        self(wkt)
    }
}

impl<F> HydraulicsParser for F
where
    F: Fn(&Value) -> Result<HydraulicsSummary, ParseFailure> + Send + Sync,
{
    fn parse(&self, record: &Value) -> Result<HydraulicsSummary, ParseFailure> {
        self(record)
    }
}

/// The parsers a guard validates against.
///
/// `hydraulics` is the optional capability: `None` means induced-mode
/// validation cannot run.
#[derive(Clone)]
pub struct Collaborators {
    pub catalog: Arc<dyn CatalogParser>,
    pub geometry: Arc<dyn GeometryParser>,
    pub hydraulics: Option<Arc<dyn HydraulicsParser>>,
}

impl Collaborators {
    /// Built-in parsers. Hydraulics is present iff the `hydraulics` feature
    /// is compiled in.
    pub fn builtin() -> Self {
        Self {
            catalog: Arc::new(QuakeMlParser),
            geometry: Arc::new(WktParser),
            hydraulics: builtin_hydraulics(),
        }
    }

    pub fn with_catalog(mut self, parser: Arc<dyn CatalogParser>) -> Self {
        self.catalog = parser;
        self
    }

    pub fn with_geometry(mut self, parser: Arc<dyn GeometryParser>) -> Self {
        self.geometry = parser;
        self
    }

    pub fn with_hydraulics(mut self, parser: Arc<dyn HydraulicsParser>) -> Self {
        self.hydraulics = Some(parser);
        self
    }

    pub fn without_hydraulics(mut self) -> Self {
        self.hydraulics = None;
        self
    }

    pub fn has_hydraulics(&self) -> bool {
        self.hydraulics.is_some()
    }
}

impl Default for Collaborators {
    fn default() -> Self {
        Self::builtin()
    }
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators")
            .field("hydraulics", &self.has_hydraulics())
            .finish_non_exhaustive()
    }
}

#[cfg(feature = "hydraulics")]
fn builtin_hydraulics() -> Option<Arc<dyn HydraulicsParser>> {
    Some(Arc::new(HydJsonParser))
}

#[cfg(not(feature = "hydraulics"))]
fn builtin_hydraulics() -> Option<Arc<dyn HydraulicsParser>> {
    None
}

/// Run a parser, treating an error and a panic alike.
fn shielded<T>(parse: impl FnOnce() -> Result<T, ParseFailure>) -> Option<T> {
    match panic::catch_unwind(AssertUnwindSafe(parse)) {
        Ok(Ok(parsed)) => Some(parsed),
        Ok(Err(e)) => {
            tracing::trace!(error = %e, "Parser rejected payload");
            None
        }
        Err(_) => {
            tracing::trace!("Parser panicked");
            None
        }
    }
}

/// Parse the seismic catalog or fail with `InvalidSeismicCatalog`.
pub fn check_catalog(parser: &dyn CatalogParser, raw: &str) -> Result<CatalogSummary, GuardError> {
    shielded(|| parser.parse(raw)).ok_or(GuardError::InvalidSeismicCatalog)
}

/// Parse the bounding polygon or fail with `InvalidGeometry`.
pub fn check_geometry(parser: &dyn GeometryParser, wkt: &str) -> Result<Geometry, GuardError> {
    shielded(|| parser.parse(wkt)).ok_or(GuardError::InvalidGeometry)
}

/// Parse every observed well, in order, or fail with
/// `InvalidInjectionObservation`. A missing field or a null well fails too.
pub fn check_injection_observation(
    parser: &dyn HydraulicsParser,
    wells: Option<&[Option<Value>]>,
) -> Result<Vec<HydraulicsSummary>, GuardError> {
    let wells = wells.ok_or(GuardError::InvalidInjectionObservation)?;

    wells
        .iter()
        .map(|well| {
            let record = well.as_ref().ok_or(GuardError::InvalidInjectionObservation)?;
            shielded(|| parser.parse(record)).ok_or(GuardError::InvalidInjectionObservation)
        })
        .collect()
}

/// Parse every planned well or fail with `InvalidInjectionPlan`.
pub fn check_injection_plan(
    parser: &dyn HydraulicsParser,
    plan: Option<&[Value]>,
) -> Result<Vec<HydraulicsSummary>, GuardError> {
    let plan = plan.ok_or(GuardError::InvalidInjectionPlan)?;

    plan.iter()
        .map(|record| shielded(|| parser.parse(record)).ok_or(GuardError::InvalidInjectionPlan))
        .collect()
}
