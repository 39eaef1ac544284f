//! Entry-point guard: contract enforcement around a forecast model.
//!
//! A guarded call runs these gates in order. The first failure aborts the
//! call and nothing partial is returned:
//!
//! 1. exactly one raw input argument
//! 2. input schema
//! 3. hydraulics capability (induced mode only)
//! 4. injection observation (induced mode only)
//! 5. injection plan (induced mode only)
//! 6. seismic catalog
//! 7. bounding polygon
//! 8. the model itself, called once; its own errors pass through untouched
//! 9. every result is a recognized kind
//! 10. results share one required column set
//!
//! The guard holds no state between calls.

use serde_json::{Map, Value};

use crate::error::{CallError, GuardError};
use crate::options::GuardOptions;
use crate::parsers::{
    check_catalog, check_geometry, check_injection_observation, check_injection_plan,
    CatalogSummary, Collaborators, Geometry, HydraulicsSummary,
};
use crate::results::{first_unrecognized, homogeneous_column_set, ForecastOutput};
use crate::schema::ModelInput;

/// Name of the optional component induced mode depends on.
pub const HYDRAULICS_CAPABILITY: &str = "hydraulics";

/// A forecast model wrapped in contract checks.
#[derive(Debug, Clone)]
pub struct EntryPointGuard<F> {
    model: F,
    options: GuardOptions,
    collaborators: Collaborators,
}

/// Everything the input gates learned about one raw input.
#[derive(Debug, Clone, PartialEq)]
pub struct PrecheckReport {
    pub input: ModelInput,
    pub catalog: CatalogSummary,
    pub geometry: Geometry,
    /// One entry per observed well; empty outside induced mode
    pub observation: Vec<HydraulicsSummary>,
    /// One entry per planned well; empty outside induced mode
    pub plan: Vec<HydraulicsSummary>,
}

/// Guard a model with default options.
///
/// Same as `guard_with_options(GuardOptions::default())(model)`.
pub fn guard<F>(model: F) -> EntryPointGuard<F> {
    guard_with_options(GuardOptions::default())(model)
}

/// Build a guard factory for the given options.
///
/// ```rust,ignore
/// let induced = guard_with_options(GuardOptions::induced());
/// let forecast = induced(|input: &ModelInput, _: &Map<String, Value>| run(input));
/// ```
pub fn guard_with_options<F>(options: GuardOptions) -> impl FnOnce(F) -> EntryPointGuard<F> {
    move |model| EntryPointGuard::new(model, options)
}

impl<F> EntryPointGuard<F> {
    /// Wrap `model`, validating against the built-in parsers.
    pub fn new(model: F, options: GuardOptions) -> Self {
        Self {
            model,
            options,
            collaborators: Collaborators::builtin(),
        }
    }

    /// Replace the parsers (and with them the hydraulics capability).
    pub fn with_collaborators(mut self, collaborators: Collaborators) -> Self {
        self.collaborators = collaborators;
        self
    }

    pub fn options(&self) -> GuardOptions {
        self.options
    }

    pub fn induced(&self) -> bool {
        self.options.induced
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    /// The wrapped model.
    pub fn inner(&self) -> &F {
        &self.model
    }

    /// Run the input gates (schema and semantic pre-checks) without calling
    /// the model.
    pub fn precheck(&self, raw: &Value) -> Result<ModelInput, GuardError> {
        self.precheck_report(raw).map(|report| report.input)
    }

    /// Like [`precheck`](Self::precheck), keeping the parser summaries.
    pub fn precheck_report(&self, raw: &Value) -> Result<PrecheckReport, GuardError> {
        let input = ModelInput::from_value(raw.clone())?;
        tracing::debug!(step = "schema", "Model input matches schema");

        let (observation, plan) = if self.options.induced {
            let hydraulics = self
                .collaborators
                .hydraulics
                .as_deref()
                .ok_or(GuardError::CapabilityUnavailable(HYDRAULICS_CAPABILITY))?;

            let observation =
                check_injection_observation(hydraulics, input.injection_observation.as_deref())?;
            tracing::debug!(step = "injection_observation", wells = observation.len(), "Injection observation valid");

            let plan = check_injection_plan(hydraulics, input.injection_plan.as_deref())?;
            tracing::debug!(step = "injection_plan", wells = plan.len(), "Injection plan valid");

            (observation, plan)
        } else {
            (Vec::new(), Vec::new())
        };

        let catalog = check_catalog(self.collaborators.catalog.as_ref(), &input.seismic_catalog)?;
        tracing::debug!(step = "seismic_catalog", events = catalog.events, "Seismic catalog valid");

        let geometry =
            check_geometry(self.collaborators.geometry.as_ref(), &input.bounding_polygon)?;
        tracing::debug!(step = "geometry", rings = geometry.ring_count(), "Bounding polygon valid");

        Ok(PrecheckReport {
            input,
            catalog,
            geometry,
            observation,
            plan,
        })
    }

    /// Call the model with positional `args` and passthrough keyword
    /// arguments.
    ///
    /// Exactly one positional argument (the raw input mapping) is accepted.
    pub fn call_with<T, E>(
        &self,
        args: &[Value],
        passthrough: &Map<String, Value>,
    ) -> Result<Vec<T>, CallError<E>>
    where
        F: Fn(&ModelInput, &Map<String, Value>) -> Result<Vec<T>, E>,
        T: ForecastOutput,
    {
        let raw = match args {
            [raw] => raw,
            _ => return Err(GuardError::InvalidArity(args.len()).into()),
        };

        let input = self.precheck(raw)?;

        let results = (self.model)(&input, passthrough).map_err(CallError::Model)?;
        tracing::debug!(step = "model", items = results.len(), induced = self.options.induced, "Model returned");

        check_results(&results)?;

        Ok(results)
    }

    /// Call the model with one raw input mapping.
    pub fn call<T, E>(&self, raw: Value) -> Result<Vec<T>, CallError<E>>
    where
        F: Fn(&ModelInput, &Map<String, Value>) -> Result<Vec<T>, E>,
        T: ForecastOutput,
    {
        self.call_with(std::slice::from_ref(&raw), &Map::new())
    }
}

/// Run the result gates on a returned collection.
///
/// Types are checked first, then the homogeneous column rule. An empty
/// collection passes both.
pub fn check_results<T: ForecastOutput>(results: &[T]) -> Result<(), GuardError> {
    if let Some(index) = first_unrecognized(results) {
        return Err(GuardError::InvalidResultType(index));
    }

    let columns = homogeneous_column_set(results).ok_or(GuardError::MissingResultColumns)?;
    tracing::debug!(step = "results", items = results.len(), columns = columns.len(), "Results valid");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::stubs::*;
    use crate::results::fixtures::{grid_table, point_table};
    use crate::results::{ForecastResult, Table};
    use proptest::prelude::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    type Kwargs = Map<String, Value>;

    const QUAKEML: &str = r#"<?xml version="1.0"?>
<q:quakeml xmlns:q="http://quakeml.org/xmlns/quakeml/1.2" xmlns="http://quakeml.org/xmlns/bed/1.2">
  <eventParameters publicID="smi:test/ep">
    <event publicID="smi:test/1"><type>earthquake</type></event>
  </eventParameters>
</q:quakeml>"#;

    fn model_input() -> Value {
        json!({
            "forecast_start": "2020-01-01T00:00:00",
            "forecast_end": "2021-01-01T00:00:00",
            "seismic_catalog": QUAKEML,
            "bounding_polygon": "POLYGON((0 0,1 0,1 1,0 1,0 0))"
        })
    }

    fn borehole() -> Value {
        json!({
            "sections": [{
                "hydraulics": [{"datetime": {"value": "2020-01-01T00:00:00"}}]
            }]
        })
    }

    fn model_input_hyd() -> Value {
        let mut raw = model_input();
        raw["injection_observation"] = json!([borehole()]);
        raw["injection_plan"] = json!([borehole()]);
        raw
    }

    fn point_forecast(
        _: &ModelInput,
        _: &Kwargs,
    ) -> Result<Vec<ForecastResult>, String> {
        Ok(vec![ForecastResult::TabularForecast(point_table())])
    }

    #[test]
    fn test_valid_input_returns_results() {
        let forecast = guard(point_forecast);
        let results = forecast.call(model_input()).unwrap();
        assert_eq!(results, vec![ForecastResult::TabularForecast(point_table())]);
    }

    #[test]
    fn test_placeholder_catalog_rejected() {
        let mut raw = model_input();
        raw["seismic_catalog"] = json!("<dummy_quakeml>");
        let err = guard(point_forecast).call(raw).unwrap_err();
        assert!(matches!(err, CallError::Contract(GuardError::InvalidSeismicCatalog)));
    }

    #[test]
    fn test_invalid_arity() {
        let calls = AtomicUsize::new(0);
        let forecast = guard(|_: &ModelInput, _: &Kwargs| -> Result<Vec<ForecastResult>, String> {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![])
        });

        let err = forecast
            .call_with(&[json!({}), json!({})], &Kwargs::new())
            .unwrap_err();
        assert!(matches!(err, CallError::Contract(GuardError::InvalidArity(2))));

        let err = forecast.call_with(&[], &Kwargs::new()).unwrap_err();
        assert!(matches!(err, CallError::Contract(GuardError::InvalidArity(0))));

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_missing_required_field_never_calls_model() {
        let calls = AtomicUsize::new(0);
        let forecast = guard(|_: &ModelInput, _: &Kwargs| -> Result<Vec<ForecastResult>, String> {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![])
        });

        for field in ["forecast_start", "forecast_end", "seismic_catalog", "bounding_polygon"] {
            let mut raw = model_input();
            raw.as_object_mut().unwrap().remove(field);
            let err = forecast.call(raw).unwrap_err();
            assert!(
                matches!(err, CallError::Contract(GuardError::SchemaViolation(_))),
                "{}",
                field
            );
        }

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unknown_field_is_schema_violation() {
        let mut raw = model_input();
        raw["seismicity_observation"] = json!(QUAKEML);
        let err = guard(point_forecast).call(raw).unwrap_err();
        assert!(matches!(err, CallError::Contract(GuardError::SchemaViolation(_))));
    }

    #[test]
    fn test_invalid_catalog_with_valid_geometry() {
        let forecast = guard(point_forecast)
            .with_collaborators(permissive().with_catalog(Arc::new(reject_catalog)));
        let err = forecast.call(model_input()).unwrap_err();
        assert!(matches!(err, CallError::Contract(GuardError::InvalidSeismicCatalog)));
    }

    #[test]
    fn test_panicking_catalog_parser_normalized() {
        let forecast = guard(point_forecast)
            .with_collaborators(permissive().with_catalog(Arc::new(panic_catalog)));
        let err = forecast.call(model_input()).unwrap_err();
        assert!(matches!(err, CallError::Contract(GuardError::InvalidSeismicCatalog)));
    }

    #[test]
    fn test_invalid_geometry() {
        let mut raw = model_input();
        raw["bounding_polygon"] = json!("POLYGON((0 0,1 0,1 1))");
        let err = guard(point_forecast).call(raw).unwrap_err();
        assert!(matches!(err, CallError::Contract(GuardError::InvalidGeometry)));
    }

    #[test]
    fn test_catalog_checked_before_geometry() {
        let forecast = guard(point_forecast).with_collaborators(
            permissive()
                .with_catalog(Arc::new(reject_catalog))
                .with_geometry(Arc::new(reject_geometry)),
        );
        let err = forecast.call(model_input()).unwrap_err();
        assert!(matches!(err, CallError::Contract(GuardError::InvalidSeismicCatalog)));
    }

    #[test]
    fn test_injection_checked_before_catalog() {
        let forecast = guard_with_options(GuardOptions::induced())(point_forecast).with_collaborators(
            permissive()
                .with_catalog(Arc::new(reject_catalog))
                .with_geometry(Arc::new(reject_geometry))
                .with_hydraulics(Arc::new(reject_hydraulics)),
        );
        let err = forecast.call(model_input_hyd()).unwrap_err();
        assert!(matches!(err, CallError::Contract(GuardError::InvalidInjectionObservation)));
    }

    #[test]
    fn test_schema_checked_first() {
        let forecast = guard_with_options(GuardOptions::induced())(point_forecast)
            .with_collaborators(permissive().without_hydraulics());
        let mut raw = model_input_hyd();
        raw.as_object_mut().unwrap().remove("seismic_catalog");
        let err = forecast.call(raw).unwrap_err();
        assert!(matches!(err, CallError::Contract(GuardError::SchemaViolation(_))));
    }

    #[test]
    fn test_invalid_result_type() {
        let forecast = guard(|_: &ModelInput, _: &Kwargs| -> Result<Vec<Value>, String> {
            Ok(vec![json!("not a valid type")])
        })
        .with_collaborators(permissive());
        let err = forecast.call(model_input()).unwrap_err();
        assert!(matches!(err, CallError::Contract(GuardError::InvalidResultType(0))));
    }

    #[test]
    fn test_result_type_checked_before_columns() {
        // The first item would fail the column rule, the second is not a result.
        let forecast = guard(|_: &ModelInput, _: &Kwargs| -> Result<Vec<Value>, String> {
            Ok(vec![
                json!({"kind": "tabular_forecast", "columns": ["foo"], "rows": []}),
                json!(17),
            ])
        })
        .with_collaborators(permissive());
        let err = forecast.call(model_input()).unwrap_err();
        assert!(matches!(err, CallError::Contract(GuardError::InvalidResultType(1))));
    }

    #[test]
    fn test_empty_results_are_valid() {
        let forecast = guard(|_: &ModelInput, _: &Kwargs| -> Result<Vec<Value>, String> {
            Ok(vec![])
        });
        assert!(forecast.call(model_input()).unwrap().is_empty());
    }

    #[test]
    fn test_missing_magnitude_column() {
        let forecast = guard(|_: &ModelInput, _: &Kwargs| -> Result<Vec<ForecastResult>, String> {
            let table = Table::from_columns([
                ("longitude", vec![json!(1.0)]),
                ("latitude", vec![json!(2.0)]),
                ("depth", vec![json!(3.0)]),
                ("time", vec![json!("2020-01-01")]),
            ])
            .unwrap();
            Ok(vec![ForecastResult::PointCatalog(table)])
        });
        let err = forecast.call(model_input()).unwrap_err();
        assert!(matches!(err, CallError::Contract(GuardError::MissingResultColumns)));
    }

    #[test]
    fn test_mixed_kinds_rejected() {
        let forecast = guard(|_: &ModelInput, _: &Kwargs| -> Result<Vec<ForecastResult>, String> {
            Ok(vec![
                ForecastResult::PointCatalog(point_table()),
                ForecastResult::RateGridSummary(grid_table(1.0)),
            ])
        });
        let err = forecast.call(model_input()).unwrap_err();
        assert!(matches!(err, CallError::Contract(GuardError::MissingResultColumns)));
    }

    #[test]
    fn test_grid_results_returned_unchanged() {
        let expected: Vec<ForecastResult> = [1.0, 2.0, 3.0]
            .iter()
            .map(|a| ForecastResult::RateGridSummary(grid_table(*a)))
            .collect();
        let returned = expected.clone();
        let forecast = guard(move |_: &ModelInput, _: &Kwargs| -> Result<Vec<ForecastResult>, String> {
            Ok(returned.clone())
        });
        assert_eq!(forecast.call(model_input()).unwrap(), expected);
    }

    #[test]
    fn test_model_error_passes_through() {
        #[derive(Debug, PartialEq)]
        struct Diverged(u32);

        let forecast = guard(|_: &ModelInput, _: &Kwargs| -> Result<Vec<ForecastResult>, Diverged> {
            Err(Diverged(7))
        });
        let err = forecast.call(model_input()).unwrap_err();
        assert_eq!(err.into_model(), Some(Diverged(7)));
    }

    #[test]
    fn test_passthrough_and_typed_input_reach_model() {
        let forecast = guard(|input: &ModelInput, kwargs: &Kwargs| -> Result<Vec<ForecastResult>, String> {
            assert_eq!(input.seismic_catalog, QUAKEML);
            assert!(input.model_parameters.is_empty());
            assert_eq!(kwargs["seed"], json!(42));
            Ok(vec![])
        });
        let mut kwargs = Kwargs::new();
        kwargs.insert("seed".into(), json!(42));
        forecast.call_with(&[model_input()], &kwargs).unwrap();
    }

    #[test]
    fn test_model_called_exactly_once() {
        let calls = AtomicUsize::new(0);
        let forecast = guard(|_: &ModelInput, _: &Kwargs| -> Result<Vec<ForecastResult>, String> {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![ForecastResult::PointCatalog(point_table())])
        });
        forecast.call(model_input()).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_induced_without_capability() {
        let forecast = guard_with_options(GuardOptions::induced())(point_forecast)
            .with_collaborators(permissive().without_hydraulics());

        // Regardless of whether injection fields are present.
        for raw in [model_input_hyd(), model_input()] {
            let err = forecast.call(raw).unwrap_err();
            assert!(matches!(
                err,
                CallError::Contract(GuardError::CapabilityUnavailable(HYDRAULICS_CAPABILITY))
            ));
        }
    }

    #[test]
    fn test_non_induced_ignores_capability() {
        let forecast = guard(point_forecast).with_collaborators(Collaborators::builtin().without_hydraulics());
        assert!(forecast.call(model_input()).is_ok());
    }

    #[cfg(feature = "hydraulics")]
    #[test]
    fn test_induced_with_builtin_parsers() {
        let forecast = guard_with_options(GuardOptions::induced())(point_forecast);
        assert!(forecast.call(model_input_hyd()).is_ok());
    }

    #[test]
    fn test_induced_null_observation_field() {
        let forecast = guard_with_options(GuardOptions::induced())(point_forecast)
            .with_collaborators(permissive());
        let mut raw = model_input_hyd();
        raw["injection_observation"] = Value::Null;
        let err = forecast.call(raw).unwrap_err();
        assert!(matches!(err, CallError::Contract(GuardError::InvalidInjectionObservation)));
    }

    #[test]
    fn test_induced_null_observation_element() {
        let forecast = guard_with_options(GuardOptions::induced())(point_forecast)
            .with_collaborators(permissive());
        let mut raw = model_input_hyd();
        raw["injection_observation"] = json!([borehole(), null, borehole()]);
        let err = forecast.call(raw).unwrap_err();
        assert!(matches!(err, CallError::Contract(GuardError::InvalidInjectionObservation)));
    }

    #[test]
    fn test_induced_unparseable_observation() {
        let forecast = guard_with_options(GuardOptions::induced())(point_forecast)
            .with_collaborators(permissive().with_hydraulics(Arc::new(reject_hydraulics)));
        let err = forecast.call(model_input_hyd()).unwrap_err();
        assert!(matches!(err, CallError::Contract(GuardError::InvalidInjectionObservation)));
    }

    #[test]
    fn test_induced_missing_plan() {
        let forecast = guard_with_options(GuardOptions::induced())(point_forecast)
            .with_collaborators(permissive());
        let mut raw = model_input_hyd();
        raw["injection_plan"] = Value::Null;
        let err = forecast.call(raw).unwrap_err();
        assert!(matches!(err, CallError::Contract(GuardError::InvalidInjectionPlan)));
    }

    #[test]
    fn test_non_induced_ignores_injection_fields() {
        let forecast = guard(point_forecast).with_collaborators(permissive());
        let mut raw = model_input();
        raw["injection_observation"] = json!([null]);
        assert!(forecast.call(raw).is_ok());
    }

    #[test]
    fn test_bare_and_default_factory_match() {
        let bare = guard(point_forecast);
        let factory = guard_with_options(GuardOptions::default())(point_forecast);
        assert_eq!(bare.options(), factory.options());
        assert_eq!(
            bare.call(model_input()).unwrap(),
            factory.call(model_input()).unwrap()
        );
    }

    #[test]
    fn test_repeated_calls_identical() {
        let forecast = guard(point_forecast);
        let first = forecast.call(model_input()).unwrap();
        let second = forecast.call(model_input()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_concurrent_calls() {
        let forecast = guard(point_forecast);
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| forecast.call(model_input())))
                .collect();
            for handle in handles {
                let results = handle.join().unwrap().unwrap();
                assert_eq!(results.len(), 1);
            }
        });
    }

    #[test]
    fn test_precheck_returns_typed_input() {
        let input = guard(point_forecast).precheck(&model_input()).unwrap();
        assert_eq!(input.bounding_polygon, "POLYGON((0 0,1 0,1 1,0 1,0 0))");
    }

    #[test]
    fn test_precheck_report_keeps_summaries() {
        let report = guard(point_forecast).precheck_report(&model_input()).unwrap();
        assert_eq!(report.catalog.events, 1);
        assert_eq!(report.geometry.ring_count(), 1);
        assert_eq!(report.geometry.bounds(), Some((0.0, 0.0, 1.0, 1.0)));
        assert!(report.observation.is_empty());
        assert!(report.plan.is_empty());
    }

    #[cfg(feature = "hydraulics")]
    #[test]
    fn test_precheck_report_induced_hydraulics() {
        let forecast = guard_with_options(GuardOptions::induced())(point_forecast);
        let report = forecast.precheck_report(&model_input_hyd()).unwrap();
        let borehole = HydraulicsSummary {
            sections: 1,
            samples: 1,
        };
        assert_eq!(report.observation, vec![borehole]);
        assert_eq!(report.plan, vec![borehole]);
    }

    proptest! {
        #[test]
        fn prop_wrong_arity_always_rejected(n in 0usize..6) {
            prop_assume!(n != 1);
            let calls = AtomicUsize::new(0);
            let forecast = guard(|_: &ModelInput, _: &Kwargs| -> Result<Vec<ForecastResult>, String> {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(vec![])
            });
            let args = vec![model_input(); n];
            let err = forecast.call_with(&args, &Kwargs::new()).unwrap_err();
            prop_assert!(matches!(err, CallError::Contract(GuardError::InvalidArity(m)) if m == n));
            prop_assert_eq!(calls.load(Ordering::SeqCst), 0);
        }
    }
}
