//! `forecast-guard`: check model inputs and results against the
//! entry-point contract without running a model.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use forecast_guard_core::{
    check_results, schema::input_schema, EntryPointGuard, GuardError, GuardOptions,
    HydraulicsSummary, PrecheckReport,
};

#[derive(Parser, Debug)]
#[command(name = "forecast-guard", version)]
#[command(about = "Check earthquake-forecast model inputs and results against the entry-point contract")]
struct Cli {
    /// Log every validation step to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a model input bundle (JSON or YAML)
    CheckInput {
        /// Input bundle file
        file: PathBuf,

        /// Require and validate injection data (induced seismicity mode)
        #[arg(long)]
        induced: bool,

        /// Guard options file (YAML or JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Validate a list of model results (JSON or YAML)
    CheckResults {
        /// Results file holding an array of result items
        file: PathBuf,

        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Print the model input JSON Schema
    Schema,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

/// Read a JSON or YAML document, choosing by file extension.
fn read_document(path: &Path) -> Result<Value> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;

    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );

    if is_yaml {
        serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML in {}", path.display()))
    } else {
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse JSON in {}", path.display()))
    }
}

/// How a check ended when no I/O or parse failure got in the way.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Outcome {
    Valid,
    Violation,
}

/// Process exit status: 0 valid, 1 contract violation, 2 usage or I/O error.
fn exit_status(result: &Result<Outcome>) -> u8 {
    match result {
        Ok(Outcome::Valid) => 0,
        Ok(Outcome::Violation) => 1,
        Err(_) => 2,
    }
}

/// Options from `config` (if any), with `--induced` switching induced mode on.
fn load_options(config: Option<&Path>, induced: bool) -> Result<GuardOptions> {
    let mut options = match config {
        Some(path) => GuardOptions::from_file(path)
            .with_context(|| format!("Failed to load options from {}", path.display()))?,
        None => GuardOptions::default(),
    };
    options.induced |= induced;
    Ok(options)
}

fn violation_report(err: &GuardError) -> Value {
    let mut report = json!({
        "valid": false,
        "kind": err.kind(),
        "message": err.to_string(),
    });
    if let GuardError::SchemaViolation(violations) = err {
        report["violations"] = json!(violations);
    }
    report
}

fn print_violation(err: &GuardError, format: Format) {
    match format {
        Format::Text => {
            println!("INVALID [{}]", err.kind());
            match err {
                GuardError::SchemaViolation(violations) => {
                    for violation in violations {
                        println!("  - {}", violation);
                    }
                }
                other => println!("  {}", other),
            }
        }
        Format::Json => println!("{}", violation_report(err)),
    }
}

fn samples(summaries: &[HydraulicsSummary]) -> usize {
    summaries.iter().map(|s| s.samples).sum()
}

fn input_report(report: &PrecheckReport) -> Value {
    let input = &report.input;
    json!({
        "valid": true,
        "forecast_start": input.forecast_start,
        "forecast_end": input.forecast_end,
        "depth_min": input.depth_min,
        "depth_max": input.depth_max,
        "events": report.catalog.events,
        "polygons": report.geometry.polygons.len(),
        "rings": report.geometry.ring_count(),
        "bounds": report.geometry.bounds().map(|(x0, y0, x1, y1)| [x0, y0, x1, y1]),
        "observed_wells": report.observation.len(),
        "observed_samples": samples(&report.observation),
        "planned_wells": report.plan.len(),
        "planned_samples": samples(&report.plan),
        "model_parameters": input.model_parameters.len(),
    })
}

fn print_input(report: &PrecheckReport, format: Format) {
    let input = &report.input;
    match format {
        Format::Text => {
            println!("OK");
            println!(
                "  window: {} .. {} ({} h)",
                input.forecast_start,
                input.forecast_end,
                input.forecast_window().num_hours()
            );
            if let (Some(min), Some(max)) = (input.depth_min, input.depth_max) {
                println!("  depth: {} .. {} km", min, max);
            }
            println!("  catalog events: {}", report.catalog.events);
            println!(
                "  polygons: {}, rings: {}",
                report.geometry.polygons.len(),
                report.geometry.ring_count()
            );
            if let Some((min_x, min_y, max_x, max_y)) = report.geometry.bounds() {
                println!("  bounds: ({}, {}) .. ({}, {})", min_x, min_y, max_x, max_y);
            }
            if !report.observation.is_empty() || !report.plan.is_empty() {
                println!(
                    "  observed wells: {} ({} samples), planned wells: {} ({} samples)",
                    report.observation.len(),
                    samples(&report.observation),
                    report.plan.len(),
                    samples(&report.plan)
                );
            }
            println!("  model parameters: {}", input.model_parameters.len());
        }
        Format::Json => println!("{}", input_report(report)),
    }
}

fn check_input(
    file: &Path,
    induced: bool,
    config: Option<&Path>,
    format: Format,
) -> Result<Outcome> {
    let options = load_options(config, induced)?;

    let raw = read_document(file)?;
    tracing::info!(file = %file.display(), induced = options.induced, "Checking model input");

    let guard = EntryPointGuard::new((), options);
    match guard.precheck_report(&raw) {
        Ok(report) => {
            print_input(&report, format);
            Ok(Outcome::Valid)
        }
        Err(err) => {
            print_violation(&err, format);
            Ok(Outcome::Violation)
        }
    }
}

fn check_result_file(file: &Path, format: Format) -> Result<Outcome> {
    let items = match read_document(file)? {
        Value::Array(items) => items,
        other => bail!(
            "{} must hold an array of result items, found {}",
            file.display(),
            type_name(&other)
        ),
    };
    tracing::info!(file = %file.display(), items = items.len(), "Checking model results");

    match check_results(&items) {
        Ok(()) => {
            match format {
                Format::Text => println!("OK\n  results: {}", items.len()),
                Format::Json => println!("{}", json!({ "valid": true, "results": items.len() })),
            }
            Ok(Outcome::Valid)
        }
        Err(err) => {
            print_violation(&err, format);
            Ok(Outcome::Violation)
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn run(cli: Cli) -> Result<Outcome> {
    match cli.command {
        Command::CheckInput {
            file,
            induced,
            config,
            format,
        } => check_input(&file, induced, config.as_deref(), format),
        Command::CheckResults { file, format } => check_result_file(&file, format),
        Command::Schema => {
            println!("{}", input_schema());
            Ok(Outcome::Valid)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = run(cli);
    if let Err(e) = &result {
        eprintln!("error: {:#}", e);
    }
    ExitCode::from(exit_status(&result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_check_input() {
        let cli = Cli::parse_from([
            "forecast-guard",
            "check-input",
            "input.yaml",
            "--induced",
            "--format",
            "json",
        ]);
        match cli.command {
            Command::CheckInput {
                file,
                induced,
                config,
                format,
            } => {
                assert_eq!(file, PathBuf::from("input.yaml"));
                assert!(induced);
                assert!(config.is_none());
                assert_eq!(format, Format::Json);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_read_document_by_extension() {
        let dir = std::env::temp_dir();
        let yaml = dir.join(format!("forecast-guard-{}.yaml", std::process::id()));
        let json = dir.join(format!("forecast-guard-{}.json", std::process::id()));
        fs::write(&yaml, "a: 1\n").unwrap();
        fs::write(&json, "{\"a\": 1}").unwrap();

        let from_yaml = read_document(&yaml).unwrap();
        let from_json = read_document(&json).unwrap();
        fs::remove_file(&yaml).unwrap();
        fs::remove_file(&json).unwrap();

        assert_eq!(from_yaml, from_json);
    }

    const QUAKEML: &str =
        "<quakeml><eventParameters><event/><event/></eventParameters></quakeml>";

    /// Write `contents` to a per-test file under the temp dir.
    fn fixture(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("forecast-guard-{}-{}", std::process::id(), name));
        fs::write(&path, contents).unwrap();
        path
    }

    fn model_input() -> Value {
        json!({
            "forecast_start": "2020-01-01T00:00:00",
            "forecast_end": "2020-01-02T00:00:00",
            "seismic_catalog": QUAKEML,
            "bounding_polygon": "POLYGON((0 0,2 0,2 1,0 0))"
        })
    }

    #[test]
    fn test_results_must_be_array() {
        let path = fixture("not-array.json", "{\"kind\": \"point_catalog\"}");
        let result = check_result_file(&path, Format::Text);
        fs::remove_file(&path).unwrap();
        assert!(result.is_err());
        assert_eq!(exit_status(&result), 2);
    }

    #[test]
    fn test_check_input_exit_status() {
        let valid = fixture("valid-input.json", &model_input().to_string());
        let mut missing = model_input();
        missing.as_object_mut().unwrap().remove("seismic_catalog");
        let invalid = fixture("invalid-input.json", &missing.to_string());
        let absent = std::env::temp_dir().join("forecast-guard-no-such-input.json");

        let ok = check_input(&valid, false, None, Format::Json);
        let violation = check_input(&invalid, false, None, Format::Json);
        let unreadable = check_input(&absent, false, None, Format::Json);
        fs::remove_file(&valid).unwrap();
        fs::remove_file(&invalid).unwrap();

        assert_eq!(exit_status(&ok), 0);
        assert_eq!(exit_status(&violation), 1);
        assert_eq!(exit_status(&unreadable), 2);
    }

    #[test]
    fn test_induced_flag_requires_injection_data() {
        let path = fixture("induced-input.yaml", &serde_yaml::to_string(&model_input()).unwrap());
        let plain = check_input(&path, false, None, Format::Text);
        let induced = check_input(&path, true, None, Format::Text);
        fs::remove_file(&path).unwrap();

        assert_eq!(plain.unwrap(), Outcome::Valid);
        assert_eq!(induced.unwrap(), Outcome::Violation);
    }

    #[test]
    fn test_check_results_exit_status() {
        let point = json!({
            "kind": "point_catalog",
            "columns": ["longitude", "latitude", "depth", "time", "magnitude"],
            "rows": []
        });
        let valid = fixture("valid-results.json", &json!([point]).to_string());
        let invalid = fixture("invalid-results.json", &json!([point, 7]).to_string());

        let ok = check_result_file(&valid, Format::Json);
        let violation = check_result_file(&invalid, Format::Json);
        fs::remove_file(&valid).unwrap();
        fs::remove_file(&invalid).unwrap();

        assert_eq!(exit_status(&ok), 0);
        assert_eq!(exit_status(&violation), 1);
    }

    #[test]
    fn test_config_and_flag_merge() {
        let on = fixture("induced-on.yaml", "induced: true\n");
        let off = fixture("induced-off.json", "{\"induced\": false}");
        let unknown = fixture("unknown-key.yaml", "verbose: true\n");

        let from_config = load_options(Some(on.as_path()), false).unwrap();
        let from_flag = load_options(Some(off.as_path()), true).unwrap();
        let neither = load_options(Some(off.as_path()), false).unwrap();
        let rejected = load_options(Some(unknown.as_path()), false);
        fs::remove_file(&on).unwrap();
        fs::remove_file(&off).unwrap();
        fs::remove_file(&unknown).unwrap();

        assert!(from_config.induced);
        assert!(from_flag.induced);
        assert!(!neither.induced);
        assert!(!load_options(None, false).unwrap().induced);
        assert!(load_options(None, true).unwrap().induced);
        assert!(rejected.is_err());
    }

    #[test]
    fn test_input_report_shape() {
        let guard = EntryPointGuard::new((), GuardOptions::default());
        let report = guard.precheck_report(&model_input()).unwrap();
        let value = input_report(&report);

        assert_eq!(value["valid"], true);
        assert_eq!(value["events"], 2);
        assert_eq!(value["polygons"], 1);
        assert_eq!(value["rings"], 1);
        assert_eq!(value["bounds"], json!([0.0, 0.0, 2.0, 1.0]));
        assert_eq!(value["observed_wells"], 0);
        assert_eq!(value["planned_samples"], 0);
        assert_eq!(value["depth_min"], Value::Null);
    }

    #[test]
    fn test_violation_report_shape() {
        let schema = violation_report(&GuardError::SchemaViolation(vec!["bad at /x".into()]));
        assert_eq!(schema["valid"], false);
        assert_eq!(schema["kind"], "schema_violation");
        assert_eq!(schema["violations"], json!(["bad at /x"]));

        let geometry = violation_report(&GuardError::InvalidGeometry);
        assert_eq!(geometry["kind"], "invalid_geometry");
        assert!(geometry.get("violations").is_none());
        assert!(geometry["message"].is_string());
    }
}
