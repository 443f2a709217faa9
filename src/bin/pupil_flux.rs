//! Pupil Flux CLI - Command-line interface for pupil calibration
//!
//! Commands:
//! - calibrate: Filter one subject's export and compute its calibration record
//! - filter: Run the filter chain and report how many samples survive
//! - show: Print a saved calibration record

use clap::{Parser, Subcommand};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use pupil_flux::config::PipelineConfig;
use pupil_flux::pipeline::{calibrate_subject, CalibrationProcessor};
use pupil_flux::schema::RawTable;
use pupil_flux::{ComputeError, SubjectCalibration, ValidationSummary, PUPIL_FLUX_VERSION};

/// Pupil Flux - Pupillometry cleaning and per-subject calibration
#[derive(Parser)]
#[command(name = "pupil-flux")]
#[command(author = "Synheart AI Inc")]
#[command(version = PUPIL_FLUX_VERSION)]
#[command(about = "Clean eye-tracker exports and calibrate pupil response", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the calibration record of one subject
    Calibrate {
        /// Raw NDJSON export (.gz accepted)
        #[arg(short, long)]
        input: PathBuf,

        /// Phase timing JSON keyed by subject id
        #[arg(short, long)]
        timings: PathBuf,

        /// Subject id
        #[arg(short, long)]
        subject: String,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Pipeline configuration JSON
        #[arg(long)]
        config: Option<PathBuf>,

        /// Fail unless filtering invalidated some but not all samples
        #[arg(long)]
        require_filtering: bool,
    },

    /// Run the filter chain and print the validation summary
    Filter {
        /// Raw NDJSON export (.gz accepted)
        #[arg(short, long)]
        input: PathBuf,

        /// Subject id used in log output
        #[arg(short, long, default_value = "unknown")]
        subject: String,

        /// Pipeline configuration JSON
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print a saved calibration record
    Show {
        /// Calibration JSON written by `calibrate`
        input: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), PupilCliError> {
    match cli.command {
        Commands::Calibrate {
            input,
            timings,
            subject,
            output,
            config,
            require_filtering,
        } => cmd_calibrate(
            &input,
            &timings,
            &subject,
            &output,
            config.as_deref(),
            require_filtering,
        ),

        Commands::Filter {
            input,
            subject,
            config,
            json,
        } => cmd_filter(&input, &subject, config.as_deref(), json),

        Commands::Show { input, json } => cmd_show(&input, json),
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig, PupilCliError> {
    match path {
        Some(path) => Ok(PipelineConfig::load(path)?),
        None => Ok(PipelineConfig::default()),
    }
}

fn cmd_calibrate(
    input: &Path,
    timings: &Path,
    subject: &str,
    output: &Path,
    config: Option<&Path>,
    require_filtering: bool,
) -> Result<(), PupilCliError> {
    let mut config = load_config(config)?;
    config.require_filtering |= require_filtering;

    let calibration = calibrate_subject(input, timings, subject, &config)?;

    if output.to_string_lossy() == "-" {
        println!("{}", calibration.to_json()?);
    } else {
        calibration.save(output)?;
        log::info!("wrote calibration for subject {} to {}", subject, output.display());
    }

    Ok(())
}

fn cmd_filter(
    input: &Path,
    subject: &str,
    config: Option<&Path>,
    json: bool,
) -> Result<(), PupilCliError> {
    let processor = CalibrationProcessor::with_config(load_config(config)?);
    let raw = RawTable::read_path(input)?;

    if raw.is_empty() {
        return Err(PupilCliError::NoEvents);
    }

    let table = processor.filter(&raw, subject)?;
    let summary = table.validation_summary();

    if json {
        println!("{}", serde_json::to_string_pretty(&FilterReport::new(subject, summary))?);
    } else {
        println!("Filter Report");
        println!("=============");
        println!("Subject:          {}", subject);
        println!("Total samples:    {}", summary.total);
        println!("Valid samples:    {}", summary.valid);
        println!("Invalid samples:  {}", summary.invalid);
        if let Some(start) = table.valid_samples().next().and_then(|s| s.timestamp_readable()) {
            println!("Session start:    {}", start);
        }
    }

    Ok(())
}

fn cmd_show(input: &Path, json: bool) -> Result<(), PupilCliError> {
    let calibration = SubjectCalibration::load(input)?;

    if json {
        println!("{}", calibration.to_json()?);
    } else {
        println!("Calibration for subject {}", calibration.subject_id);
        println!("==========================");
        for (name, value) in calibration.record.fields() {
            println!("{:<22} {:>12.6}", name, value);
        }
    }

    Ok(())
}

// Report types

#[derive(serde::Serialize)]
struct FilterReport {
    subject_id: String,
    total_samples: usize,
    valid_samples: usize,
    invalid_samples: usize,
    valid_fraction: f64,
}

impl FilterReport {
    fn new(subject: &str, summary: ValidationSummary) -> Self {
        let valid_fraction = if summary.total == 0 {
            0.0
        } else {
            summary.valid as f64 / summary.total as f64
        };
        Self {
            subject_id: subject.to_string(),
            total_samples: summary.total,
            valid_samples: summary.valid,
            invalid_samples: summary.invalid,
            valid_fraction,
        }
    }
}

// Error types

#[derive(Debug)]
enum PupilCliError {
    Io(io::Error),
    Compute(ComputeError),
    Json(serde_json::Error),
    NoEvents,
}

impl From<io::Error> for PupilCliError {
    fn from(e: io::Error) -> Self {
        PupilCliError::Io(e)
    }
}

impl From<ComputeError> for PupilCliError {
    fn from(e: ComputeError) -> Self {
        match e {
            ComputeError::Io(e) => PupilCliError::Io(e),
            ComputeError::JsonError(e) => PupilCliError::Json(e),
            other => PupilCliError::Compute(other),
        }
    }
}

impl From<serde_json::Error> for PupilCliError {
    fn from(e: serde_json::Error) -> Self {
        PupilCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<PupilCliError> for CliError {
    fn from(e: PupilCliError) -> Self {
        match e {
            PupilCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            PupilCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            PupilCliError::NoEvents => CliError {
                code: "NO_EVENTS".to_string(),
                message: "No events found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            PupilCliError::Compute(e) => {
                let (code, hint) = compute_error_code(&e);
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: hint.map(str::to_string),
                }
            }
        }
    }
}

fn compute_error_code(e: &ComputeError) -> (&'static str, Option<&'static str>) {
    match e {
        ComputeError::ParseError(_) => (
            "PARSE_ERROR",
            Some("Ensure every line of the export is a JSON object"),
        ),
        ComputeError::DateParseError(_) => ("DATE_ERROR", Some("Dates use the dd/mm/yyyy format")),
        ComputeError::Configuration(_) => (
            "CONFIGURATION_ERROR",
            Some("Check the subject id and phase names in the timing file"),
        ),
        ComputeError::DataShape { .. } => (
            "DATA_SHAPE_ERROR",
            Some("The export lacks a column this pass needs; adjust the configured passes"),
        ),
        ComputeError::EmptySegment { .. } | ComputeError::InsufficientSamples { .. } => (
            "EMPTY_SEGMENT",
            Some("Run 'pupil-flux filter' to see how many samples survive filtering"),
        ),
        ComputeError::DegenerateInterval { .. } => ("DEGENERATE_INTERVAL", None),
        ComputeError::ZeroBaseline | ComputeError::NonFiniteMetric(_) => ("INVALID_METRIC", None),
        ComputeError::NothingFiltered | ComputeError::NothingValid => (
            "FILTERING_INEFFECTIVE",
            Some("Review the filter configuration or drop --require-filtering"),
        ),
        ComputeError::JsonError(_) => ("JSON_ERROR", Some("Check JSON syntax")),
        ComputeError::Io(_) => ("IO_ERROR", Some("Check file paths and permissions")),
    }
}
