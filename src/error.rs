//! Error types for Pupil Flux

use thiserror::Error;

/// Errors that can occur during filtering and calibration
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Failed to parse raw record: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Date parse error: {0}")]
    DateParseError(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("{operation} requires column '{column}', which the table does not have")]
    DataShape {
        operation: &'static str,
        column: &'static str,
    },

    #[error("No valid data in {phase} [{start}, {end}]")]
    EmptySegment { phase: String, start: f64, end: f64 },

    #[error("{phase} needs at least {required} valid samples, found {found}")]
    InsufficientSamples {
        phase: String,
        required: usize,
        found: usize,
    },

    #[error("Degenerate interval for {metric} in {phase}: zero elapsed time")]
    DegenerateInterval { phase: String, metric: &'static str },

    #[error("Baseline mean is zero; ratios are undefined")]
    ZeroBaseline,

    #[error("Calibration field '{0}' is not finite")]
    NonFiniteMetric(&'static str),

    #[error("No rows were invalidated by the filter chain")]
    NothingFiltered,

    #[error("Every row was invalidated by the filter chain")]
    NothingValid,
}
