//! Pupil Flux - Pupillometry cleaning and calibration engine
//!
//! Flux turns raw eye-tracker event exports into per-subject calibration
//! records through a deterministic pipeline: normalization → filter chain
//! (with full derived-field recompute after every pass) → baseline
//! computation → phase response metrics.
//!
//! ## Modules
//!
//! - **Filtering**: Invalidate implausible samples without ever reviving one
//! - **Calibration**: Baseline and stimulus response of one subject

pub mod baseline;
pub mod calibration;
pub mod config;
pub mod error;
pub mod features;
pub mod filters;
pub mod metrics;
pub mod normalizer;
pub mod pipeline;
pub mod schema;
pub mod table;
pub mod types;

pub use calibration::{CalibrationRecord, SubjectCalibration};
pub use config::{PhaseNames, PipelineConfig};
pub use error::ComputeError;
pub use filters::{FilterChain, FilterConfig, FilterKind, FilterPass};
pub use pipeline::{calibrate_subject, CalibrationProcessor};
pub use table::{SampleTable, ValidationSummary};
pub use types::{Phase, PhaseMap, Sample};

// Schema exports
pub use schema::{PhaseTimings, RawTable};

/// Pupil Flux version
pub const PUPIL_FLUX_VERSION: &str = env!("CARGO_PKG_VERSION");
