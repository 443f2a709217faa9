//! Pipeline orchestration
//!
//! This module provides the public API for Pupil Flux.
//! It runs one subject from a raw eye-tracker export to a calibration record.

use std::path::Path;

use crate::baseline::{Baseline, PhaseSegment};
use crate::calibration::{CalibrationRecord, SubjectCalibration};
use crate::config::PipelineConfig;
use crate::error::ComputeError;
use crate::filters::FilterChain;
use crate::metrics::{recovery_speed, PhaseResponse};
use crate::schema::{PhaseTimings, RawTable};
use crate::table::SampleTable;
use crate::types::PhaseMap;

/// Calibrate one subject from files on disk.
///
/// # Arguments
/// * `raw_path` - NDJSON event export, optionally gzip-compressed (`.gz`)
/// * `timing_path` - Phase timing JSON keyed by subject id
/// * `subject_id` - Subject to calibrate
/// * `config` - Pipeline configuration
///
/// # Example
/// ```ignore
/// let calibration = calibrate_subject(
///     Path::new("704.json.gz"),
///     Path::new("timings.json"),
///     "704",
///     &PipelineConfig::default(),
/// )?;
/// ```
pub fn calibrate_subject(
    raw_path: &Path,
    timing_path: &Path,
    subject_id: &str,
    config: &PipelineConfig,
) -> Result<SubjectCalibration, ComputeError> {
    let timings = PhaseTimings::load(timing_path)?;
    let phases = timings.phases_for(subject_id)?;
    let raw = RawTable::read_path(raw_path)?;

    CalibrationProcessor::with_config(config.clone()).process(&raw, subject_id, &phases)
}

/// Stateless per-subject processor.
///
/// Pipeline stages:
/// 1. Normalizer - Typed samples from raw records
/// 2. FilterChain - Invalidate bad samples, recomputing after each pass
/// 3. Baseline - Mean and std over the baseline phase
/// 4. Metrics - Rise, fall and recovery speeds and mean ratios
/// 5. CalibrationRecord - Finite nine-field summary
pub struct CalibrationProcessor {
    config: PipelineConfig,
    chain: FilterChain,
}

impl Default for CalibrationProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl CalibrationProcessor {
    /// Create a processor with default settings
    pub fn new() -> Self {
        Self::with_config(PipelineConfig::default())
    }

    pub fn with_config(config: PipelineConfig) -> Self {
        let chain = config.filter_chain();
        Self { config, chain }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Normalize and filter one subject's raw export
    pub fn filter(&self, raw: &RawTable, subject_id: &str) -> Result<SampleTable, ComputeError> {
        let table = SampleTable::from_raw(raw, subject_id, self.config.recompute)?;
        let table = self.chain.apply(table)?;

        let summary = table.validation_summary();
        log::debug!(
            "subject {}: {} of {} samples valid after filtering",
            subject_id,
            summary.valid,
            summary.total
        );
        if self.config.require_filtering {
            summary.ensure_effective()?;
        }
        Ok(table)
    }

    /// Extract the calibration record from an already filtered table
    pub fn calibrate(
        &self,
        table: &SampleTable,
        phases: &PhaseMap,
    ) -> Result<CalibrationRecord, ComputeError> {
        let names = &self.config.phases;

        let baseline = Baseline::compute(table, phases.get(&names.baseline)?)?;
        let positive = PhaseResponse::measure(table, phases.get(&names.positive)?, &baseline)?;
        let negative = PhaseResponse::measure(table, phases.get(&names.negative)?, &baseline)?;
        let recovery = recovery_speed(&PhaseSegment::select(
            table,
            phases.get(&names.recovery)?,
        )?)?;

        CalibrationRecord::new(&baseline, &positive, &negative, recovery)
    }

    /// Full run: normalize, filter and calibrate
    pub fn process(
        &self,
        raw: &RawTable,
        subject_id: &str,
        phases: &PhaseMap,
    ) -> Result<SubjectCalibration, ComputeError> {
        let table = self.filter(raw, subject_id)?;
        let record = self.calibrate(&table, phases)?;

        log::info!(
            "subject {}: baseline {:.4} ± {:.4}, recovery {:.4}/s",
            subject_id,
            record.baseline_mean,
            record.baseline_std,
            record.recovery_speed
        );
        Ok(SubjectCalibration::new(subject_id, record))
    }
}
