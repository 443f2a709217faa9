//! Calibration records
//!
//! The per-subject summary of baseline pupil behaviour and stimulus response,
//! plus JSON persistence.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::baseline::Baseline;
use crate::error::ComputeError;
use crate::metrics::PhaseResponse;

/// Nine-field calibration summary of one subject
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRecord {
    pub baseline_mean: f64,
    pub baseline_std: f64,
    pub positive_rise_speed: f64,
    pub negative_rise_speed: f64,
    pub positive_fall_speed: f64,
    pub negative_fall_speed: f64,
    pub recovery_speed: f64,
    pub positive_mean_ratio: f64,
    pub negative_mean_ratio: f64,
}

impl CalibrationRecord {
    /// Assemble a record, rejecting any non-finite field
    pub fn new(
        baseline: &Baseline,
        positive: &PhaseResponse,
        negative: &PhaseResponse,
        recovery_speed: f64,
    ) -> Result<Self, ComputeError> {
        let record = Self {
            baseline_mean: baseline.mean,
            baseline_std: baseline.std,
            positive_rise_speed: positive.rise_speed,
            negative_rise_speed: negative.rise_speed,
            positive_fall_speed: positive.fall_speed,
            negative_fall_speed: negative.fall_speed,
            recovery_speed,
            positive_mean_ratio: positive.mean_ratio,
            negative_mean_ratio: negative.mean_ratio,
        };
        record.ensure_finite()?;
        Ok(record)
    }

    /// Field names and values in serialisation order
    pub fn fields(&self) -> [(&'static str, f64); 9] {
        [
            ("baseline_mean", self.baseline_mean),
            ("baseline_std", self.baseline_std),
            ("positive_rise_speed", self.positive_rise_speed),
            ("negative_rise_speed", self.negative_rise_speed),
            ("positive_fall_speed", self.positive_fall_speed),
            ("negative_fall_speed", self.negative_fall_speed),
            ("recovery_speed", self.recovery_speed),
            ("positive_mean_ratio", self.positive_mean_ratio),
            ("negative_mean_ratio", self.negative_mean_ratio),
        ]
    }

    fn ensure_finite(&self) -> Result<(), ComputeError> {
        match self.fields().into_iter().find(|(_, v)| !v.is_finite()) {
            Some((name, _)) => Err(ComputeError::NonFiniteMetric(name)),
            None => Ok(()),
        }
    }

    pub fn to_json(&self) -> Result<String, ComputeError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let record: Self = serde_json::from_str(json)?;
        record.ensure_finite()?;
        Ok(record)
    }
}

/// Calibration record tagged with its subject, as written to disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectCalibration {
    pub subject_id: String,
    #[serde(flatten)]
    pub record: CalibrationRecord,
}

impl SubjectCalibration {
    pub fn new(subject_id: impl Into<String>, record: CalibrationRecord) -> Self {
        Self {
            subject_id: subject_id.into(),
            record,
        }
    }

    pub fn to_json(&self) -> Result<String, ComputeError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let calibration: Self = serde_json::from_str(json)?;
        calibration.record.ensure_finite()?;
        Ok(calibration)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ComputeError> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ComputeError> {
        Self::from_json(&fs::read_to_string(path)?)
    }
}
