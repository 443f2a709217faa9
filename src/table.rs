//! Sample table
//!
//! One subject's samples in timestamp order together with their derived
//! fields. Every mutation goes through [`SampleTable::set_data`] or
//! [`SampleTable::invalidate`], both of which recompute all derived fields
//! from scratch.

use serde::Serialize;
use std::cmp::Ordering;

use crate::error::ComputeError;
use crate::features::{FeatureDeriver, RecomputeConfig};
use crate::normalizer::Normalizer;
use crate::schema::RawTable;
use crate::types::{Columns, Sample};

/// Valid/invalid row counts after filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ValidationSummary {
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
}

impl ValidationSummary {
    /// Require that filtering removed something and left something.
    ///
    /// Filters never fail for want of work, so callers that expect the chain
    /// to have caught bad samples check it here.
    pub fn ensure_effective(&self) -> Result<(), ComputeError> {
        if self.invalid == 0 {
            return Err(ComputeError::NothingFiltered);
        }
        if self.valid == 0 {
            return Err(ComputeError::NothingValid);
        }
        Ok(())
    }
}

/// Samples of one subject plus derived fields
#[derive(Debug, Clone)]
pub struct SampleTable {
    subject_id: String,
    samples: Vec<Sample>,
    columns: Columns,
    config: RecomputeConfig,
    session_start: Option<f64>,
}

impl SampleTable {
    /// Build a table from a raw export
    pub fn from_raw(
        raw: &RawTable,
        subject_id: impl Into<String>,
        config: RecomputeConfig,
    ) -> Result<Self, ComputeError> {
        let (samples, columns) = Normalizer::normalize(raw)?;
        Ok(Self::new(subject_id, samples, columns, config))
    }

    /// Build a table from already typed samples
    pub fn new(
        subject_id: impl Into<String>,
        samples: Vec<Sample>,
        columns: Columns,
        config: RecomputeConfig,
    ) -> Self {
        let mut table = Self {
            subject_id: subject_id.into(),
            samples: Vec::new(),
            columns,
            config,
            session_start: None,
        };
        table.set_data(samples);
        table
    }

    /// Replace samples (data and validity together) and recompute
    pub fn set_data(&mut self, mut samples: Vec<Sample>) {
        samples.sort_by(|a, b| compare_timestamps(a.timestamp, b.timestamp));
        self.session_start = FeatureDeriver::recompute(&mut samples, &self.config);
        self.samples = samples;
    }

    /// Copy of this table with `mask`ed rows marked invalid.
    ///
    /// Rows already invalid stay invalid whatever the mask says.
    pub fn invalidate(&self, mask: &[bool]) -> Self {
        debug_assert_eq!(mask.len(), self.samples.len());
        let samples = self
            .samples
            .iter()
            .zip(mask.iter().chain(std::iter::repeat(&false)))
            .map(|(sample, &drop)| Sample {
                is_valid: sample.is_valid && !drop,
                ..sample.clone()
            })
            .collect();

        let mut table = Self {
            subject_id: self.subject_id.clone(),
            samples: Vec::new(),
            columns: self.columns,
            config: self.config,
            session_start: None,
        };
        table.set_data(samples);
        table
    }

    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn columns(&self) -> Columns {
        self.columns
    }

    pub fn config(&self) -> &RecomputeConfig {
        &self.config
    }

    /// Earliest timestamp among valid rows
    pub fn session_start(&self) -> Option<f64> {
        self.session_start
    }

    /// Valid samples in timestamp order
    pub fn valid_samples(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter().filter(|s| s.is_valid)
    }

    /// Per-row validity flags
    pub fn validity(&self) -> Vec<bool> {
        self.samples.iter().map(|s| s.is_valid).collect()
    }

    pub fn validation_summary(&self) -> ValidationSummary {
        let total = self.samples.len();
        let valid = self.samples.iter().filter(|s| s.is_valid).count();
        ValidationSummary {
            total,
            valid,
            invalid: total - valid,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Ascending by timestamp, missing timestamps last
fn compare_timestamps(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
