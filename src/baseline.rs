//! Baseline management
//!
//! This module selects the samples that fall inside a phase window and
//! computes the pre-stimulus baseline that every response metric is measured
//! against.

use serde::{Deserialize, Serialize};

use crate::error::ComputeError;
use crate::table::SampleTable;
use crate::types::{Columns, Phase};

/// Smoothed diameter trace of one phase, in time order
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseSegment {
    phase: Phase,
    times: Vec<f64>,
    values: Vec<f64>,
}

impl PhaseSegment {
    /// Valid rows of `table` whose relative time lies in the closed phase
    /// window and whose smoothed diameter is defined.
    ///
    /// Fails with [`ComputeError::EmptySegment`] when nothing qualifies.
    pub fn select(table: &SampleTable, phase: &Phase) -> Result<Self, ComputeError> {
        let columns = table.columns();
        Columns::require(columns.timestamp, "phase segment", "timestamp")?;
        Columns::require(columns.has_diameters(), "phase segment", "smoothed_avg_diameter")?;

        let (times, values): (Vec<f64>, Vec<f64>) = table
            .valid_samples()
            .filter_map(|s| Some((s.relative_timestamp()?, s.smoothed_avg_diameter()?)))
            .filter(|(t, _)| phase.contains(*t))
            .unzip();

        if times.is_empty() {
            return Err(ComputeError::EmptySegment {
                phase: phase.name.clone(),
                start: phase.start,
                end: phase.end,
            });
        }

        Ok(Self {
            phase: phase.clone(),
            times,
            values,
        })
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn mean(&self) -> f64 {
        self.values.iter().sum::<f64>() / self.values.len() as f64
    }

    /// Sample standard deviation (ddof = 1)
    pub fn std(&self) -> Result<f64, ComputeError> {
        if self.values.len() < 2 {
            return Err(ComputeError::InsufficientSamples {
                phase: self.phase.name.clone(),
                required: 2,
                found: self.values.len(),
            });
        }
        let mean = self.mean();
        let ss: f64 = self.values.iter().map(|v| (v - mean).powi(2)).sum();
        Ok((ss / (self.values.len() - 1) as f64).sqrt())
    }

    /// Time and value of the first row carrying the maximum value
    pub fn peak(&self) -> (f64, f64) {
        let mut best = 0;
        for (i, v) in self.values.iter().enumerate().skip(1) {
            if *v > self.values[best] {
                best = i;
            }
        }
        (self.times[best], self.values[best])
    }

    /// Earliest row of the segment
    pub fn first(&self) -> (f64, f64) {
        (self.times[0], self.values[0])
    }

    /// Latest row of the segment
    pub fn last(&self) -> (f64, f64) {
        let i = self.values.len() - 1;
        (self.times[i], self.values[i])
    }
}

/// Pre-stimulus pupil baseline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub mean: f64,
    pub std: f64,
    /// Number of samples the baseline was computed from
    pub samples: usize,
}

impl Baseline {
    /// Mean and sample std of the smoothed diameter over the baseline phase
    pub fn compute(table: &SampleTable, phase: &Phase) -> Result<Self, ComputeError> {
        Self::from_segment(&PhaseSegment::select(table, phase)?)
    }

    pub fn from_segment(segment: &PhaseSegment) -> Result<Self, ComputeError> {
        Ok(Self {
            mean: segment.mean(),
            std: segment.std()?,
            samples: segment.len(),
        })
    }
}
