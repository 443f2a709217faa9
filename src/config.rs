//! Pipeline configuration
//!
//! All tunables of a calibration run in one JSON-loadable value. Missing keys
//! fall back to their defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::ComputeError;
use crate::features::RecomputeConfig;
use crate::filters::{FilterChain, FilterConfig, FilterKind};

/// Phase names the calibration reads from the phase map
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseNames {
    pub baseline: String,
    pub positive: String,
    pub negative: String,
    pub recovery: String,
}

impl Default for PhaseNames {
    fn default() -> Self {
        Self {
            baseline: "Baseline".to_string(),
            positive: "Positive".to_string(),
            negative: "Negative".to_string(),
            recovery: "Neutral_2".to_string(),
        }
    }
}

/// Complete configuration of a calibration run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub recompute: RecomputeConfig,
    pub filters: FilterConfig,
    pub phases: PhaseNames,
    /// Filter passes in execution order
    pub passes: Vec<FilterKind>,
    /// Fail unless filtering invalidated something and left something
    pub require_filtering: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            recompute: RecomputeConfig::default(),
            filters: FilterConfig::default(),
            phases: PhaseNames::default(),
            passes: FilterKind::STANDARD_ORDER.to_vec(),
            require_filtering: false,
        }
    }
}

impl PipelineConfig {
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ComputeError> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    /// Chain of the configured passes
    pub fn filter_chain(&self) -> FilterChain {
        FilterChain::from_kinds(&self.passes, &self.filters)
    }

    /// Reject window sizes and thresholds no pass can work with
    pub fn validate(&self) -> Result<(), ComputeError> {
        let positive = [
            ("recompute.std_window", self.recompute.std_window),
            ("recompute.smooth_window", self.recompute.smooth_window),
            ("filters.std_outlier_window", self.filters.std_outlier_window),
            ("filters.max_speed", self.filters.max_speed),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ComputeError::Configuration(format!(
                    "{} must be a positive number, got {}",
                    name, value
                )));
            }
        }
        if self.filters.min_size > self.filters.max_size {
            return Err(ComputeError::Configuration(format!(
                "filters.min_size {} exceeds filters.max_size {}",
                self.filters.min_size, self.filters.max_size
            )));
        }
        self.filters.min_timestamp.resolve()?;
        Ok(())
    }
}
