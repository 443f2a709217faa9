//! Derived-field recomputation
//!
//! This module recomputes every derived column of a sample table from the
//! current validity partition:
//! - Relative time since the first valid sample
//! - Binocular average diameter
//! - Windowed standard deviation of the average
//! - Windowed (smoothed) mean of the average
//!
//! Windows are closed intervals `[t - w, t + w]` in relative time, centred on
//! each valid row and evaluated independently.

use serde::{Deserialize, Serialize};
use std::ops::Range;

use crate::types::{DerivedFields, Sample};

/// Default half-width of the standard deviation window (seconds)
pub const DEFAULT_STD_WINDOW: f64 = 0.5;

/// Default half-width of the smoothing window (seconds)
pub const DEFAULT_SMOOTH_WINDOW: f64 = 0.3;

/// Window sizes used by the recomputer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecomputeConfig {
    /// Half-width of the `std_diameter` window (seconds)
    pub std_window: f64,
    /// Half-width of the `smoothed_avg_diameter` window (seconds)
    pub smooth_window: f64,
}

impl Default for RecomputeConfig {
    fn default() -> Self {
        Self {
            std_window: DEFAULT_STD_WINDOW,
            smooth_window: DEFAULT_SMOOTH_WINDOW,
        }
    }
}

/// Feature deriver for computing derived fields
pub struct FeatureDeriver;

impl FeatureDeriver {
    /// Recompute every derived field in place and return the session start.
    ///
    /// `samples` must already be sorted by timestamp. Nothing from the
    /// previous derived values is reused.
    pub fn recompute(samples: &mut [Sample], config: &RecomputeConfig) -> Option<f64> {
        for sample in samples.iter_mut() {
            sample.derived = DerivedFields {
                avg_diameter: average_diameter(sample),
                ..DerivedFields::default()
            };
        }

        let session_start = samples
            .iter()
            .filter(|s| s.is_valid)
            .filter_map(|s| s.timestamp)
            .reduce(f64::min);

        let Some(start) = session_start else {
            log::debug!("recompute: no valid samples, derived fields cleared");
            return None;
        };

        // Valid rows with a defined time, in timestamp order
        let mut rows = Vec::new();
        let mut times = Vec::new();
        for (idx, sample) in samples.iter_mut().enumerate() {
            if !sample.is_valid {
                continue;
            }
            if let Some(ts) = sample.timestamp {
                let relative = ts - start;
                sample.derived.relative_timestamp = Some(relative);
                rows.push(idx);
                times.push(relative);
            }
        }

        let values: Vec<Option<f64>> = rows.iter().map(|&i| samples[i].derived.avg_diameter).collect();

        let stds = window_bounds(&times, config.std_window).map(|w| sample_std(&values[w]));
        for (&row, std) in rows.iter().zip(stds) {
            samples[row].derived.std_diameter = std;
        }

        let means = window_bounds(&times, config.smooth_window).map(|w| mean(&values[w]));
        for (&row, smoothed) in rows.iter().zip(means) {
            samples[row].derived.smoothed_avg_diameter = smoothed;
        }

        log::debug!(
            "recompute: {} valid of {} samples, session start {}",
            rows.len(),
            samples.len(),
            start
        );
        Some(start)
    }
}

/// Binocular average; undefined unless both eyes are present
fn average_diameter(sample: &Sample) -> Option<f64> {
    match (sample.left_diameter, sample.right_diameter) {
        (Some(l), Some(r)) => Some((l + r) / 2.0),
        _ => None,
    }
}

/// Index ranges of the closed window `[t_i - radius, t_i + radius]` for every
/// element of ascending `times`, found with two pointers.
pub(crate) fn window_bounds(times: &[f64], radius: f64) -> impl Iterator<Item = Range<usize>> + '_ {
    let mut lo = 0;
    let mut hi = 0;
    times.iter().map(move |&t| {
        while lo < times.len() && times[lo] < t - radius {
            lo += 1;
        }
        if hi < lo {
            hi = lo;
        }
        while hi < times.len() && times[hi] <= t + radius {
            hi += 1;
        }
        lo..hi
    })
}

/// Arithmetic mean; undefined on an empty slice or any undefined value
pub(crate) fn mean(values: &[Option<f64>]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sum = 0.0;
    for v in values {
        sum += (*v)?;
    }
    Some(sum / values.len() as f64)
}

/// Sample standard deviation (ddof = 1); undefined below two values or on
/// any undefined value
pub(crate) fn sample_std(values: &[Option<f64>]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().flatten().map(|v| (v - m).powi(2)).sum();
    Some((ss / (values.len() - 1) as f64).sqrt())
}
