//! Phase response metrics
//!
//! Rise, fall and recovery speeds are in diameter units per second of
//! session-relative time. Zero-length denominators are reported as
//! [`ComputeError::DegenerateInterval`] instead of producing infinities.

use serde::{Deserialize, Serialize};

use crate::baseline::{Baseline, PhaseSegment};
use crate::error::ComputeError;
use crate::table::SampleTable;
use crate::types::Phase;

/// Response of one stimulus phase
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseResponse {
    pub rise_speed: f64,
    pub fall_speed: f64,
    pub mean_ratio: f64,
}

impl PhaseResponse {
    /// Measure a stimulus phase against the baseline
    pub fn measure(
        table: &SampleTable,
        phase: &Phase,
        baseline: &Baseline,
    ) -> Result<Self, ComputeError> {
        let segment = PhaseSegment::select(table, phase)?;
        Ok(Self {
            rise_speed: rise_speed(&segment, baseline.mean)?,
            fall_speed: fall_speed(&segment)?,
            mean_ratio: mean_ratio(&segment, baseline.mean)?,
        })
    }
}

/// `(peak - baseline) / (peak time - phase start)`
pub fn rise_speed(segment: &PhaseSegment, baseline_mean: f64) -> Result<f64, ComputeError> {
    let (peak_time, peak) = segment.peak();
    let elapsed = peak_time - segment.phase().start;
    if elapsed == 0.0 {
        return Err(degenerate(segment, "rise_speed"));
    }
    Ok((peak - baseline_mean) / elapsed)
}

/// `(peak - latest value) / (phase end - peak time)`
pub fn fall_speed(segment: &PhaseSegment) -> Result<f64, ComputeError> {
    let (peak_time, peak) = segment.peak();
    let (_, end_value) = segment.last();
    let remaining = segment.phase().end - peak_time;
    if remaining == 0.0 {
        return Err(degenerate(segment, "fall_speed"));
    }
    Ok((peak - end_value) / remaining)
}

/// `(earliest value - latest value) / (phase end - phase start)`
pub fn recovery_speed(segment: &PhaseSegment) -> Result<f64, ComputeError> {
    let phase = segment.phase();
    let duration = phase.end - phase.start;
    if duration == 0.0 {
        return Err(degenerate(segment, "recovery_speed"));
    }
    let (_, first) = segment.first();
    let (_, last) = segment.last();
    Ok((first - last) / duration)
}

/// Phase mean over baseline mean
pub fn mean_ratio(segment: &PhaseSegment, baseline_mean: f64) -> Result<f64, ComputeError> {
    if baseline_mean == 0.0 {
        return Err(ComputeError::ZeroBaseline);
    }
    Ok(segment.mean() / baseline_mean)
}

fn degenerate(segment: &PhaseSegment, metric: &'static str) -> ComputeError {
    ComputeError::DegenerateInterval {
        phase: segment.phase().name.clone(),
        metric,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::RecomputeConfig;
    use crate::types::{Columns, Sample};

    const T0: f64 = 1_600_000_000.0;

    fn segment(avgs: &[f64], phase: Phase) -> PhaseSegment {
        let samples = avgs
            .iter()
            .enumerate()
            .map(|(i, &a)| Sample::gaze(T0 + i as f64, a, a))
            .collect();
        let config = RecomputeConfig {
            std_window: 0.5,
            smooth_window: 0.1,
        };
        let table = SampleTable::new("704", samples, Columns::all(), config);
        PhaseSegment::select(&table, &phase).unwrap()
    }

    #[test]
    fn test_rise_and_fall() {
        let s = segment(&[3.0, 3.5, 4.0, 3.8, 3.6], Phase::new("Positive", 0.0, 4.0));

        assert!((rise_speed(&s, 3.0).unwrap() - 0.5).abs() < 1e-12);
        assert!((fall_speed(&s).unwrap() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_fall_uses_phase_end_not_last_row() {
        let s = segment(&[3.0, 4.0, 3.0], Phase::new("Positive", 0.0, 5.0));
        assert!((fall_speed(&s).unwrap() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_peak_at_phase_end_is_degenerate() {
        let s = segment(&[3.0, 3.5, 4.0], Phase::new("Negative", 0.0, 2.0));

        match fall_speed(&s).unwrap_err() {
            ComputeError::DegenerateInterval { phase, metric } => {
                assert_eq!(phase, "Negative");
                assert_eq!(metric, "fall_speed");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_peak_at_phase_start_is_degenerate() {
        let s = segment(&[4.0, 3.5, 3.0], Phase::new("Positive", 0.0, 2.0));
        assert!(matches!(
            rise_speed(&s, 3.0),
            Err(ComputeError::DegenerateInterval {
                metric: "rise_speed",
                ..
            })
        ));
    }

    #[test]
    fn test_recovery_uses_phase_bounds() {
        let s = segment(&[3.5, 3.4, 3.2, 3.0], Phase::new("Neutral_2", 0.0, 5.0));
        assert!((recovery_speed(&s).unwrap() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_mean_ratio() {
        let s = segment(&[3.0, 3.3, 3.6], Phase::new("Positive", 0.0, 2.0));

        assert!((mean_ratio(&s, 3.0).unwrap() - 1.1).abs() < 1e-12);
        assert!(matches!(mean_ratio(&s, 0.0), Err(ComputeError::ZeroBaseline)));
    }
}
