//! Quality filters
//!
//! Each pass marks a subset of samples invalid and hands back a freshly
//! recomputed table. Passes only ever clear validity, so the final partition
//! does not depend on their order, but passes that read derived fields
//! (speed, std outliers) see whatever earlier passes left valid.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ComputeError;
use crate::features::window_bounds;
use crate::table::SampleTable;
use crate::types::{Columns, Sample};

/// Event tag of gaze samples
pub const DEFAULT_GAZE_TAG: &str = "gaze";
/// Smallest physiologically plausible pupil diameter (mm)
pub const DEFAULT_MIN_SIZE: f64 = 1.0;
/// Largest physiologically plausible pupil diameter (mm)
pub const DEFAULT_MAX_SIZE: f64 = 10.0;
/// 2020-01-01T00:00:00Z
pub const DEFAULT_MIN_TIMESTAMP: f64 = 1_577_836_800.0;
/// Minimum spacing between consecutive events (seconds)
pub const DEFAULT_MIN_INTERVAL: f64 = 0.005;
/// Run length after which a steady reading counts as frozen
pub const DEFAULT_MAX_STATIC_STEPS: usize = 100;
/// Diameter step tolerance shared by the constant and async passes (mm)
pub const DEFAULT_TOLERANCE: f64 = 0.02;
/// Maximum plausible change of the average diameter (mm/s)
pub const DEFAULT_MAX_SPEED: f64 = 5.0;
/// Half-width of the std-outlier neighbourhood (seconds)
pub const DEFAULT_STD_OUTLIER_WINDOW: f64 = 1.0;
/// Band half-width of the std-outlier pass, in standard deviations
pub const DEFAULT_SIGMA_THRESHOLD: f64 = 2.0;

const DATE_FORMAT: &str = "%d/%m/%Y";

/// Lower bound for plausible timestamps: epoch seconds or a `dd/mm/yyyy` date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimestampFloor {
    Epoch(f64),
    Date(String),
}

impl TimestampFloor {
    /// Epoch seconds of the floor; dates resolve to midnight UTC
    pub fn resolve(&self) -> Result<f64, ComputeError> {
        match self {
            TimestampFloor::Epoch(secs) => Ok(*secs),
            TimestampFloor::Date(text) => {
                let date = NaiveDate::parse_from_str(text.trim(), DATE_FORMAT).map_err(|e| {
                    ComputeError::DateParseError(format!("'{}' is not dd/mm/yyyy: {}", text, e))
                })?;
                let midnight = date
                    .and_hms_opt(0, 0, 0)
                    .ok_or_else(|| ComputeError::DateParseError(text.clone()))?;
                Ok(midnight.and_utc().timestamp() as f64)
            }
        }
    }
}

impl Default for TimestampFloor {
    fn default() -> Self {
        TimestampFloor::Epoch(DEFAULT_MIN_TIMESTAMP)
    }
}

/// Parameters for every filter pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub gaze_tag: String,
    pub min_size: f64,
    pub max_size: f64,
    pub min_timestamp: TimestampFloor,
    pub min_interval: f64,
    pub max_static_steps: usize,
    pub tolerance: f64,
    pub max_speed: f64,
    pub std_outlier_window: f64,
    pub sigma_threshold: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            gaze_tag: DEFAULT_GAZE_TAG.to_string(),
            min_size: DEFAULT_MIN_SIZE,
            max_size: DEFAULT_MAX_SIZE,
            min_timestamp: TimestampFloor::default(),
            min_interval: DEFAULT_MIN_INTERVAL,
            max_static_steps: DEFAULT_MAX_STATIC_STEPS,
            tolerance: DEFAULT_TOLERANCE,
            max_speed: DEFAULT_MAX_SPEED,
            std_outlier_window: DEFAULT_STD_OUTLIER_WINDOW,
            sigma_threshold: DEFAULT_SIGMA_THRESHOLD,
        }
    }
}

/// Filter pass identifier, as written in configuration files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    OnlyGaze,
    MissingData,
    PupilRange,
    TimestampBounds,
    EventSpacing,
    ConstantPupil,
    AsyncPupil,
    PupilSpeed,
    StdOutliers,
}

impl FilterKind {
    /// Default pass order: row-local checks first, windowed checks last
    pub const STANDARD_ORDER: [FilterKind; 9] = [
        FilterKind::OnlyGaze,
        FilterKind::MissingData,
        FilterKind::PupilRange,
        FilterKind::TimestampBounds,
        FilterKind::EventSpacing,
        FilterKind::ConstantPupil,
        FilterKind::AsyncPupil,
        FilterKind::PupilSpeed,
        FilterKind::StdOutliers,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterKind::OnlyGaze => "only_gaze",
            FilterKind::MissingData => "missing_data",
            FilterKind::PupilRange => "pupil_range",
            FilterKind::TimestampBounds => "timestamp_bounds",
            FilterKind::EventSpacing => "event_spacing",
            FilterKind::ConstantPupil => "constant_pupil",
            FilterKind::AsyncPupil => "async_pupil",
            FilterKind::PupilSpeed => "pupil_speed",
            FilterKind::StdOutliers => "std_outliers",
        }
    }
}

/// A single invalidation pass with its parameters
#[derive(Debug, Clone, PartialEq)]
pub enum FilterPass {
    /// Drop events whose type is not the gaze tag
    OnlyGaze { gaze_tag: String },
    /// Drop rows missing either diameter or the timestamp
    MissingData,
    /// Drop rows with either diameter outside `[min_size, max_size]`
    PupilRange { min_size: f64, max_size: f64 },
    /// Drop rows stamped before the floor or after "now"
    TimestampBounds { min_timestamp: TimestampFloor },
    /// Drop both events of any consecutive pair closer than `min_interval`
    EventSpacing { min_interval: f64 },
    /// Drop runs of frozen readings
    ConstantPupil { max_static_steps: usize, tolerance: f64 },
    /// Drop steps where the two eyes move in opposite directions
    AsyncPupil { tolerance: f64 },
    /// Drop both ends of valid pairs changing faster than `max_speed`
    PupilSpeed { max_speed: f64 },
    /// Drop rows whose windowed std is an outlier among its neighbours
    StdOutliers { time_window: f64, sigma_threshold: f64 },
}

impl FilterPass {
    /// Build a pass from its kind and the shared configuration
    pub fn from_config(kind: FilterKind, config: &FilterConfig) -> Self {
        match kind {
            FilterKind::OnlyGaze => FilterPass::OnlyGaze {
                gaze_tag: config.gaze_tag.clone(),
            },
            FilterKind::MissingData => FilterPass::MissingData,
            FilterKind::PupilRange => FilterPass::PupilRange {
                min_size: config.min_size,
                max_size: config.max_size,
            },
            FilterKind::TimestampBounds => FilterPass::TimestampBounds {
                min_timestamp: config.min_timestamp.clone(),
            },
            FilterKind::EventSpacing => FilterPass::EventSpacing {
                min_interval: config.min_interval,
            },
            FilterKind::ConstantPupil => FilterPass::ConstantPupil {
                max_static_steps: config.max_static_steps,
                tolerance: config.tolerance,
            },
            FilterKind::AsyncPupil => FilterPass::AsyncPupil {
                tolerance: config.tolerance,
            },
            FilterKind::PupilSpeed => FilterPass::PupilSpeed {
                max_speed: config.max_speed,
            },
            FilterKind::StdOutliers => FilterPass::StdOutliers {
                time_window: config.std_outlier_window,
                sigma_threshold: config.sigma_threshold,
            },
        }
    }

    pub fn kind(&self) -> FilterKind {
        match self {
            FilterPass::OnlyGaze { .. } => FilterKind::OnlyGaze,
            FilterPass::MissingData => FilterKind::MissingData,
            FilterPass::PupilRange { .. } => FilterKind::PupilRange,
            FilterPass::TimestampBounds { .. } => FilterKind::TimestampBounds,
            FilterPass::EventSpacing { .. } => FilterKind::EventSpacing,
            FilterPass::ConstantPupil { .. } => FilterKind::ConstantPupil,
            FilterPass::AsyncPupil { .. } => FilterKind::AsyncPupil,
            FilterPass::PupilSpeed { .. } => FilterKind::PupilSpeed,
            FilterPass::StdOutliers { .. } => FilterKind::StdOutliers,
        }
    }

    /// Run the pass, reading "now" from the system clock
    pub fn apply(&self, table: &SampleTable) -> Result<SampleTable, ComputeError> {
        self.apply_at(table, now_epoch_seconds())
    }

    /// Run the pass with an explicit "now" (epoch seconds)
    pub fn apply_at(&self, table: &SampleTable, now: f64) -> Result<SampleTable, ComputeError> {
        let mask = self.mask(table, now)?;
        let before = table.validation_summary().valid;
        let filtered = table.invalidate(&mask);
        let after = filtered.validation_summary();

        log::debug!(
            "{}: invalidated {} rows, {} of {} still valid",
            self.kind().as_str(),
            before - after.valid,
            after.valid,
            after.total
        );
        if before > 0 && after.valid == 0 {
            log::warn!(
                "{} invalidated every remaining sample of subject {}",
                self.kind().as_str(),
                table.subject_id()
            );
        }

        Ok(filtered)
    }

    /// Rows this pass wants invalid, aligned with `table.samples()`
    fn mask(&self, table: &SampleTable, now: f64) -> Result<Vec<bool>, ComputeError> {
        let samples = table.samples();
        let columns = table.columns();
        let name = self.kind().as_str();

        match self {
            FilterPass::OnlyGaze { gaze_tag } => {
                Columns::require(columns.event_type, name, "type")?;
                Ok(samples
                    .iter()
                    .map(|s| s.event_type.as_deref() != Some(gaze_tag.as_str()))
                    .collect())
            }
            FilterPass::MissingData => {
                require_diameters(columns, name)?;
                Columns::require(columns.timestamp, name, "timestamp")?;
                Ok(samples
                    .iter()
                    .map(|s| {
                        s.left_diameter.is_none()
                            || s.right_diameter.is_none()
                            || s.timestamp.is_none()
                    })
                    .collect())
            }
            FilterPass::PupilRange { min_size, max_size } => {
                require_diameters(columns, name)?;
                let outside = |d: Option<f64>| d.is_some_and(|d| d < *min_size || d > *max_size);
                Ok(samples
                    .iter()
                    .map(|s| outside(s.left_diameter) || outside(s.right_diameter))
                    .collect())
            }
            FilterPass::TimestampBounds { min_timestamp } => {
                Columns::require(columns.timestamp, name, "timestamp")?;
                let floor = min_timestamp.resolve()?;
                Ok(samples
                    .iter()
                    .map(|s| s.timestamp.is_some_and(|t| t < floor || t > now))
                    .collect())
            }
            FilterPass::EventSpacing { min_interval } => {
                Columns::require(columns.timestamp, name, "timestamp")?;
                Ok(spacing_mask(samples, *min_interval))
            }
            FilterPass::ConstantPupil {
                max_static_steps,
                tolerance,
            } => {
                require_diameters(columns, name)?;
                Ok(constant_mask(samples, *max_static_steps, *tolerance))
            }
            FilterPass::AsyncPupil { tolerance } => {
                require_diameters(columns, name)?;
                Ok(async_mask(samples, *tolerance))
            }
            FilterPass::PupilSpeed { max_speed } => {
                require_diameters(columns, name)?;
                Ok(speed_mask(samples, *max_speed))
            }
            FilterPass::StdOutliers {
                time_window,
                sigma_threshold,
            } => {
                Columns::require(columns.has_diameters(), name, "std_diameter")?;
                let (rows, times, stds) = valid_timeline(samples, Sample::std_diameter);
                let outliers = std_outlier_mask(&times, &stds, *time_window, *sigma_threshold);
                let mut mask = vec![false; samples.len()];
                for (row, flagged) in rows.into_iter().zip(outliers) {
                    mask[row] = flagged;
                }
                Ok(mask)
            }
        }
    }
}

/// Ordered sequence of passes
#[derive(Debug, Clone, PartialEq)]
pub struct FilterChain {
    passes: Vec<FilterPass>,
}

impl Default for FilterChain {
    fn default() -> Self {
        Self::standard(&FilterConfig::default())
    }
}

impl FilterChain {
    pub fn new(passes: Vec<FilterPass>) -> Self {
        Self { passes }
    }

    /// Passes of the given kinds, in the given order
    pub fn from_kinds(kinds: &[FilterKind], config: &FilterConfig) -> Self {
        Self::new(
            kinds
                .iter()
                .map(|&kind| FilterPass::from_config(kind, config))
                .collect(),
        )
    }

    /// Every pass, in [`FilterKind::STANDARD_ORDER`]
    pub fn standard(config: &FilterConfig) -> Self {
        Self::from_kinds(&FilterKind::STANDARD_ORDER, config)
    }

    pub fn passes(&self) -> &[FilterPass] {
        &self.passes
    }

    /// Run every pass in sequence
    pub fn apply(&self, table: SampleTable) -> Result<SampleTable, ComputeError> {
        self.apply_at(table, now_epoch_seconds())
    }

    /// Run every pass in sequence with a fixed "now"
    pub fn apply_at(&self, table: SampleTable, now: f64) -> Result<SampleTable, ComputeError> {
        self.passes
            .iter()
            .try_fold(table, |table, pass| pass.apply_at(&table, now))
    }
}

fn now_epoch_seconds() -> f64 {
    let now = Utc::now();
    now.timestamp() as f64 + f64::from(now.timestamp_subsec_nanos()) * 1e-9
}

fn require_diameters(columns: Columns, operation: &'static str) -> Result<(), ComputeError> {
    Columns::require(columns.left_diameter, operation, "eyeleft.pupildiameter")?;
    Columns::require(columns.right_diameter, operation, "eyeright.pupildiameter")
}

/// Row indices, relative times and one field of the valid rows that have a
/// relative time, in time order
fn valid_timeline(
    samples: &[Sample],
    field: fn(&Sample) -> Option<f64>,
) -> (Vec<usize>, Vec<f64>, Vec<Option<f64>>) {
    let mut rows = Vec::new();
    let mut times = Vec::new();
    let mut values = Vec::new();
    for (idx, sample) in samples.iter().enumerate() {
        if !sample.is_valid {
            continue;
        }
        if let Some(t) = sample.relative_timestamp() {
            rows.push(idx);
            times.push(t);
            values.push(field(sample));
        }
    }
    (rows, times, values)
}

/// Step-to-step change of one field; undefined for the first row and when
/// either side is missing
fn steps(samples: &[Sample], field: fn(&Sample) -> Option<f64>) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(samples.len());
    out.push(None);
    out.extend(
        samples
            .windows(2)
            .map(|pair| Some(field(&pair[1])? - field(&pair[0])?)),
    );
    out.truncate(samples.len());
    out
}

fn spacing_mask(samples: &[Sample], min_interval: f64) -> Vec<bool> {
    let mut mask = vec![false; samples.len()];
    for (i, delta) in steps(samples, |s| s.timestamp).into_iter().enumerate() {
        if delta.is_some_and(|d| d < min_interval) {
            mask[i - 1] = true;
            mask[i] = true;
        }
    }
    mask
}

fn constant_mask(samples: &[Sample], max_static_steps: usize, tolerance: f64) -> Vec<bool> {
    let left = steps(samples, |s| s.left_diameter);
    let right = steps(samples, |s| s.right_diameter);
    let stable: Vec<bool> = left
        .iter()
        .zip(&right)
        .map(|(l, r)| {
            l.is_some_and(|l| l.abs() < tolerance) && r.is_some_and(|r| r.abs() < tolerance)
        })
        .collect();

    // Runs of equal stability; only stable runs long enough are frozen
    let mut mask = vec![false; samples.len()];
    let mut start = 0;
    while start < stable.len() {
        let mut end = start;
        while end < stable.len() && stable[end] == stable[start] {
            end += 1;
        }
        if stable[start] && end - start >= max_static_steps {
            mask[start..end].iter_mut().for_each(|m| *m = true);
        }
        start = end;
    }
    mask
}

fn async_mask(samples: &[Sample], tolerance: f64) -> Vec<bool> {
    let left = steps(samples, |s| s.left_diameter);
    let right = steps(samples, |s| s.right_diameter);
    left.iter()
        .zip(&right)
        .map(|(l, r)| match (l, r) {
            (Some(l), Some(r)) => l * r < 0.0 && l.abs() > tolerance && r.abs() > tolerance,
            _ => false,
        })
        .collect()
}

/// Flag both ends of every consecutive valid pair changing faster than
/// `max_speed`. Rows without a relative time or an average are stepped over.
/// Flagging can make new neighbours out of the rows around a pair, so the
/// scan repeats over the survivors until it flags nothing new.
fn speed_mask(samples: &[Sample], max_speed: f64) -> Vec<bool> {
    let mut mask = vec![false; samples.len()];
    loop {
        let points: Vec<(usize, f64, f64)> = samples
            .iter()
            .enumerate()
            .filter(|(i, s)| s.is_valid && !mask[*i])
            .filter_map(|(i, s)| Some((i, s.relative_timestamp()?, s.avg_diameter()?)))
            .collect();

        let mut flagged = false;
        for pair in points.windows(2) {
            let ((prev, t0, a0), (next, t1, a1)) = (pair[0], pair[1]);
            let dt = t1 - t0;
            if dt > 0.0 && (a1 - a0).abs() / dt > max_speed {
                flagged |= !mask[prev] || !mask[next];
                mask[prev] = true;
                mask[next] = true;
            }
        }
        if !flagged {
            return mask;
        }
    }
}

/// Flag values outside `mean ± sigma·std` of their closed time neighbourhood.
///
/// A row is only judged when its own value is defined and its neighbourhood
/// holds at least two defined values.
fn std_outlier_mask(
    times: &[f64],
    values: &[Option<f64>],
    time_window: f64,
    sigma_threshold: f64,
) -> Vec<bool> {
    window_bounds(times, time_window)
        .zip(values)
        .map(|(window, own)| {
            let Some(own) = *own else {
                return false;
            };
            let defined: Vec<f64> = values[window].iter().flatten().copied().collect();
            if defined.len() < 2 {
                return false;
            }
            let n = defined.len() as f64;
            let mean = defined.iter().sum::<f64>() / n;
            let std = (defined.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
            let lower = mean - sigma_threshold * std;
            let upper = mean + sigma_threshold * std;
            own < lower || own > upper
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::RecomputeConfig;
    use pretty_assertions::assert_eq;

    const T0: f64 = 1_600_000_000.0;
    const NOW: f64 = 1_700_000_000.0;

    fn table(samples: Vec<Sample>) -> SampleTable {
        SampleTable::new("704", samples, Columns::all(), RecomputeConfig::default())
    }

    fn series(left: &[f64], right: &[f64], step: f64) -> Vec<Sample> {
        left.iter()
            .zip(right)
            .enumerate()
            .map(|(i, (&l, &r))| Sample::gaze(T0 + step * i as f64, l, r))
            .collect()
    }

    fn run(pass: FilterPass, t: &SampleTable) -> Vec<bool> {
        pass.apply_at(t, NOW).unwrap().validity()
    }

    #[test]
    fn test_only_gaze() {
        let mut samples = series(&[3.0; 3], &[3.0; 3], 0.1);
        samples[1].event_type = Some("blink".to_string());
        samples[2].event_type = None;

        let valid = run(
            FilterPass::OnlyGaze {
                gaze_tag: "gaze".into(),
            },
            &table(samples),
        );
        assert_eq!(valid, vec![true, false, false]);
    }

    #[test]
    fn test_pupil_range() {
        let t = table(series(&[0.5, 3.0, 3.0, 3.0], &[3.0, 3.0, 11.0, 10.0], 0.1));
        let valid = run(
            FilterPass::PupilRange {
                min_size: 1.0,
                max_size: 10.0,
            },
            &t,
        );
        assert_eq!(valid, vec![false, true, false, true]);
    }

    #[test]
    fn test_missing_data() {
        let mut samples = series(&[3.0; 3], &[3.0; 3], 0.1);
        samples[0].left_diameter = None;
        samples.push(Sample::new(None, Some("gaze".into()), Some(3.0), Some(3.0)));

        let valid = run(FilterPass::MissingData, &table(samples));
        assert_eq!(valid, vec![false, true, true, false]);
    }

    #[test]
    fn test_timestamp_bounds() {
        let t = table(vec![
            Sample::gaze(1_500_000_000.0, 3.0, 3.0),
            Sample::gaze(1_600_000_000.0, 3.0, 3.0),
            Sample::gaze(1_800_000_000.0, 3.0, 3.0),
        ]);

        let valid = run(
            FilterPass::TimestampBounds {
                min_timestamp: TimestampFloor::Date("01/01/2020".into()),
            },
            &t,
        );
        assert_eq!(valid, vec![false, true, false]);
    }

    #[test]
    fn test_timestamp_floor_parsing() {
        assert_eq!(
            TimestampFloor::Date("01/01/2020".into()).resolve().unwrap(),
            DEFAULT_MIN_TIMESTAMP
        );
        assert!(matches!(
            TimestampFloor::Date("2020-01-01".into()).resolve(),
            Err(ComputeError::DateParseError(_))
        ));

        let epoch: TimestampFloor = serde_json::from_str("1600000000").unwrap();
        assert_eq!(epoch, TimestampFloor::Epoch(1_600_000_000.0));
        let date: TimestampFloor = serde_json::from_str("\"15/03/2021\"").unwrap();
        assert_eq!(date, TimestampFloor::Date("15/03/2021".into()));
    }

    #[test]
    fn test_event_spacing_flags_both_endpoints() {
        let offsets = [0.0, 0.002, 0.1, 0.2, 0.203];
        let samples = offsets
            .iter()
            .map(|o| Sample::gaze(T0 + o, 3.0, 3.0))
            .collect();

        let valid = run(FilterPass::EventSpacing { min_interval: 0.005 }, &table(samples));
        assert_eq!(valid, vec![false, false, true, false, false]);
    }

    #[test]
    fn test_constant_pupil() {
        let d = [3.0, 3.5, 3.5, 3.5, 3.5, 4.0, 4.0, 5.0];
        let valid = run(
            FilterPass::ConstantPupil {
                max_static_steps: 3,
                tolerance: 0.02,
            },
            &table(series(&d, &d, 0.1)),
        );
        assert_eq!(
            valid,
            vec![true, true, false, false, false, true, true, true]
        );
    }

    #[test]
    fn test_constant_pupil_needs_both_eyes_stable() {
        let left = [3.0, 3.0, 3.0, 3.0];
        let right = [3.0, 3.1, 3.2, 3.3];
        let valid = run(
            FilterPass::ConstantPupil {
                max_static_steps: 2,
                tolerance: 0.02,
            },
            &table(series(&left, &right, 0.1)),
        );
        assert!(valid.iter().all(|&v| v));
    }

    #[test]
    fn test_async_pupil() {
        let valid = run(
            FilterPass::AsyncPupil { tolerance: 0.02 },
            &table(series(&[3.0, 3.1, 3.0, 3.01], &[3.0, 2.9, 3.1, 3.0], 0.1)),
        );
        assert_eq!(valid, vec![true, false, false, true]);
    }

    #[test]
    fn test_pupil_speed() {
        let d = [3.0, 3.0, 3.0, 5.0, 3.0, 3.0];
        let valid = run(FilterPass::PupilSpeed { max_speed: 5.0 }, &table(series(&d, &d, 0.1)));
        assert_eq!(valid, vec![true, true, false, false, false, true]);
    }

    #[test]
    fn test_pupil_speed_skips_invalid_rows() {
        let d = [3.0, 9.0, 3.1];
        let t = table(series(&d, &d, 0.1)).invalidate(&[false, true, false]);

        let valid = run(FilterPass::PupilSpeed { max_speed: 5.0 }, &t);
        assert_eq!(valid, vec![true, false, true]);
    }

    #[test]
    fn test_pupil_speed_rechecks_new_neighbours() {
        let d = [3.0, 3.4, 4.1, 4.55];
        let pass = FilterPass::PupilSpeed { max_speed: 5.0 };

        let once = pass.apply_at(&table(series(&d, &d, 0.1)), NOW).unwrap();
        let twice = pass.apply_at(&once, NOW).unwrap();

        assert_eq!(once.validity(), vec![false; 4]);
        assert_eq!(twice.validity(), once.validity());
    }

    #[test]
    fn test_pupil_speed_spans_rows_without_average() {
        let samples = vec![
            Sample::gaze(T0, 3.0, 3.0),
            Sample::new(Some(T0 + 0.1), Some("gaze".into()), Some(3.0), None),
            Sample::gaze(T0 + 0.2, 4.5, 4.5),
        ];

        let valid = run(FilterPass::PupilSpeed { max_speed: 5.0 }, &table(samples));
        assert_eq!(valid, vec![false, true, false]);
    }

    #[test]
    fn test_std_outlier_mask() {
        let times: Vec<f64> = (0..11).map(|i| i as f64 / 10.0).collect();
        let mut stds = vec![Some(1.0); 11];
        stds[5] = Some(10.0);

        let mask = std_outlier_mask(&times, &stds, 1.0, 2.0);
        let flagged: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter(|(_, m)| **m)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(flagged, vec![5]);
    }

    #[test]
    fn test_std_outlier_needs_two_defined_neighbours() {
        let mask = std_outlier_mask(&[0.0, 5.0], &[Some(1.0), Some(9.0)], 1.0, 2.0);
        assert_eq!(mask, vec![false, false]);

        let mask = std_outlier_mask(&[0.0, 0.5], &[None, Some(1.0)], 1.0, 2.0);
        assert_eq!(mask, vec![false, false]);

        let mask = std_outlier_mask(&[0.0, 0.5, 0.9], &[None, None, Some(4.0)], 1.0, 2.0);
        assert_eq!(mask, vec![false, false, false]);
    }

    #[test]
    fn test_std_outliers_keep_sparse_constant_trace() {
        // Spacing wider than the std window leaves every std undefined
        let t = table(series(&[3.0; 5], &[3.0; 5], 0.8));
        let valid = run(
            FilterPass::StdOutliers {
                time_window: 1.0,
                sigma_threshold: 2.0,
            },
            &t,
        );
        assert_eq!(valid, vec![true; 5]);
    }

    #[test]
    fn test_std_outliers_need_diameters() {
        let samples = vec![Sample::new(Some(T0), Some("gaze".into()), None, None)];
        let columns = Columns {
            left_diameter: false,
            right_diameter: false,
            ..Columns::all()
        };
        let t = SampleTable::new("704", samples, columns, RecomputeConfig::default());

        let err = FilterPass::StdOutliers {
            time_window: 1.0,
            sigma_threshold: 2.0,
        }
        .apply_at(&t, NOW)
        .unwrap_err();

        assert!(matches!(
            err,
            ComputeError::DataShape {
                column: "std_diameter",
                ..
            }
        ));
    }

    #[test]
    fn test_type_filter_needs_type_column() {
        let columns = Columns {
            event_type: false,
            ..Columns::all()
        };
        let t = SampleTable::new(
            "704",
            series(&[3.0], &[3.0], 0.1),
            columns,
            RecomputeConfig::default(),
        );

        let err = FilterPass::OnlyGaze {
            gaze_tag: "gaze".into(),
        }
        .apply_at(&t, NOW)
        .unwrap_err();
        assert!(matches!(err, ComputeError::DataShape { column: "type", .. }));
    }

    #[test]
    fn test_passes_are_idempotent() {
        let left = [3.0, 3.1, 0.5, 3.0, 3.0, 5.0, 3.0, 3.2, 3.0];
        let right = [3.0, 2.9, 3.0, 3.0, 3.0, 5.0, 3.0, 3.0, 3.2];
        let mut samples = series(&left, &right, 0.1);
        samples[4].event_type = Some("blink".into());
        let base = table(samples);

        let config = FilterConfig {
            max_static_steps: 2,
            ..FilterConfig::default()
        };
        let kinds = FilterKind::STANDARD_ORDER
            .into_iter()
            .filter(|k| *k != FilterKind::StdOutliers);
        for kind in kinds {
            let pass = FilterPass::from_config(kind, &config);
            let once = pass.apply_at(&base, NOW).unwrap();
            let twice = pass.apply_at(&once, NOW).unwrap();
            assert_eq!(once.validity(), twice.validity(), "{}", kind.as_str());
        }
    }

    #[test]
    fn test_std_outliers_idempotent() {
        let mut samples = series(&[3.0; 10], &[3.0; 10], 0.1);
        samples.push(Sample::gaze(T0 + 3.0, 3.0, 3.0));
        samples.push(Sample::gaze(T0 + 6.0, 3.0, 3.0));
        samples.push(Sample::gaze(T0 + 6.2, 3.4, 3.4));
        samples.push(Sample::new(Some(T0 + 8.0), Some("gaze".into()), Some(3.0), None));
        samples.push(Sample::gaze(T0 + 8.3, 3.0, 3.0));

        let pass = FilterPass::StdOutliers {
            time_window: 1.0,
            sigma_threshold: 2.0,
        };
        let once = pass.apply_at(&table(samples), NOW).unwrap();
        let twice = pass.apply_at(&once, NOW).unwrap();

        assert_eq!(once.validity(), vec![true; 15]);
        assert_eq!(twice.validity(), once.validity());
    }

    #[test]
    fn test_chain_is_monotonic() {
        let left = [3.0, 3.1, 0.5, 3.0, 3.0, 5.0, 3.0, 3.2, 3.0];
        let right = [3.0, 2.9, 3.0, 3.0, 3.0, 5.0, 3.0, 3.0, 3.2];
        let mut t = table(series(&left, &right, 0.1)).invalidate(&[
            false, false, false, false, false, false, false, false, true,
        ]);

        for pass in FilterChain::default().passes() {
            let before = t.validity();
            t = pass.apply_at(&t, NOW).unwrap();
            for (b, a) in before.iter().zip(t.validity()) {
                assert!(*b || !a, "{} revived a row", pass.kind().as_str());
            }
        }
        assert!(!t.validity()[8]);
    }

    #[test]
    fn test_chain_order_and_config() {
        let config = FilterConfig {
            tolerance: 0.5,
            ..FilterConfig::default()
        };
        let chain = FilterChain::from_kinds(&[FilterKind::AsyncPupil, FilterKind::OnlyGaze], &config);

        assert_eq!(
            chain.passes(),
            &[
                FilterPass::AsyncPupil { tolerance: 0.5 },
                FilterPass::OnlyGaze {
                    gaze_tag: "gaze".into()
                },
            ]
        );
        assert_eq!(FilterChain::default().passes().len(), 9);
    }

    #[test]
    fn test_filter_config_defaults_fill_gaps() {
        let config: FilterConfig =
            serde_json::from_str(r#"{"tolerance": 0.05, "min_timestamp": "01/06/2021"}"#).unwrap();

        assert_eq!(config.tolerance, 0.05);
        assert_eq!(config.max_speed, DEFAULT_MAX_SPEED);
        assert_eq!(config.min_timestamp, TimestampFloor::Date("01/06/2021".into()));
    }
}
