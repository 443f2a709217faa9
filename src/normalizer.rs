//! Record normalization
//!
//! This module turns an untyped raw table into typed samples:
//! - Engine prefixes (`data.`) stripped from column names
//! - Recognised columns mapped onto [`Sample`] fields
//! - Validity defaulted to true when the export carries no flag
//! - Source column presence recorded for later shape checks

use serde_json::Value;

use crate::error::ComputeError;
use crate::schema::{RawRecord, RawTable};
use crate::types::{
    Columns, Sample, IS_VALID_COLUMN, LEFT_DIAMETER_COLUMN, RIGHT_DIAMETER_COLUMN,
    TIMESTAMP_COLUMN, TYPE_COLUMN,
};

/// Prefix the eye-tracking engine puts in front of payload columns
pub const ENGINE_PREFIX: &str = "data.";

/// Normalizer for converting raw records to samples
pub struct Normalizer;

impl Normalizer {
    /// Normalize a raw table into samples plus the set of columns it carried
    pub fn normalize(raw: &RawTable) -> Result<(Vec<Sample>, Columns), ComputeError> {
        let names: Vec<&str> = raw.columns().iter().map(|c| normalize_column(c)).collect();
        let has = |column: &str| names.iter().any(|n| *n == column);

        let columns = Columns {
            timestamp: has(TIMESTAMP_COLUMN),
            event_type: has(TYPE_COLUMN),
            left_diameter: has(LEFT_DIAMETER_COLUMN),
            right_diameter: has(RIGHT_DIAMETER_COLUMN),
        };
        let has_validity = has(IS_VALID_COLUMN);

        let samples = raw
            .records()
            .iter()
            .enumerate()
            .map(|(row, record)| normalize_record(row, record, has_validity))
            .collect::<Result<Vec<_>, _>>()?;

        Ok((samples, columns))
    }
}

/// Strip the engine prefix from a column name
pub fn normalize_column(name: &str) -> &str {
    name.strip_prefix(ENGINE_PREFIX).unwrap_or(name)
}

fn normalize_record(
    row: usize,
    record: &RawRecord,
    has_validity: bool,
) -> Result<Sample, ComputeError> {
    let mut sample = Sample::new(None, None, None, None);
    // A flag column that exists but is missing on this row does not vouch for it.
    sample.is_valid = !has_validity;

    for (name, value) in record.iter() {
        match normalize_column(name) {
            TIMESTAMP_COLUMN => sample.timestamp = number(row, name, value)?,
            TYPE_COLUMN => sample.event_type = text(row, name, value)?,
            LEFT_DIAMETER_COLUMN => sample.left_diameter = number(row, name, value)?,
            RIGHT_DIAMETER_COLUMN => sample.right_diameter = number(row, name, value)?,
            IS_VALID_COLUMN => sample.is_valid = flag(row, name, value)?,
            _ => {}
        }
    }

    Ok(sample)
}

fn number(row: usize, column: &str, value: &Value) -> Result<Option<f64>, ComputeError> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => Ok(n.as_f64()),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| type_error(row, column, "a number")),
        _ => Err(type_error(row, column, "a number")),
    }
}

fn text(row: usize, column: &str, value: &Value) -> Result<Option<String>, ComputeError> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        _ => Err(type_error(row, column, "a string")),
    }
}

fn flag(row: usize, column: &str, value: &Value) -> Result<bool, ComputeError> {
    match value {
        Value::Null => Ok(false),
        Value::Bool(b) => Ok(*b),
        _ => Err(type_error(row, column, "a boolean")),
    }
}

fn type_error(row: usize, column: &str, expected: &str) -> ComputeError {
    ComputeError::ParseError(format!(
        "Record {}: column '{}' is not {}",
        row, column, expected
    ))
}
