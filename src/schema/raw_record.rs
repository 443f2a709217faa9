//! Raw eye-tracker export format
//!
//! Sessions arrive as newline-delimited JSON, usually gzip-compressed, one
//! event object per line. Nested objects are flattened into dotted column
//! names (`data.eyeleft.pupildiameter`) so each event becomes one flat row.

use flate2::read::GzDecoder;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::ComputeError;

/// One flattened event: dotted column name → scalar JSON value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    fields: BTreeMap<String, Value>,
}

impl RawRecord {
    /// Flatten a JSON object into a record
    pub fn from_object(object: Map<String, Value>) -> Self {
        let mut fields = BTreeMap::new();
        flatten_into(&mut fields, None, object);
        Self { fields }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields.get(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Untyped table of raw events for one subject
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    columns: BTreeSet<String>,
    records: Vec<RawRecord>,
}

impl RawTable {
    pub fn new(records: Vec<RawRecord>) -> Self {
        let columns = records
            .iter()
            .flat_map(|r| r.columns().map(str::to_string))
            .collect();
        Self { columns, records }
    }

    /// Parse NDJSON text
    pub fn parse_ndjson(ndjson: &str) -> Result<Self, ComputeError> {
        Self::from_reader(ndjson.as_bytes())
    }

    /// Parse NDJSON from any buffered reader
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, ComputeError> {
        let mut records = Vec::new();
        for (line_num, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<Value>(trimmed) {
                Ok(Value::Object(object)) => records.push(RawRecord::from_object(object)),
                Ok(_) => {
                    return Err(ComputeError::ParseError(format!(
                        "Line {} is not a JSON object",
                        line_num + 1
                    )));
                }
                Err(e) => {
                    return Err(ComputeError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        log::debug!("parsed {} raw records", records.len());
        Ok(Self::new(records))
    }

    /// Read a session export; files ending in `.gz` are decompressed
    pub fn read_path(path: &Path) -> Result<Self, ComputeError> {
        let file = File::open(path)?;
        let is_gzip = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("gz"));
        if is_gzip {
            Self::from_reader(BufReader::new(GzDecoder::new(BufReader::new(file))))
        } else {
            Self::from_reader(BufReader::new(file))
        }
    }

    pub fn columns(&self) -> &BTreeSet<String> {
        &self.columns
    }

    pub fn records(&self) -> &[RawRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn flatten_into(out: &mut BTreeMap<String, Value>, prefix: Option<&str>, object: Map<String, Value>) {
    for (key, value) in object {
        let name = match prefix {
            Some(p) => format!("{}.{}", p, key),
            None => key,
        };
        match value {
            Value::Object(inner) => flatten_into(out, Some(&name), inner),
            other => {
                out.insert(name, other);
            }
        }
    }
}
