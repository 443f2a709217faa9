//! Input boundary
//!
//! This module reads the two external inputs of a calibration run: the raw
//! eye-tracker event export and the per-subject phase timing file.

mod raw_record;
mod timing;

pub use raw_record::*;
pub use timing::*;
