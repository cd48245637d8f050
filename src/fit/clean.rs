//! Merge, clean and threshold a record set before fitting.
//!
//! The cleaned set only ever contains finite values in every requested column
//! and current values at or below the active threshold.

use crate::data::Record;
use crate::error::FlowError;

/// Requested columns merged across records, restricted to complete rows.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedSet {
    keys: Vec<String>,
    columns: Vec<Vec<f64>>,
    /// Rows seen before cleaning (for diagnostics).
    pub rows_in: usize,
    /// Rows dropped for missing / non-finite values.
    pub rows_incomplete: usize,
}

impl CleanedSet {
    pub fn len(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn column(&self, key: &str) -> Option<&[f64]> {
        let idx = self.keys.iter().position(|k| k == key)?;
        self.columns.get(idx).map(Vec::as_slice)
    }
}

/// Merge `keys` across `records`, drop incomplete rows, then keep rows with
/// `current_key <= threshold`.
///
/// A record lacking one of the requested columns contributes missing values
/// for it, so all of its rows are dropped.
pub fn clean(
    records: &[Record],
    keys: &[&str],
    current_key: &str,
    threshold: f64,
) -> Result<CleanedSet, FlowError> {
    let current_pos = keys.iter().position(|k| *k == current_key).ok_or_else(|| {
        FlowError::InvalidInput(format!("current column `{current_key}` must be one of the requested keys"))
    })?;

    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); keys.len()];
    let mut rows_in = 0usize;
    let mut rows_incomplete = 0usize;

    for record in records {
        for sample in record.samples() {
            rows_in += 1;
            let values: Option<Vec<f64>> = keys
                .iter()
                .map(|k| sample.get(k).filter(|v| v.is_finite()))
                .collect();
            let Some(values) = values else {
                rows_incomplete += 1;
                continue;
            };
            if values[current_pos] > threshold {
                continue;
            }
            for (col, v) in columns.iter_mut().zip(values) {
                col.push(v);
            }
        }
    }

    let cleaned = CleanedSet {
        keys: keys.iter().map(|k| k.to_string()).collect(),
        columns,
        rows_in,
        rows_incomplete,
    };

    if cleaned.is_empty() {
        return Err(FlowError::EmptyResult {
            context: format!("{} <= {threshold} over {} record(s)", current_key, records.len()),
        });
    }

    tracing::debug!(
        rows_in,
        rows_incomplete,
        rows_kept = cleaned.len(),
        threshold,
        "cleaned record set"
    );
    Ok(cleaned)
}
