//! Current-column discovery and file-set filtering.
//!
//! Records carry one `Icoil<N>` column per coil. Which one drives the cooling
//! loop depends on the part type: non-bitter magnets use the first matching
//! header, bitter magnets the last. Columns that are zero throughout the
//! reference record are ignored (unused coils are logged as all zeros).

use std::sync::OnceLock;

use regex::Regex;

use crate::data::Record;
use crate::domain::PartType;
use crate::error::FlowError;

fn current_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^Icoil\d+").unwrap_or_else(|e| unreachable!("static regex: {e}")))
}

/// Pick the current column of `reference` for the given part type.
///
/// The matched `Icoil<N>` prefix is the key, mirroring how headers are
/// matched at their start.
pub fn resolve_current_key(reference: &Record, part: PartType) -> Result<String, FlowError> {
    let pattern = current_pattern();
    let candidates: Vec<String> = reference
        .headers()
        .iter()
        .filter(|h| !is_all_zero(reference, h))
        .filter_map(|h| pattern.find(h).map(|m| m.as_str().to_string()))
        .collect();

    let key = if part.is_bitter() {
        candidates.last()
    } else {
        candidates.first()
    };

    key.cloned()
        .ok_or_else(|| FlowError::NoCurrentColumn(reference.name().to_string()))
}

fn is_all_zero(record: &Record, header: &str) -> bool {
    record
        .column(header)
        .is_some_and(|c| c.iter().all(|&v| v == 0.0))
}

/// Split `records` into those carrying `column` and diagnostics for the rest.
///
/// Dropped records are excluded from every later stage.
pub fn retain_with_column(records: Vec<Record>, column: &str) -> (Vec<Record>, Vec<FlowError>) {
    let mut kept = Vec::with_capacity(records.len());
    let mut dropped = Vec::new();
    for record in records {
        if record.has_column(column) {
            kept.push(record);
        } else {
            tracing::warn!(file = record.name(), column, "missing current column; file ignored");
            dropped.push(FlowError::MissingColumn {
                file: record.name().to_string(),
                column: column.to_string(),
            });
        }
    }
    (kept, dropped)
}
