//! Maximum operating current detection.
//!
//! The configured `Imax` is a safety ceiling; the current actually reached
//! during a run is read off the pump-speed plateau. For every file we select
//! samples where the pump runs within `ε` of the reference maximum speed and
//! the magnet is energized. A selection whose current still varies by at
//! least `dispersion_floor` is a genuine ramp into the speed limit; its
//! minimum current is the file's estimate. Perfectly flat selections
//! (saturated sensors, runs already at speed) are rejected.
//!
//! The estimates of all accepted files are averaged.

use crate::data::Record;
use crate::domain::{FIELD_COLUMN, PlateauCandidate};
use crate::report::sample_std;

/// Plateau detection thresholds.
#[derive(Debug, Clone)]
pub struct ImaxOptions {
    /// Relative tolerance below the maximum pump speed (`0.001` = 0.1%).
    pub speed_epsilon: f64,
    /// Minimum field strength for a sample to count as energized.
    pub field_min: f64,
    /// Minimum standard deviation of current inside a plateau (A).
    pub dispersion_floor: f64,
}

impl Default for ImaxOptions {
    fn default() -> Self {
        Self {
            speed_epsilon: 1e-3,
            field_min: 0.1,
            dispersion_floor: 10.0,
        }
    }
}

/// Why a file produced no plateau candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum PlateauRejection {
    MissingColumn(String),
    EmptySelection,
    FlatPlateau { spread: f64, n_samples: usize },
}

/// Result of scanning a file set.
#[derive(Debug, Clone, Default)]
pub struct ImaxEstimate {
    pub rpm_max: Option<f64>,
    pub speed_threshold: Option<f64>,
    pub candidates: Vec<PlateauCandidate>,
    pub rejected: Vec<(String, PlateauRejection)>,
}

impl ImaxEstimate {
    /// Mean of the per-file candidates; `None` when no plateau was detected.
    pub fn imax(&self) -> Option<f64> {
        if self.candidates.is_empty() {
            return None;
        }
        let sum: f64 = self.candidates.iter().map(|c| c.current).sum();
        Some(sum / self.candidates.len() as f64)
    }
}

/// Scan `records` for pump-speed plateaus.
///
/// The speed ceiling is taken from the first record (the reference file).
pub fn estimate_imax(records: &[Record], current_key: &str, rpm_key: &str, opts: &ImaxOptions) -> ImaxEstimate {
    let mut estimate = ImaxEstimate::default();

    let Some(rpm_max) = records.first().and_then(|r| r.max_of(rpm_key)) else {
        tracing::info!(rpm_key, "no reference pump speed; Imax detection skipped");
        return estimate;
    };
    let threshold = rpm_max * (1.0 - opts.speed_epsilon);
    estimate.rpm_max = Some(rpm_max);
    estimate.speed_threshold = Some(threshold);

    for record in records {
        match scan_record(record, current_key, rpm_key, threshold, opts) {
            Ok(candidate) => {
                tracing::debug!(
                    file = record.name(),
                    imax = candidate.current,
                    spread = candidate.spread,
                    n = candidate.n_samples,
                    "plateau candidate"
                );
                estimate.candidates.push(candidate);
            }
            Err(reason) => {
                tracing::debug!(file = record.name(), ?reason, "no plateau");
                estimate.rejected.push((record.name().to_string(), reason));
            }
        }
    }

    estimate
}

fn scan_record(
    record: &Record,
    current_key: &str,
    rpm_key: &str,
    threshold: f64,
    opts: &ImaxOptions,
) -> Result<PlateauCandidate, PlateauRejection> {
    for key in [current_key, rpm_key, FIELD_COLUMN] {
        if !record.has_column(key) {
            return Err(PlateauRejection::MissingColumn(key.to_string()));
        }
    }

    let plateau = record.select(|s| {
        let rpm_ok = s.get(rpm_key).is_some_and(|v| v >= threshold);
        let field_ok = s.get(FIELD_COLUMN).is_some_and(|v| v > opts.field_min);
        rpm_ok && field_ok
    });

    let currents: Vec<f64> = plateau
        .column(current_key)
        .unwrap_or_default()
        .into_iter()
        .filter(|v| v.is_finite())
        .collect();
    if currents.is_empty() {
        return Err(PlateauRejection::EmptySelection);
    }

    // NaN spread (single sample) fails the comparison and counts as flat.
    let spread = sample_std(&currents);
    if !(spread >= opts.dispersion_floor) {
        return Err(PlateauRejection::FlatPlateau {
            spread,
            n_samples: currents.len(),
        });
    }

    let current = currents.iter().copied().fold(f64::INFINITY, f64::min);
    Ok(PlateauCandidate {
        file: record.name().to_string(),
        current,
        spread,
        n_samples: currents.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A ramp up to `rpm_max` followed by the given plateau currents.
    fn file(name: &str, plateau: &[f64]) -> Record {
        let mut current = vec![0.0, 20.0, 40.0, 60.0];
        let mut rpm = vec![1000.0, 1500.0, 2000.0, 2500.0];
        let mut field = vec![0.0, 2.0, 4.0, 6.0];
        for &i in plateau {
            current.push(i);
            rpm.push(3840.0);
            field.push(10.0);
        }
        Record::from_columns(
            name,
            vec![
                ("Icoil1".to_string(), current),
                ("Rpm1".to_string(), rpm),
                (FIELD_COLUMN.to_string(), field),
            ],
        )
        .unwrap()
    }

    #[test]
    fn averages_plateau_minima_across_files() {
        let records = vec![
            file("M9_a.txt", &[100.0, 80.0, 120.0]),
            file("M9_b.txt", &[105.0, 85.0, 125.0]),
        ];
        let est = estimate_imax(&records, "Icoil1", "Rpm1", &ImaxOptions::default());
        assert_eq!(est.candidates.len(), 2);
        assert_eq!(est.candidates[0].current, 80.0);
        assert_eq!(est.candidates[1].current, 85.0);
        assert_eq!(est.imax(), Some(82.5));
        assert!((est.speed_threshold.unwrap() - 3840.0 * 0.999).abs() < 1e-9);
    }

    #[test]
    fn flat_plateau_is_excluded() {
        let records = vec![
            file("M9_a.txt", &[100.0, 80.0, 120.0]),
            file("M9_flat.txt", &[105.0, 104.0, 106.0]),
        ];
        let est = estimate_imax(&records, "Icoil1", "Rpm1", &ImaxOptions::default());
        assert_eq!(est.imax(), Some(80.0));
        assert_eq!(est.rejected.len(), 1);
        assert!(matches!(est.rejected[0].1, PlateauRejection::FlatPlateau { .. }));
    }

    #[test]
    fn no_plateau_yields_no_estimate() {
        let records = vec![file("M9_flat.txt", &[105.0, 105.0, 105.0])];
        let est = estimate_imax(&records, "Icoil1", "Rpm1", &ImaxOptions::default());
        assert_eq!(est.imax(), None);
    }

    #[test]
    fn unenergized_samples_are_ignored() {
        let r = file("M9_a.txt", &[100.0, 80.0, 120.0]);
        let deenergized = Record::from_columns(
            "M9_off.txt",
            vec![
                ("Icoil1".to_string(), vec![10.0, 50.0, 90.0]),
                ("Rpm1".to_string(), vec![3840.0, 3840.0, 3840.0]),
                (FIELD_COLUMN.to_string(), vec![0.0, 0.05, 0.1]),
            ],
        )
        .unwrap();
        let est = estimate_imax(&[r, deenergized], "Icoil1", "Rpm1", &ImaxOptions::default());
        assert_eq!(est.imax(), Some(80.0));
        assert_eq!(est.rejected[0].1, PlateauRejection::EmptySelection);
    }

    #[test]
    fn missing_current_column_is_rejected_not_fatal() {
        let other = Record::from_columns(
            "M9_other.txt",
            vec![
                ("Rpm1".to_string(), vec![3840.0]),
                (FIELD_COLUMN.to_string(), vec![10.0]),
            ],
        )
        .unwrap();
        let est = estimate_imax(
            &[file("M9_a.txt", &[100.0, 80.0, 120.0]), other],
            "Icoil1",
            "Rpm1",
            &ImaxOptions::default(),
        );
        assert_eq!(est.imax(), Some(80.0));
        assert_eq!(
            est.rejected[0].1,
            PlateauRejection::MissingColumn("Icoil1".to_string())
        );
    }
}
