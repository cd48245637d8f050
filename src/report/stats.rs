//! Descriptive statistics over a cleaned column.

use statrs::statistics::Statistics;

/// Count, moments and quartiles of a column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnStats {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation (`n − 1`); `NaN` for fewer than two values.
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

/// Describe the finite values of `values`; `None` if there are none.
pub fn describe(values: &[f64]) -> Option<ColumnStats> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);

    Some(ColumnStats {
        count: sorted.len(),
        mean: sorted.iter().mean(),
        std: sorted.iter().std_dev(),
        min: sorted[0],
        q25: quantile_sorted(&sorted, 0.25),
        median: quantile_sorted(&sorted, 0.5),
        q75: quantile_sorted(&sorted, 0.75),
        max: sorted[sorted.len() - 1],
    })
}

/// Sample standard deviation; `NaN` for fewer than two values.
pub fn sample_std(values: &[f64]) -> f64 {
    values.iter().std_dev()
}

/// Linear-interpolated quantile of an ascending slice.
fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + frac * (sorted[hi] - sorted[lo])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_matches_hand_computed_values() {
        let s = describe(&[4.0, 1.0, 3.0, 2.0, f64::NAN]).unwrap();
        assert_eq!(s.count, 4);
        assert!((s.mean - 2.5).abs() < 1e-12);
        assert!((s.std - (5.0_f64 / 3.0).sqrt()).abs() < 1e-12);
        assert_eq!(s.min, 1.0);
        assert!((s.q25 - 1.75).abs() < 1e-12);
        assert!((s.median - 2.5).abs() < 1e-12);
        assert!((s.q75 - 3.25).abs() < 1e-12);
        assert_eq!(s.max, 4.0);
    }

    #[test]
    fn single_value_has_undefined_spread() {
        let s = describe(&[7.0]).unwrap();
        assert_eq!(s.median, 7.0);
        assert!(s.std.is_nan());
        assert!(describe(&[]).is_none());
    }
}
