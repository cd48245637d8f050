//! Linear least squares primitives used inside the nonlinear fitter.
//!
//! Each Levenberg–Marquardt step is a small linear problem of the form:
//!
//! ```text
//! minimize ‖ [J; √λ·D] δ − [r; 0] ‖²
//! ```
//!
//! Implementation choices:
//! - We solve via SVD so tall (more rows than columns) and nearly rank
//!   deficient systems are handled without forming `JᵀJ` explicitly.
//!   (Nalgebra's `QR::solve` is intended for square systems and will panic for
//!   non-square matrices.)
//! - Parameter dimension is tiny (two columns for every cooling-circuit
//!   model), so SVD cost is negligible.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Moore–Penrose pseudo-inverse of a square normal matrix.
///
/// Singular values below `rel_tol · σ_max` are treated as zero.
pub fn pseudo_inverse(a: &DMatrix<f64>, rel_tol: f64) -> Option<DMatrix<f64>> {
    let svd = a.clone().svd(true, true);
    let s_max = svd.singular_values.iter().copied().fold(0.0, f64::max);
    let eps = (s_max * rel_tol).max(f64::MIN_POSITIVE);
    let inv = svd.pseudo_inverse(eps).ok()?;
    if inv.iter().all(|v| v.is_finite()) {
        Some(inv)
    } else {
        None
    }
}
