//! Nonlinear least squares (Levenberg–Marquardt) for a single model.
//!
//! Given:
//! - a model `f(x; p)`
//! - samples `x_i`, `y_i`
//! - a starting point `p₀` (all ones unless supplied)
//!
//! we minimize `Σ (y_i − f(x_i; p))²`. Each iteration solves the damped
//! Gauss–Newton step as an augmented linear least-squares problem (SVD), with
//! Marquardt's diagonal scaling. The damping factor shrinks after a
//! successful step and grows after a rejected one.
//!
//! Covariance follows the usual Gaussian-noise estimate:
//! `cov = pinv(JᵀJ) · SSE / (n − p)`; with `n == p` the residual variance is
//! undefined and every entry is `+∞`.

use nalgebra::{DMatrix, DVector};

use crate::domain::FitResult;
use crate::error::FlowError;
use crate::math::{pseudo_inverse, solve_least_squares};
use crate::models::CurveModel;

/// Solver tolerances and budget.
#[derive(Debug, Clone)]
pub struct FitOptions {
    /// Maximum number of accepted-or-rejected outer iterations.
    pub max_iterations: usize,
    /// Stop when the relative SSE reduction of a step falls below this.
    pub ftol: f64,
    /// Stop when the relative step size falls below this.
    pub xtol: f64,
    /// Stop when the largest gradient component falls below this.
    pub gtol: f64,
    /// Initial damping factor.
    pub lambda0: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            ftol: 1.490_12e-8,
            xtol: 1.490_12e-8,
            gtol: 0.0,
            lambda0: 1e-3,
        }
    }
}

const LAMBDA_UP: f64 = 10.0;
const LAMBDA_DOWN: f64 = 10.0;
const LAMBDA_MAX: f64 = 1e16;
/// Floor for Marquardt scaling so flat directions still get damped.
const SCALE_FLOOR: f64 = 1e-12;

/// Fit `model` to `(x, y)` from the model's default starting point.
pub fn fit_curve<M: CurveModel + ?Sized>(
    model: &M,
    x: &[f64],
    y: &[f64],
    opts: &FitOptions,
) -> Result<FitResult, FlowError> {
    fit_curve_from(model, x, y, &model.initial_guess(), opts)
}

/// Fit `model` to `(x, y)` starting from `guess`.
pub fn fit_curve_from<M: CurveModel + ?Sized>(
    model: &M,
    x: &[f64],
    y: &[f64],
    guess: &[f64],
    opts: &FitOptions,
) -> Result<FitResult, FlowError> {
    let p = model.param_count();
    validate_inputs(x, y, p)?;
    if guess.len() != p || guess.iter().any(|v| !v.is_finite()) {
        return Err(FlowError::InvalidInput(format!(
            "initial guess for {} must hold {p} finite values",
            model.name()
        )));
    }

    let n = x.len();
    let mut params = guess.to_vec();
    let mut residuals = DVector::<f64>::zeros(n);
    let mut sse = fill_residuals(model, x, y, &params, &mut residuals);
    if !sse.is_finite() {
        return Err(FlowError::FitDiverged {
            iterations: 0,
            reason: format!("non-finite residuals at the starting point of {}", model.name()),
        });
    }

    let mut jac = DMatrix::<f64>::zeros(n, p);
    let mut lambda = opts.lambda0;

    for iter in 1..=opts.max_iterations {
        fill_jacobian(model, x, &params, &mut jac);

        let grad = jac.tr_mul(&residuals);
        if grad.amax() <= opts.gtol || sse == 0.0 {
            return finish(model, &jac, params, sse, iter);
        }

        // Marquardt scaling: damp each parameter by its own curvature.
        let scale: Vec<f64> = (0..p)
            .map(|j| jac.column(j).norm_squared().max(SCALE_FLOOR))
            .collect();

        // Inner loop: raise λ until a step reduces the SSE.
        let mut accepted = None;
        while lambda <= LAMBDA_MAX {
            let mut aug = DMatrix::<f64>::zeros(n + p, p);
            aug.view_mut((0, 0), (n, p)).copy_from(&jac);
            for j in 0..p {
                aug[(n + j, j)] = (lambda * scale[j]).sqrt();
            }
            let mut rhs = DVector::<f64>::zeros(n + p);
            rhs.rows_mut(0, n).copy_from(&residuals);

            let Some(step) = solve_least_squares(&aug, &rhs) else {
                lambda *= LAMBDA_UP;
                continue;
            };

            let trial: Vec<f64> = params.iter().zip(step.iter()).map(|(a, d)| a + d).collect();
            let mut trial_res = DVector::<f64>::zeros(n);
            let trial_sse = fill_residuals(model, x, y, &trial, &mut trial_res);

            if trial_sse.is_finite() && trial_sse <= sse {
                accepted = Some((step, trial, trial_res, trial_sse));
                lambda = (lambda / LAMBDA_DOWN).max(f64::MIN_POSITIVE);
                break;
            }
            lambda *= LAMBDA_UP;
        }

        // No damping level improves the fit: we are at a (numerical) minimum.
        let Some((step, trial, trial_res, trial_sse)) = accepted else {
            tracing::debug!(model = model.name(), iter, "damping exhausted; accepting current point");
            return finish(model, &jac, params, sse, iter);
        };

        let step_norm = step.norm();
        let param_norm = params.iter().map(|v| v * v).sum::<f64>().sqrt();
        let reduction = sse - trial_sse;

        params = trial;
        residuals = trial_res;
        let prev_sse = sse;
        sse = trial_sse;

        let small_step = step_norm <= opts.xtol * (param_norm + opts.xtol);
        let small_reduction = reduction <= opts.ftol * prev_sse;
        if small_step || small_reduction {
            fill_jacobian(model, x, &params, &mut jac);
            return finish(model, &jac, params, sse, iter);
        }
    }

    Err(FlowError::FitDiverged {
        iterations: opts.max_iterations,
        reason: format!("{} did not meet tolerances (sse={sse:.6e})", model.name()),
    })
}

fn validate_inputs(x: &[f64], y: &[f64], p: usize) -> Result<(), FlowError> {
    if x.len() != y.len() {
        return Err(FlowError::LengthMismatch {
            x_len: x.len(),
            y_len: y.len(),
        });
    }
    if x.len() < p || x.is_empty() {
        return Err(FlowError::InsufficientData {
            needed: p.max(1),
            available: x.len(),
        });
    }
    if let Some(index) = x
        .iter()
        .zip(y.iter())
        .position(|(a, b)| !(a.is_finite() && b.is_finite()))
    {
        return Err(FlowError::NonFiniteInput { index });
    }
    Ok(())
}

fn fill_residuals<M: CurveModel + ?Sized>(
    model: &M,
    x: &[f64],
    y: &[f64],
    params: &[f64],
    out: &mut DVector<f64>,
) -> f64 {
    let mut sse = 0.0;
    for (i, (&xi, &yi)) in x.iter().zip(y.iter()).enumerate() {
        let r = yi - model.eval(xi, params);
        out[i] = r;
        sse += r * r;
    }
    sse
}

fn fill_jacobian<M: CurveModel + ?Sized>(model: &M, x: &[f64], params: &[f64], jac: &mut DMatrix<f64>) {
    let mut row = vec![0.0; params.len()];
    for (i, &xi) in x.iter().enumerate() {
        model.partials(xi, params, &mut row);
        for (j, v) in row.iter().enumerate() {
            jac[(i, j)] = *v;
        }
    }
}

fn finish<M: CurveModel + ?Sized>(
    model: &M,
    jac: &DMatrix<f64>,
    params: Vec<f64>,
    sse: f64,
    iterations: usize,
) -> Result<FitResult, FlowError> {
    if params.iter().any(|v| !v.is_finite()) {
        return Err(FlowError::FitDiverged {
            iterations,
            reason: format!("non-finite parameters for {}", model.name()),
        });
    }

    let n = jac.nrows();
    let p = jac.ncols();
    let normal = jac.tr_mul(jac);
    let covariance = if n > p {
        let s_sq = sse / (n - p) as f64;
        pseudo_inverse(&normal, f64::EPSILON * n.max(p) as f64)
            .map(|inv| inv * s_sq)
            .unwrap_or_else(|| DMatrix::from_element(p, p, f64::INFINITY))
    } else {
        DMatrix::from_element(p, p, f64::INFINITY)
    };

    Ok(FitResult {
        params,
        covariance,
        sse,
        iterations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PumpSpeedModel;

    struct Exponential;

    impl CurveModel for Exponential {
        fn name(&self) -> &'static str {
            "exp"
        }
        fn param_count(&self) -> usize {
            2
        }
        fn eval(&self, x: f64, params: &[f64]) -> f64 {
            params[0] * (params[1] * x).exp()
        }
    }

    #[test]
    fn recovers_noise_free_pump_speed_parameters() {
        let model = PumpSpeedModel::new(28_000.0).unwrap();
        let x: Vec<f64> = (0..200).map(|i| i as f64 * 28_000.0 / 199.0).collect();
        let y: Vec<f64> = x.iter().map(|&xi| model.eval(xi, &[10.0, 5.0])).collect();

        let fit = fit_curve(&model, &x, &y, &FitOptions::default()).unwrap();
        assert!((fit.params[0] - 10.0).abs() < 1e-6, "a={}", fit.params[0]);
        assert!((fit.params[1] - 5.0).abs() < 1e-6, "b={}", fit.params[1]);
        assert!(fit.sse < 1e-12);
        for s in fit.stderr() {
            assert!(s.is_finite() && s < 1e-6);
        }
    }

    #[test]
    fn recovers_nonlinear_model_with_numeric_jacobian() {
        let x: Vec<f64> = (0..50).map(|i| i as f64 * 0.04).collect();
        let y: Vec<f64> = x.iter().map(|&xi| 2.0 * (0.5 * xi).exp()).collect();

        let fit = fit_curve(&Exponential, &x, &y, &FitOptions::default()).unwrap();
        assert!((fit.params[0] - 2.0).abs() < 1e-6, "a={}", fit.params[0]);
        assert!((fit.params[1] - 0.5).abs() < 1e-6, "b={}", fit.params[1]);
    }

    #[test]
    fn covariance_is_symmetric_and_scaled_by_noise() {
        let model = PumpSpeedModel::new(100.0).unwrap();
        let x: Vec<f64> = (0..40).map(|i| i as f64 * 2.5).collect();
        // Deterministic alternating perturbation.
        let y: Vec<f64> = x
            .iter()
            .enumerate()
            .map(|(i, &xi)| model.eval(xi, &[30.0, 7.0]) + if i % 2 == 0 { 0.5 } else { -0.5 })
            .collect();

        let fit = fit_curve(&model, &x, &y, &FitOptions::default()).unwrap();
        let c = &fit.covariance;
        assert!((c[(0, 1)] - c[(1, 0)]).abs() < 1e-9);
        assert!(c[(0, 0)] > 0.0 && c[(1, 1)] > 0.0);
        assert!((fit.params[0] - 30.0).abs() < 1.0);
    }

    #[test]
    fn exactly_determined_fit_has_infinite_covariance() {
        let model = PumpSpeedModel::new(10.0).unwrap();
        let fit = fit_curve(&model, &[0.0, 10.0], &[5.0, 15.0], &FitOptions::default()).unwrap();
        assert!((fit.params[0] - 10.0).abs() < 1e-6);
        assert!(fit.covariance.iter().all(|v| v.is_infinite()));
    }

    #[test]
    fn rejects_bad_inputs() {
        let model = PumpSpeedModel::new(10.0).unwrap();
        let opts = FitOptions::default();
        assert!(matches!(
            fit_curve(&model, &[1.0], &[1.0], &opts),
            Err(FlowError::InsufficientData { needed: 2, available: 1 })
        ));
        assert!(matches!(
            fit_curve(&model, &[1.0, 2.0], &[1.0], &opts),
            Err(FlowError::LengthMismatch { .. })
        ));
        assert!(matches!(
            fit_curve(&model, &[1.0, f64::NAN, 3.0], &[1.0, 2.0, 3.0], &opts),
            Err(FlowError::NonFiniteInput { index: 1 })
        ));
    }

    #[test]
    fn exhausted_budget_reports_divergence() {
        let x: Vec<f64> = (0..50).map(|i| i as f64 * 0.04).collect();
        let y: Vec<f64> = x.iter().map(|&xi| 2.0 * (0.5 * xi).exp()).collect();
        let opts = FitOptions {
            max_iterations: 1,
            ..FitOptions::default()
        };
        assert!(matches!(
            fit_curve(&Exponential, &x, &y, &opts),
            Err(FlowError::FitDiverged { .. })
        ));
    }
}
