//! Forward-difference derivatives for models without analytic partials.

/// Relative step for forward differences (`√ε`).
const REL_STEP: f64 = 1.490_116_119_384_765_6e-8;

/// Fill `out[j] ≈ ∂f/∂p_j` at `params` using forward differences.
///
/// `f0` is `f(params)`, already evaluated by the caller.
pub fn forward_gradient<F>(f: F, params: &[f64], f0: f64, out: &mut [f64])
where
    F: Fn(&[f64]) -> f64,
{
    let mut p = params.to_vec();
    for j in 0..params.len() {
        let h = REL_STEP * params[j].abs().max(1.0);
        p[j] = params[j] + h;
        // Use the actually representable step to reduce rounding error.
        let h_eff = p[j] - params[j];
        out[j] = (f(&p) - f0) / h_eff;
        p[j] = params[j];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gradient_of_quadratic() {
        let f = |p: &[f64]| p[0] * p[0] + 3.0 * p[1];
        let params = [2.0, -1.0];
        let mut g = [0.0; 2];
        forward_gradient(f, &params, f(&params), &mut g);
        assert!((g[0] - 4.0).abs() < 1e-6);
        assert!((g[1] - 3.0).abs() < 1e-6);
    }
}
