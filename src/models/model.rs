//! Cooling-circuit model functions.
//!
//! The fitter relies on two primitive operations per model:
//! - evaluate `y(x)` for a parameter vector
//! - fill the partial derivatives `∂y/∂p` (for the Jacobian)
//!
//! Dependent stages do not capture earlier results implicitly: the flow and
//! pressure models are constructed from an explicit `PumpCurve` holding the
//! values fitted by the pump-speed stage.

use crate::error::FlowError;
use crate::math::forward_gradient;

/// A model `y = f(x; p)` with a fixed number of parameters.
pub trait CurveModel {
    /// Short label for logs and plots.
    fn name(&self) -> &'static str;

    fn param_count(&self) -> usize;

    fn eval(&self, x: f64, params: &[f64]) -> f64;

    /// Fill `out` with `∂f/∂p_j` at `x`.
    ///
    /// The default uses forward differences; models that are cheap to
    /// differentiate override it.
    fn partials(&self, x: f64, params: &[f64], out: &mut [f64]) {
        let f0 = self.eval(x, params);
        forward_gradient(|p| self.eval(x, p), params, f0, out);
    }

    /// Starting point when the caller does not supply one.
    fn initial_guess(&self) -> Vec<f64> {
        vec![1.0; self.param_count()]
    }
}

/// Smallest accepted `|Vpmax + Vp0|` relative to the larger of the two terms.
const FULL_SCALE_REL_TOL: f64 = 1e-9;

/// Fitted pump-speed law `vpump(x) = Vpmax·(x/Imax)² + Vp0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PumpCurve {
    pub imax: f64,
    pub vpmax: f64,
    pub vp0: f64,
}

impl PumpCurve {
    pub fn new(imax: f64, vpmax: f64, vp0: f64) -> Result<Self, FlowError> {
        if !(imax.is_finite() && imax > 0.0) {
            return Err(FlowError::InvalidInput(format!("Imax must be finite and > 0, got {imax}")));
        }
        let full_scale = vpmax + vp0;
        // Cancelling terms leave rounding noise, not a usable full scale.
        let floor = FULL_SCALE_REL_TOL * vpmax.abs().max(vp0.abs());
        if !full_scale.is_finite() || full_scale.abs() <= floor {
            return Err(FlowError::InvalidInput(format!(
                "pump full-scale speed Vpmax + Vp0 must be finite and non-zero, got {full_scale}"
            )));
        }
        Ok(Self { imax, vpmax, vp0 })
    }

    pub fn speed(&self, x: f64) -> f64 {
        self.vpmax * (x / self.imax).powi(2) + self.vp0
    }

    /// Pump speed relative to full scale; exactly `1.0` at `x = Imax`.
    pub fn ratio(&self, x: f64) -> f64 {
        self.speed(x) / (self.vpmax + self.vp0)
    }
}

/// Stage 1: `vpump(x) = a·(x/Imax)² + b` with `p = [a, b]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PumpSpeedModel {
    pub imax: f64,
}

impl PumpSpeedModel {
    pub fn new(imax: f64) -> Result<Self, FlowError> {
        if !(imax.is_finite() && imax > 0.0) {
            return Err(FlowError::InvalidInput(format!("Imax must be finite and > 0, got {imax}")));
        }
        Ok(Self { imax })
    }

    /// The pump curve described by fitted parameters `[a, b]`.
    pub fn curve(&self, params: &[f64]) -> Result<PumpCurve, FlowError> {
        PumpCurve::new(self.imax, params[0], params[1])
    }
}

impl CurveModel for PumpSpeedModel {
    fn name(&self) -> &'static str {
        "vpump"
    }

    fn param_count(&self) -> usize {
        2
    }

    fn eval(&self, x: f64, params: &[f64]) -> f64 {
        params[0] * (x / self.imax).powi(2) + params[1]
    }

    fn partials(&self, x: f64, _params: &[f64], out: &mut [f64]) {
        out[0] = (x / self.imax).powi(2);
        out[1] = 1.0;
    }
}

/// Stage 2: `flow(x) = F0 + Fmax·vpump(x)/(Vpmax + Vp0)` with `p = [F0, Fmax]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowModel {
    pub pump: PumpCurve,
}

impl FlowModel {
    pub fn new(pump: PumpCurve) -> Self {
        Self { pump }
    }
}

impl CurveModel for FlowModel {
    fn name(&self) -> &'static str {
        "flow"
    }

    fn param_count(&self) -> usize {
        2
    }

    fn eval(&self, x: f64, params: &[f64]) -> f64 {
        params[0] + params[1] * self.pump.ratio(x)
    }

    fn partials(&self, x: f64, _params: &[f64], out: &mut [f64]) {
        out[0] = 1.0;
        out[1] = self.pump.ratio(x);
    }
}

/// Stage 3: `pressure(x) = P0 + Pmax·(vpump(x)/(Vpmax + Vp0))²` with `p = [P0, Pmax]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PressureModel {
    pub pump: PumpCurve,
}

impl PressureModel {
    pub fn new(pump: PumpCurve) -> Self {
        Self { pump }
    }
}

impl CurveModel for PressureModel {
    fn name(&self) -> &'static str {
        "pressure"
    }

    fn param_count(&self) -> usize {
        2
    }

    fn eval(&self, x: f64, params: &[f64]) -> f64 {
        params[0] + params[1] * self.pump.ratio(x).powi(2)
    }

    fn partials(&self, x: f64, _params: &[f64], out: &mut [f64]) {
        out[0] = 1.0;
        out[1] = self.pump.ratio(x).powi(2);
    }
}
