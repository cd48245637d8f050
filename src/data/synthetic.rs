//! Synthetic measurement records generated from known cooling-circuit parameters.
//!
//! Each record is a current ramp from 0 to `Imax` followed by a plateau where
//! the current wanders uniformly around `Imax`. Pump speed follows the
//! `vpump` law (saturating above `Imax`) and is kept noise-free so the plateau
//! detector sees a clean speed ceiling; flow and pressures get Gaussian noise
//! proportional to their full-scale value.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::data::record::Record;
use crate::domain::{FIELD_COLUMN, HousingMapping};
use crate::error::FlowError;

/// Ground-truth cooling-circuit parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundTruth {
    pub vp0: f64,
    pub vpmax: f64,
    pub f0: f64,
    pub fmax: f64,
    pub pmin: f64,
    pub pmax: f64,
    pub pout: f64,
    pub imax: f64,
}

impl Default for GroundTruth {
    fn default() -> Self {
        Self {
            vp0: 1000.0,
            vpmax: 2840.0,
            f0: 5.0,
            fmax: 60.0,
            pmin: 4.0,
            pmax: 22.0,
            pout: 4.0,
            imax: 28_000.0,
        }
    }
}

impl GroundTruth {
    /// Pump speed at current `i`; the pump holds full speed above `imax`.
    pub fn rpm(&self, i: f64) -> f64 {
        let u = (i / self.imax).min(1.0);
        self.vpmax * u.powi(2) + self.vp0
    }

    fn speed_ratio(&self, i: f64) -> f64 {
        self.rpm(i) / (self.vpmax + self.vp0)
    }

    pub fn flow(&self, i: f64) -> f64 {
        self.f0 + self.fmax * self.speed_ratio(i)
    }

    pub fn pressure(&self, i: f64) -> f64 {
        self.pmin + self.pmax * self.speed_ratio(i).powi(2)
    }
}

/// Shape and noise settings for one generated record.
#[derive(Debug, Clone)]
pub struct SyntheticSpec {
    pub truth: GroundTruth,
    /// Current columns to emit (all carry the same current).
    pub current_keys: Vec<String>,
    pub ramp_points: usize,
    pub plateau_points: usize,
    /// Half-width (A) of the uniform current band around `Imax` on the plateau.
    pub plateau_halfwidth: f64,
    /// Noise standard deviation relative to each channel's full scale.
    pub noise_rel: f64,
    /// Field strength (T) reached at `Imax`.
    pub field_max: f64,
    pub seed: u64,
}

impl Default for SyntheticSpec {
    fn default() -> Self {
        Self {
            truth: GroundTruth::default(),
            current_keys: vec!["Icoil1".to_string(), "Icoil15".to_string()],
            ramp_points: 3000,
            plateau_points: 400,
            plateau_halfwidth: 60.0,
            noise_rel: 0.01,
            field_max: 31.0,
            seed: 42,
        }
    }
}

/// Generate one record with columns named after `mapping`.
pub fn generate_record(name: &str, mapping: &HousingMapping, spec: &SyntheticSpec) -> Result<Record, FlowError> {
    let truth = &spec.truth;
    if !(truth.imax.is_finite() && truth.imax > 0.0) {
        return Err(FlowError::InvalidInput("ground-truth Imax must be > 0".to_string()));
    }
    if spec.ramp_points < 2 {
        return Err(FlowError::InvalidInput("ramp needs at least 2 points".to_string()));
    }
    if spec.current_keys.is_empty() {
        return Err(FlowError::InvalidInput("at least one current column is required".to_string()));
    }
    if !(spec.noise_rel.is_finite() && spec.noise_rel >= 0.0) {
        return Err(FlowError::InvalidInput("noise_rel must be finite and >= 0".to_string()));
    }

    let mut rng = StdRng::seed_from_u64(spec.seed);
    let noise = |scale: f64| {
        Normal::new(0.0, spec.noise_rel * scale.abs())
            .map_err(|e| FlowError::InvalidInput(format!("noise distribution: {e}")))
    };
    let flow_noise = noise(truth.f0 + truth.fmax)?;
    let pin_noise = noise(truth.pmin + truth.pmax)?;
    let pout_noise = noise(truth.pout)?;

    let n = spec.ramp_points + spec.plateau_points;
    let step = truth.imax / (spec.ramp_points as f64 - 1.0);
    let halfwidth = spec.plateau_halfwidth.abs();

    let mut time = Vec::with_capacity(n);
    let mut current = Vec::with_capacity(n);
    for k in 0..n {
        time.push(k as f64);
        let i = if k < spec.ramp_points {
            step * k as f64
        } else if halfwidth > 0.0 {
            truth.imax + rng.gen_range(-halfwidth..=halfwidth)
        } else {
            truth.imax
        };
        current.push(i);
    }

    let mut rpm = Vec::with_capacity(n);
    let mut flow = Vec::with_capacity(n);
    let mut pin = Vec::with_capacity(n);
    let mut pout = Vec::with_capacity(n);
    let mut field = Vec::with_capacity(n);
    for &i in &current {
        rpm.push(truth.rpm(i));
        flow.push(truth.flow(i) + flow_noise.sample(&mut rng));
        pin.push(truth.pressure(i) + pin_noise.sample(&mut rng));
        pout.push(truth.pout + pout_noise.sample(&mut rng));
        field.push(spec.field_max * i / truth.imax);
    }

    let mut columns = vec![("t".to_string(), time)];
    for key in &spec.current_keys {
        columns.push((key.clone(), current.clone()));
    }
    columns.push((FIELD_COLUMN.to_string(), field));
    columns.push((mapping.rpm.to_string(), rpm));
    columns.push((mapping.flow.to_string(), flow));
    columns.push((mapping.pin.to_string(), pin));
    columns.push((mapping.pout.to_string(), pout));

    Record::from_columns(name, columns)
}
