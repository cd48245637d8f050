//! The chained cooling-circuit fits.
//!
//! Stages run in dependency order against the same file set, each re-cleaning
//! the data with the current `Imax` as threshold:
//!
//! 1. pump speed  → `Vpmax`, `Vp0`
//! 2. flow        → `F0`, `Fmax`   (uses the stage 1 pump curve)
//! 3. pressure    → `Pmin`, `Pmax` (uses the stage 1 pump curve)
//! 4. outlet pressure mean → `Pout`
//!
//! The first failing stage stops the chain; parameters of unreached stages
//! keep their previous values.

use crate::data::Record;
use crate::domain::{Channel, FitResult, FlowParameterSet, HousingMapping};
use crate::error::FlowError;
use crate::fit::clean::{CleanedSet, clean};
use crate::fit::fitter::{FitOptions, fit_curve};
use crate::models::{CurveModel, FlowModel, PressureModel, PumpCurve, PumpSpeedModel};
use crate::plot::{StagePlot, StagePlotter};
use crate::report::{ColumnStats, describe};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    PumpSpeed,
    Flow,
    Pressure,
    OutletPressure,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::PumpSpeed, Stage::Flow, Stage::Pressure, Stage::OutletPressure];

    pub fn channel(self) -> Channel {
        match self {
            Stage::PumpSpeed => Channel::Rpm,
            Stage::Flow => Channel::Flow,
            Stage::Pressure => Channel::Pin,
            Stage::OutletPressure => Channel::Pout,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Stage::PumpSpeed => "pump speed",
            Stage::Flow => "flow",
            Stage::Pressure => "inlet pressure",
            Stage::OutletPressure => "outlet pressure",
        }
    }
}

/// The file set and column layout shared by every stage.
#[derive(Debug, Clone, Copy)]
pub struct ChainInput<'a> {
    pub records: &'a [Record],
    pub current_key: &'a str,
    pub mapping: &'a HousingMapping,
}

/// Outcome of one completed stage.
#[derive(Debug, Clone)]
pub struct StageReport {
    pub stage: Stage,
    pub n_samples: usize,
    /// Fitted parameters (absent for the outlet-pressure statistic).
    pub fit: Option<FitResult>,
    /// Column statistics (outlet-pressure stage only).
    pub stats: Option<ColumnStats>,
}

#[derive(Debug, Default)]
pub struct ChainReport {
    pub completed: Vec<StageReport>,
    pub failure: Option<(Stage, FlowError)>,
}

impl ChainReport {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none() && self.completed.len() == Stage::ALL.len()
    }
}

/// Run all stages, updating `params` in place.
///
/// Errors never escape: the failing stage is recorded in the report.
pub fn run_chain(
    input: ChainInput<'_>,
    params: &mut FlowParameterSet,
    opts: &FitOptions,
    plotter: Option<&dyn StagePlotter>,
) -> ChainReport {
    let mut report = ChainReport::default();
    if let Err((stage, err)) = run_stages(input, params, opts, plotter, &mut report.completed) {
        tracing::warn!(stage = stage.display_name(), error = %err, "fit chain stopped");
        report.failure = Some((stage, err));
    }
    report
}

fn run_stages(
    input: ChainInput<'_>,
    params: &mut FlowParameterSet,
    opts: &FitOptions,
    plotter: Option<&dyn StagePlotter>,
    completed: &mut Vec<StageReport>,
) -> Result<(), (Stage, FlowError)> {
    let at = |stage: Stage| move |err: FlowError| (stage, err);

    // 1) Pump speed.
    let pump = {
        let stage = Stage::PumpSpeed;
        let model = PumpSpeedModel::new(params.imax.value).map_err(at(stage))?;
        let (data, fit) = fit_stage(input, stage, &model, params.imax.value, opts, plotter).map_err(at(stage))?;
        let pump = model.curve(&fit.params).map_err(at(stage))?;
        params.vpmax.value = pump.vpmax;
        params.vp0.value = pump.vp0;
        completed.push(StageReport {
            stage,
            n_samples: data.len(),
            fit: Some(fit),
            stats: None,
        });
        pump
    };

    // 2) Flow.
    {
        let stage = Stage::Flow;
        let model = FlowModel::new(pump);
        let (data, fit) = fit_stage(input, stage, &model, pump.imax, opts, plotter).map_err(at(stage))?;
        params.f0.value = fit.params[0];
        params.fmax.value = fit.params[1];
        completed.push(StageReport {
            stage,
            n_samples: data.len(),
            fit: Some(fit),
            stats: None,
        });
    }

    // 3) Inlet pressure.
    {
        let stage = Stage::Pressure;
        let model = PressureModel::new(pump);
        let (data, fit) = fit_stage(input, stage, &model, pump.imax, opts, plotter).map_err(at(stage))?;
        params.pmin.value = fit.params[0];
        params.pmax.value = fit.params[1];
        completed.push(StageReport {
            stage,
            n_samples: data.len(),
            fit: Some(fit),
            stats: None,
        });
    }

    // 4) Outlet pressure: averaged, not fitted.
    {
        let stage = Stage::OutletPressure;
        let column = input.mapping.column(stage.channel());
        let data = clean(
            input.records,
            &[input.current_key, column],
            input.current_key,
            params.imax.value,
        )
        .map_err(at(stage))?;
        let stats = data
            .column(column)
            .and_then(describe)
            .ok_or_else(|| FlowError::EmptyResult {
                context: format!("{column} statistics"),
            })
            .map_err(at(stage))?;
        tracing::info!(column, mean = stats.mean, std = stats.std, n = stats.count, "outlet pressure");
        params.pout.value = stats.mean;
        completed.push(StageReport {
            stage,
            n_samples: data.len(),
            fit: None,
            stats: Some(stats),
        });
    }

    Ok(())
}

/// Clean, fit and (optionally) plot one stage.
fn fit_stage<M: CurveModel>(
    input: ChainInput<'_>,
    stage: Stage,
    model: &M,
    threshold: f64,
    opts: &FitOptions,
    plotter: Option<&dyn StagePlotter>,
) -> Result<(CleanedSet, FitResult), FlowError> {
    let y_key = input.mapping.column(stage.channel());
    let data = clean(input.records, &[input.current_key, y_key], input.current_key, threshold)?;
    let x = data.column(input.current_key).unwrap_or_default();
    let y = data.column(y_key).unwrap_or_default();

    let fit = fit_curve(model, x, y, opts)?;

    tracing::info!(
        stage = stage.display_name(),
        model = model.name(),
        n = x.len(),
        params = ?fit.params,
        stderr = ?fit.stderr(),
        iterations = fit.iterations,
        "fit converged"
    );
    tracing::debug!(stage = stage.display_name(), covariance = %fit.covariance, "fit covariance");

    if let Some(plotter) = plotter {
        let plot = StagePlot::new(stage.display_name(), input.current_key, y_key, x, y, |xi| {
            model.eval(xi, &fit.params)
        });
        match plotter.plot_stage(&plot) {
            Ok(path) => tracing::debug!(path = %path.display(), "stage plot written"),
            Err(err) => tracing::warn!(stage = stage.display_name(), error = %err, "stage plot failed"),
        }
    }

    Ok((data, fit))
}

/// Pump curve implied by a parameter set (for reporting and evaluation).
pub fn pump_curve(params: &FlowParameterSet) -> Result<PumpCurve, FlowError> {
    PumpCurve::new(params.imax.value, params.vpmax.value, params.vp0.value)
}
