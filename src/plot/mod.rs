//! Per-stage fit plots.
//!
//! The chain hands each fitted stage to a `StagePlotter`. The shipped
//! implementation writes one SVG per stage (observed points plus the fitted
//! curve). Plot failures are reported to the caller, which only logs them.

use std::path::{Path, PathBuf};

use plotters::prelude::*;

use crate::error::FlowError;

/// Points to plot for one stage; the curve is pre-sampled.
#[derive(Debug, Clone)]
pub struct StagePlot {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub points: Vec<(f64, f64)>,
    pub curve: Vec<(f64, f64)>,
}

const CURVE_SAMPLES: usize = 200;

impl StagePlot {
    /// Pair up `x`/`y` and sample `model` over the observed x range.
    pub fn new(
        title: &str,
        x_label: &str,
        y_label: &str,
        x: &[f64],
        y: &[f64],
        model: impl Fn(f64) -> f64,
    ) -> Self {
        let points: Vec<(f64, f64)> = x.iter().copied().zip(y.iter().copied()).collect();
        let (x0, x1) = bounds(x.iter().copied()).unwrap_or((0.0, 1.0));
        let curve = (0..CURVE_SAMPLES)
            .map(|k| {
                let xi = x0 + (x1 - x0) * k as f64 / (CURVE_SAMPLES - 1) as f64;
                (xi, model(xi))
            })
            .collect();
        Self {
            title: title.to_string(),
            x_label: x_label.to_string(),
            y_label: y_label.to_string(),
            points,
            curve,
        }
    }

    fn x_range(&self) -> Option<(f64, f64)> {
        bounds(self.points.iter().chain(&self.curve).map(|p| p.0))
    }

    fn y_range(&self) -> Option<(f64, f64)> {
        let (lo, hi) = bounds(self.points.iter().chain(&self.curve).map(|p| p.1))?;
        let pad = ((hi - lo) * 0.05).max(1e-9);
        Some((lo - pad, hi + pad))
    }
}

fn bounds(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !(lo.is_finite() && hi.is_finite()) {
        return None;
    }
    if hi > lo { Some((lo, hi)) } else { Some((lo - 0.5, hi + 0.5)) }
}

/// Renders a stage plot somewhere; returns the artifact path.
pub trait StagePlotter {
    fn plot_stage(&self, plot: &StagePlot) -> Result<PathBuf, FlowError>;
}

/// Writes `<out_dir>/<prefix>-<stage>.svg`.
#[derive(Debug, Clone)]
pub struct SvgPlotter {
    out_dir: PathBuf,
    prefix: String,
    size: (u32, u32),
}

impl SvgPlotter {
    pub fn new(out_dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            out_dir: out_dir.into(),
            prefix: prefix.into(),
            size: (960, 640),
        }
    }

    pub fn path_for(&self, plot: &StagePlot) -> PathBuf {
        let stage = plot.title.replace(' ', "_");
        self.out_dir.join(format!("{}-{stage}.svg", self.prefix))
    }
}

impl StagePlotter for SvgPlotter {
    fn plot_stage(&self, plot: &StagePlot) -> Result<PathBuf, FlowError> {
        let (Some(xr), Some(yr)) = (plot.x_range(), plot.y_range()) else {
            return Err(FlowError::Plot(format!("{}: no finite data", plot.title)));
        };
        std::fs::create_dir_all(&self.out_dir).map_err(|e| FlowError::io(&self.out_dir, e))?;
        let path = self.path_for(plot);
        draw_svg(&path, self.size, plot, xr, yr).map_err(|e| FlowError::Plot(format!("{}: {e}", path.display())))?;
        Ok(path)
    }
}

fn draw_svg(
    path: &Path,
    size: (u32, u32),
    plot: &StagePlot,
    (x0, x1): (f64, f64),
    (y0, y1): (f64, f64),
) -> Result<(), Box<dyn std::error::Error>> {
    let root = SVGBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(&plot.title, ("sans-serif", 20))
        .margin(10)
        .set_label_area_size(LabelAreaPosition::Left, 60)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .build_cartesian_2d(x0..x1, y0..y1)?;

    chart
        .configure_mesh()
        .x_desc(plot.x_label.as_str())
        .y_desc(plot.y_label.as_str())
        .draw()?;

    let points_color = RGBColor(120, 120, 120);
    chart.draw_series(
        plot.points
            .iter()
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .map(|&(x, y)| Circle::new((x, y), 1, points_color.filled())),
    )?;
    chart.draw_series(LineSeries::new(plot.curve.iter().copied(), RED.stroke_width(2)))?;

    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn curve_spans_the_observed_range() {
        let x = [10.0, 0.0, 5.0];
        let y = [20.0, 0.0, 10.0];
        let plot = StagePlot::new("flow", "Icoil1", "Flow1", &x, &y, |v| 2.0 * v);
        assert_eq!(plot.points.len(), 3);
        assert_eq!(plot.curve.len(), CURVE_SAMPLES);
        assert_eq!(plot.curve[0], (0.0, 0.0));
        assert_eq!(plot.curve[CURVE_SAMPLES - 1], (10.0, 20.0));
    }

    #[test]
    fn svg_is_written_per_stage() {
        let dir = tempfile::tempdir().unwrap();
        let plotter = SvgPlotter::new(dir.path().join("plots"), "M9_site");
        let plot = StagePlot::new("pump speed", "Icoil1", "Rpm1", &[0.0, 1.0, 2.0], &[1.0, 2.0, 5.0], |v| v * v + 1.0);

        let path = plotter.plot_stage(&plot).unwrap();
        assert_eq!(path, dir.path().join("plots").join("M9_site-pump_speed.svg"));
        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.contains("<svg"));
    }

    #[test]
    fn plot_without_finite_values_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let plotter = SvgPlotter::new(dir.path(), "x");
        let nan = StagePlot::new("flow", "I", "F", &[f64::NAN], &[f64::NAN], |_| f64::NAN);
        assert!(matches!(plotter.plot_stage(&nan), Err(FlowError::Plot(_))));
    }
}
