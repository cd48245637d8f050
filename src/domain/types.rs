//! Shared domain types.
//!
//! These types are intentionally small and, where they leave the process,
//! serializable:
//!
//! - housing / channel vocabulary used to locate columns in a record
//! - the persisted `FlowParameterSet`
//! - fit outputs (`FitResult`, `PlateauCandidate`)
//! - the run configuration derived from CLI flags

use std::fmt;
use std::path::PathBuf;

use clap::ValueEnum;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::FlowError;

/// Physical part type of the magnet, as reported by the magnet catalog.
///
/// Only the bitter/non-bitter distinction matters: it swaps the housing
/// channel table and flips the current-column selection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PartType {
    Bitter,
    Helix,
    Supra,
}

impl PartType {
    pub fn is_bitter(self) -> bool {
        matches!(self, PartType::Bitter)
    }
}

/// Housing (physical unit instance) a record was acquired on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
pub enum HousingId {
    #[value(name = "M9")]
    M9,
    #[value(name = "M10")]
    M10,
}

impl HousingId {
    pub fn as_str(self) -> &'static str {
        match self {
            HousingId::M9 => "M9",
            HousingId::M10 => "M10",
        }
    }

    /// Derive the housing from a record file name (`M9_2019.02.14---23:00:38.txt`).
    pub fn from_file_name(name: &str) -> Result<Self, FlowError> {
        let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
        match base.split('_').next() {
            Some("M9") => Ok(HousingId::M9),
            Some("M10") => Ok(HousingId::M10),
            _ => Err(FlowError::UnknownHousing(name.to_string())),
        }
    }
}

impl fmt::Display for HousingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical measurement channels of the cooling circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Rpm,
    Flow,
    Pin,
    Pout,
}

/// Column carrying the magnetic field strength.
pub const FIELD_COLUMN: &str = "Field";

/// Physical column names for each logical channel of one housing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HousingMapping {
    pub housing: HousingId,
    pub rpm: &'static str,
    pub flow: &'static str,
    pub pin: &'static str,
    pub pout: &'static str,
}

const PUMP_1: (&str, &str, &str) = ("Rpm1", "Flow1", "HP1");
const PUMP_2: (&str, &str, &str) = ("Rpm2", "Flow2", "HP2");
const OUTLET: &str = "BP";

impl HousingMapping {
    /// Look up the channel table for a housing.
    ///
    /// Bitter magnets are cooled by the opposite pump loop, so the two
    /// housings swap their pump columns. The outlet pressure is shared.
    pub fn for_housing(part: PartType, housing: HousingId) -> Self {
        let (rpm, flow, pin) = match (part.is_bitter(), housing) {
            (false, HousingId::M9) | (true, HousingId::M10) => PUMP_1,
            (false, HousingId::M10) | (true, HousingId::M9) => PUMP_2,
        };
        Self {
            housing,
            rpm,
            flow,
            pin,
            pout: OUTLET,
        }
    }

    pub fn column(&self, channel: Channel) -> &'static str {
        match channel {
            Channel::Rpm => self.rpm,
            Channel::Flow => self.flow,
            Channel::Pin => self.pin,
            Channel::Pout => self.pout,
        }
    }
}

/// Unit attached to a persisted parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unit {
    #[serde(rename = "rpm")]
    Rpm,
    #[serde(rename = "l/s")]
    LitersPerSecond,
    #[serde(rename = "bar")]
    Bar,
    #[serde(rename = "A")]
    Ampere,
}

impl Unit {
    pub fn symbol(self) -> &'static str {
        match self {
            Unit::Rpm => "rpm",
            Unit::LitersPerSecond => "l/s",
            Unit::Bar => "bar",
            Unit::Ampere => "A",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FlowParam {
    pub value: f64,
    pub unit: Unit,
}

impl FlowParam {
    pub const fn new(value: f64, unit: Unit) -> Self {
        Self { value, unit }
    }
}

/// Cooling-circuit parameter set for one site–magnet pair.
///
/// Starts from nominal defaults and is refined in place by each fit stage.
/// The JSON form is `{ "Vp0": {"value": .., "unit": "rpm"}, ... }` with
/// exactly these eight keys.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FlowParameterSet {
    #[serde(rename = "Vp0")]
    pub vp0: FlowParam,
    #[serde(rename = "Vpmax")]
    pub vpmax: FlowParam,
    #[serde(rename = "F0")]
    pub f0: FlowParam,
    #[serde(rename = "Fmax")]
    pub fmax: FlowParam,
    #[serde(rename = "Pmax")]
    pub pmax: FlowParam,
    #[serde(rename = "Pmin")]
    pub pmin: FlowParam,
    #[serde(rename = "Pout")]
    pub pout: FlowParam,
    #[serde(rename = "Imax")]
    pub imax: FlowParam,
}

/// Nominal maximum current (A). A safety ceiling, corrected from data.
pub const NOMINAL_IMAX: f64 = 28_000.0;

impl Default for FlowParameterSet {
    fn default() -> Self {
        Self {
            vp0: FlowParam::new(1000.0, Unit::Rpm),
            vpmax: FlowParam::new(2840.0, Unit::Rpm),
            f0: FlowParam::new(0.0, Unit::LitersPerSecond),
            fmax: FlowParam::new(61.716_122_724_058_76, Unit::LitersPerSecond),
            pmax: FlowParam::new(22.0, Unit::Bar),
            pmin: FlowParam::new(4.0, Unit::Bar),
            pout: FlowParam::new(4.0, Unit::Bar),
            imax: FlowParam::new(NOMINAL_IMAX, Unit::Ampere),
        }
    }
}

impl FlowParameterSet {
    /// Defaults with a different nominal `Imax`.
    pub fn with_nominal_imax(imax: f64) -> Self {
        let mut params = Self::default();
        params.imax.value = imax;
        params
    }

    /// `(name, entry)` pairs in persisted order.
    pub fn entries(&self) -> [(&'static str, &FlowParam); 8] {
        [
            ("Vp0", &self.vp0),
            ("Vpmax", &self.vpmax),
            ("F0", &self.f0),
            ("Fmax", &self.fmax),
            ("Pmax", &self.pmax),
            ("Pmin", &self.pmin),
            ("Pout", &self.pout),
            ("Imax", &self.imax),
        ]
    }
}

/// Output of one nonlinear least-squares fit.
#[derive(Debug, Clone)]
pub struct FitResult {
    pub params: Vec<f64>,
    /// Parameter covariance (`p × p`), scaled by the residual variance.
    pub covariance: DMatrix<f64>,
    /// Residual sum of squares at the solution.
    pub sse: f64,
    pub iterations: usize,
}

impl FitResult {
    /// One-sigma parameter uncertainties.
    pub fn stderr(&self) -> Vec<f64> {
        (0..self.covariance.nrows())
            .map(|i| self.covariance[(i, i)].sqrt())
            .collect()
    }
}

/// Per-file corrected maximum current.
#[derive(Debug, Clone, PartialEq)]
pub struct PlateauCandidate {
    pub file: String,
    /// Minimum current inside the plateau selection.
    pub current: f64,
    /// Sample standard deviation of current inside the selection.
    pub spread: f64,
    pub n_samples: usize,
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub archive: PathBuf,
    pub magnet: String,
    pub part_type: PartType,
    /// Sites to process; empty means every site found in the archive.
    pub sites: Vec<String>,
    pub out_dir: PathBuf,
    pub max_records: usize,
    pub plot_dir: Option<PathBuf>,
    pub nominal_imax: f64,
}
