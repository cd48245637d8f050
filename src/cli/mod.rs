//! Command-line parsing for the cooling-loop parameter fitter.
//!
//! Parsing and dispatch stay separate from the fitting code: `app` turns these
//! structs into a `RunConfig`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::{HousingId, NOMINAL_IMAX, PartType};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "flow-params", version, about = "Magnet cooling-loop flow parameter fitter")]
pub struct Cli {
    /// Log at debug level (overridden by `RUST_LOG`).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit flow parameters for every site of a magnet and write one JSON per site.
    Fit(FitArgs),
    /// Generate synthetic measurement files for a site.
    Synth(SynthArgs),
    /// Print a saved parameter file.
    Show(ShowArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct FitArgs {
    /// Archive root holding `<site>/*.txt` record files.
    #[arg(long, env = "FLOW_PARAMS_ARCHIVE")]
    pub archive: PathBuf,

    /// Magnet name (used in output file names).
    #[arg(short, long)]
    pub magnet: String,

    /// Magnet part type; decides which `Icoil` column and housing table apply.
    #[arg(short = 't', long, value_enum)]
    pub part_type: PartType,

    /// Site to process (repeatable). Defaults to every site in the archive.
    #[arg(short, long = "site")]
    pub sites: Vec<String>,

    /// Directory for the parameter JSON files.
    #[arg(short, long, default_value = ".")]
    pub out_dir: PathBuf,

    /// Maximum number of record files read per site.
    #[arg(long, default_value_t = 41)]
    pub max_records: usize,

    /// Write one SVG per fit stage into this directory.
    #[arg(long)]
    pub plots: Option<PathBuf>,

    /// Nominal maximum current (A) used until a plateau estimate replaces it.
    #[arg(long, default_value_t = NOMINAL_IMAX)]
    pub imax: f64,
}

#[derive(Debug, Parser, Clone)]
pub struct SynthArgs {
    /// Output directory (created if missing).
    #[arg(long)]
    pub out: PathBuf,

    /// Housing the files belong to (file name prefix and column layout).
    #[arg(long, value_enum, default_value_t = HousingId::M9)]
    pub housing: HousingId,

    /// Part type (bitter parts swap the housing columns).
    #[arg(short = 't', long, value_enum, default_value_t = PartType::Helix)]
    pub part_type: PartType,

    /// Number of files to generate.
    #[arg(long, default_value_t = 2)]
    pub files: usize,

    /// Ramp samples per file.
    #[arg(long, default_value_t = 3000)]
    pub points: usize,

    /// Plateau samples per file.
    #[arg(long, default_value_t = 400)]
    pub plateau: usize,

    /// Noise standard deviation relative to each channel's full scale.
    #[arg(long, default_value_t = 0.01)]
    pub noise: f64,

    /// Random seed (file `k` uses `seed + k`).
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

#[derive(Debug, Parser, Clone)]
pub struct ShowArgs {
    /// Parameter JSON written by `fit`.
    pub file: PathBuf,
}
