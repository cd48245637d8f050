//! Top-level application orchestration.
//!
//! `src/main.rs` stays tiny; this module is the "real main" that:
//! - loads `.env` and sets up logging
//! - parses CLI arguments
//! - runs the site batch, the synthetic generator or the viewer
//! - prints summaries

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Command, FitArgs, ShowArgs, SynthArgs};
use crate::data::{GroundTruth, SyntheticSpec};
use crate::domain::RunConfig;
use crate::error::AppError;
use crate::io::{ArchiveSource, StaticCatalog, read_params_json};

pub mod pipeline;

/// Entry point for the `flow-params` binary.
pub fn run() -> Result<(), AppError> {
    // `.env` may provide FLOW_PARAMS_ARCHIVE, so it must load before parsing.
    dotenvy::dotenv().ok();
    let cli = crate::cli::Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Synth(args) => handle_synth(args),
        Command::Show(args) => handle_show(args),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    // A subscriber may already be installed when embedded.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let config = run_config_from_args(&args)?;
    let source = ArchiveSource::new(&config.archive);
    let catalog = StaticCatalog::new().with(&config.magnet, config.part_type);

    let summary = pipeline::run_batch(&config, &source, &catalog)?;

    for outcome in &summary.outcomes {
        println!(
            "{}",
            crate::report::format_site_summary(
                &outcome.site,
                &config.magnet,
                &outcome.params,
                &outcome.imax,
                &outcome.chain,
                Some(&outcome.output),
            )
        );
    }
    for (site, err) in &summary.failures {
        println!("Site {site} skipped: {err}");
    }

    if summary.outcomes.is_empty() {
        let exit_code = summary.failures.first().map_or(3, |(_, err)| err.exit_code());
        return Err(AppError::new(exit_code, "No site produced a parameter file."));
    }
    Ok(())
}

fn handle_synth(args: SynthArgs) -> Result<(), AppError> {
    let spec = SyntheticSpec {
        truth: GroundTruth::default(),
        ramp_points: args.points,
        plateau_points: args.plateau,
        noise_rel: args.noise,
        seed: args.seed,
        ..SyntheticSpec::default()
    };
    let start = chrono::Local::now().naive_local();
    let written = pipeline::write_synthetic_site(&args.out, args.part_type, args.housing, &spec, args.files, start)?;
    for path in &written {
        println!("{}", path.display());
    }
    Ok(())
}

fn handle_show(args: ShowArgs) -> Result<(), AppError> {
    let params = read_params_json(&args.file)?;
    println!("{}", args.file.display());
    print!("{}", crate::report::format_params(&params));
    Ok(())
}

/// Validate CLI flags into a `RunConfig`.
pub fn run_config_from_args(args: &FitArgs) -> Result<RunConfig, AppError> {
    if args.max_records == 0 {
        return Err(AppError::new(2, "--max-records must be at least 1."));
    }
    if !(args.imax.is_finite() && args.imax > 0.0) {
        return Err(AppError::new(2, format!("--imax must be a positive current, got {}.", args.imax)));
    }
    if args.magnet.trim().is_empty() {
        return Err(AppError::new(2, "--magnet must not be empty."));
    }

    Ok(RunConfig {
        archive: args.archive.clone(),
        magnet: args.magnet.clone(),
        part_type: args.part_type,
        sites: args.sites.clone(),
        out_dir: args.out_dir.clone(),
        max_records: args.max_records,
        plot_dir: args.plots.clone(),
        nominal_imax: args.imax,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PartType;
    use std::path::PathBuf;

    fn args() -> FitArgs {
        FitArgs {
            archive: PathBuf::from("/data"),
            magnet: "M19061901".to_string(),
            part_type: PartType::Supra,
            sites: vec!["s1".to_string()],
            out_dir: PathBuf::from("out"),
            max_records: 41,
            plots: Some(PathBuf::from("plots")),
            imax: 31_000.0,
        }
    }

    #[test]
    fn run_config_mirrors_flags() {
        let cfg = run_config_from_args(&args()).unwrap();
        assert_eq!(cfg.nominal_imax, 31_000.0);
        assert_eq!(cfg.part_type, PartType::Supra);
        assert_eq!(cfg.plot_dir, Some(PathBuf::from("plots")));
        assert_eq!(cfg.sites, vec!["s1"]);
    }

    #[test]
    fn invalid_flags_exit_with_usage_code() {
        let mut a = args();
        a.imax = -1.0;
        assert_eq!(run_config_from_args(&a).unwrap_err().exit_code(), 2);

        let mut a = args();
        a.max_records = 0;
        assert_eq!(run_config_from_args(&a).unwrap_err().exit_code(), 2);
    }
}
