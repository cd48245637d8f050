//! Site processing and the batch loop.
//!
//! One site goes through:
//! stage files -> read -> housing + current column -> filter -> Imax -> chain -> JSON
//!
//! Site errors are returned to the batch loop, which logs them and moves on;
//! nothing a single site does can stop the others.

use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDateTime};

use crate::data::{Record, SyntheticSpec, generate_record};
use crate::domain::{FlowParameterSet, HousingId, HousingMapping, PartType, RunConfig};
use crate::error::FlowError;
use crate::fit::{
    ChainInput, ChainReport, FitOptions, ImaxEstimate, ImaxOptions, estimate_imax, resolve_current_key,
    retain_with_column, run_chain,
};
use crate::io::{MagnetCatalog, RecordSource, TempWorkspace, params_path, read_record, write_params_json, write_record};
use crate::plot::{StagePlotter, SvgPlotter};

/// Everything computed for one site.
#[derive(Debug)]
pub struct SiteOutcome {
    pub site: String,
    pub housing: HousingId,
    pub current_key: String,
    pub params: FlowParameterSet,
    pub imax: ImaxEstimate,
    pub chain: ChainReport,
    /// Files that could not be used (unreadable, or missing the current column).
    pub dropped: Vec<FlowError>,
    pub output: PathBuf,
}

#[derive(Debug, Default)]
pub struct BatchSummary {
    pub outcomes: Vec<SiteOutcome>,
    pub failures: Vec<(String, FlowError)>,
}

/// Process every configured site (or every site the source knows).
///
/// Only failures before the first site (part type lookup, site listing) are
/// returned as errors.
pub fn run_batch(
    config: &RunConfig,
    source: &dyn RecordSource,
    catalog: &dyn MagnetCatalog,
) -> Result<BatchSummary, FlowError> {
    let part = catalog.part_type(&config.magnet)?;
    let sites = if config.sites.is_empty() {
        source.sites()?
    } else {
        config.sites.clone()
    };
    tracing::info!(magnet = %config.magnet, ?part, sites = sites.len(), "starting batch");

    let mut summary = BatchSummary::default();
    for site in sites {
        match process_site(&site, part, config, source) {
            Ok(outcome) => summary.outcomes.push(outcome),
            Err(err) => {
                tracing::warn!(site = %site, error = %err, "site skipped");
                summary.failures.push((site, err));
            }
        }
    }
    Ok(summary)
}

/// Run the full pipeline for one site and write its parameter file.
///
/// A chain that stops early still writes the parameters it reached.
pub fn process_site(
    site: &str,
    part: PartType,
    config: &RunConfig,
    source: &dyn RecordSource,
) -> Result<SiteOutcome, FlowError> {
    let workspace = TempWorkspace::new(site)?;
    let staged = source.fetch_site(site, &workspace, config.max_records)?;

    let mut dropped = staged.skipped;
    let records = read_all(&staged.files, &mut dropped);
    let reference = records.first().ok_or_else(|| FlowError::EmptyResult {
        context: format!("no readable record files for site {site}"),
    })?;
    tracing::info!(site, files = staged.files.len(), readable = records.len(), "records loaded");

    let housing = HousingId::from_file_name(reference.name())?;
    let mapping = HousingMapping::for_housing(part, housing);
    let current_key = resolve_current_key(reference, part)?;
    tracing::info!(site, %housing, current_key = %current_key, "columns resolved");

    let (records, missing) = retain_with_column(records, &current_key);
    dropped.extend(missing);

    let mut params = FlowParameterSet::with_nominal_imax(config.nominal_imax);
    let imax = estimate_imax(&records, &current_key, mapping.rpm, &ImaxOptions::default());
    match imax.imax() {
        Some(value) if value != params.imax.value => {
            tracing::info!(site, nominal = params.imax.value, detected = value, "Imax updated from plateaus");
            params.imax.value = value;
        }
        Some(_) => {}
        None => tracing::info!(site, nominal = params.imax.value, "no plateau detected; nominal Imax kept"),
    }

    let plotter = config
        .plot_dir
        .as_ref()
        .map(|dir| SvgPlotter::new(dir, format!("{site}_{}", config.magnet)));
    let input = ChainInput {
        records: &records,
        current_key: &current_key,
        mapping: &mapping,
    };
    let chain = run_chain(
        input,
        &mut params,
        &FitOptions::default(),
        plotter.as_ref().map(|p| p as &dyn StagePlotter),
    );

    std::fs::create_dir_all(&config.out_dir).map_err(|e| FlowError::io(&config.out_dir, e))?;
    let output = params_path(&config.out_dir, site, &config.magnet);
    write_params_json(&output, &params)?;

    Ok(SiteOutcome {
        site: site.to_string(),
        housing,
        current_key,
        params,
        imax,
        chain,
        dropped,
        output,
    })
}

fn read_all(files: &[PathBuf], dropped: &mut Vec<FlowError>) -> Vec<Record> {
    let mut records = Vec::with_capacity(files.len());
    for path in files {
        match read_record(path) {
            Ok(record) => records.push(record),
            Err(err) => {
                tracing::warn!(file = %path.display(), error = %err, "unreadable record file ignored");
                dropped.push(err);
            }
        }
    }
    records
}

/// Write `count` synthetic record files for one housing into `dir`.
///
/// Files are named like acquisition files (`<housing>_<timestamp>.txt`), one
/// minute apart from `start`; file `k` is seeded with `spec.seed + k`.
pub fn write_synthetic_site(
    dir: &Path,
    part: PartType,
    housing: HousingId,
    spec: &SyntheticSpec,
    count: usize,
    start: NaiveDateTime,
) -> Result<Vec<PathBuf>, FlowError> {
    std::fs::create_dir_all(dir).map_err(|e| FlowError::io(dir, e))?;
    let mapping = HousingMapping::for_housing(part, housing);

    let mut written = Vec::with_capacity(count);
    for k in 0..count {
        let stamp = start + Duration::minutes(k as i64);
        let name = format!("{housing}_{}.txt", stamp.format("%Y.%m.%d---%H:%M:%S"));
        let file_spec = SyntheticSpec {
            seed: spec.seed.wrapping_add(k as u64),
            ..spec.clone()
        };
        let record = generate_record(&name, &mapping, &file_spec)?;
        let path = dir.join(&name);
        write_record(&path, &record)?;
        tracing::debug!(path = %path.display(), rows = record.len(), "synthetic record written");
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::GroundTruth;
    use crate::io::{ArchiveSource, StaticCatalog, read_params_json};

    const MAGNET: &str = "M19061901";

    fn start() -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2019, 6, 20)
            .unwrap()
            .and_hms_opt(23, 7, 56)
            .unwrap()
    }

    fn config(archive: &Path, out_dir: &Path) -> RunConfig {
        RunConfig {
            archive: archive.to_path_buf(),
            magnet: MAGNET.to_string(),
            part_type: PartType::Helix,
            sites: Vec::new(),
            out_dir: out_dir.to_path_buf(),
            max_records: 41,
            plot_dir: None,
            nominal_imax: 28_000.0,
        }
    }

    fn within(actual: f64, expected: f64, rel: f64) -> bool {
        (actual - expected).abs() <= rel * expected.abs()
    }

    #[test]
    fn synthetic_site_recovers_ground_truth_within_five_percent() {
        let archive = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_synthetic_site(
            &archive.path().join("M9_Overview"),
            PartType::Helix,
            HousingId::M9,
            &SyntheticSpec::default(),
            2,
            start(),
        )
        .unwrap();

        let catalog = StaticCatalog::new().with(MAGNET, PartType::Helix);
        let summary = run_batch(
            &config(archive.path(), out.path()),
            &ArchiveSource::new(archive.path()),
            &catalog,
        )
        .unwrap();
        assert!(summary.failures.is_empty(), "{:?}", summary.failures);
        assert_eq!(summary.outcomes.len(), 1);

        let outcome = &summary.outcomes[0];
        assert!(outcome.chain.is_complete(), "{:?}", outcome.chain.failure);
        assert_eq!(outcome.housing, HousingId::M9);
        assert_eq!(outcome.current_key, "Icoil1");
        assert_eq!(outcome.imax.candidates.len(), 2);

        let truth = GroundTruth::default();
        let p = &outcome.params;
        for (name, actual, expected) in [
            ("Vp0", p.vp0.value, truth.vp0),
            ("Vpmax", p.vpmax.value, truth.vpmax),
            ("F0", p.f0.value, truth.f0),
            ("Fmax", p.fmax.value, truth.fmax),
            ("Pmin", p.pmin.value, truth.pmin),
            ("Pmax", p.pmax.value, truth.pmax),
            ("Pout", p.pout.value, truth.pout),
            ("Imax", p.imax.value, truth.imax),
        ] {
            assert!(within(actual, expected, 0.05), "{name}: {actual} vs {expected}");
        }
        // The detected operating point sits just below the speed ceiling.
        assert!(p.imax.value < truth.imax);

        let expected_path = out.path().join(format!("M9_Overview_{MAGNET}-flow_params.json"));
        assert_eq!(outcome.output, expected_path);
        assert_eq!(&read_params_json(&expected_path).unwrap(), p);
    }

    #[test]
    fn bitter_parts_read_the_swapped_housing_columns() {
        let archive = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let spec = SyntheticSpec {
            ramp_points: 600,
            plateau_points: 100,
            ..SyntheticSpec::default()
        };
        write_synthetic_site(
            &archive.path().join("site"),
            PartType::Bitter,
            HousingId::M10,
            &spec,
            2,
            start(),
        )
        .unwrap();

        let mut cfg = config(archive.path(), out.path());
        cfg.part_type = PartType::Bitter;
        let outcome = process_site("site", PartType::Bitter, &cfg, &ArchiveSource::new(archive.path())).unwrap();
        assert_eq!(outcome.current_key, "Icoil15");
        assert!(outcome.chain.is_complete(), "{:?}", outcome.chain.failure);
        assert!(within(outcome.params.fmax.value, 60.0, 0.05));
    }

    #[test]
    fn failing_site_does_not_stop_the_batch() {
        let archive = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let spec = SyntheticSpec {
            ramp_points: 600,
            plateau_points: 100,
            ..SyntheticSpec::default()
        };
        write_synthetic_site(&archive.path().join("a_good"), PartType::Helix, HousingId::M9, &spec, 1, start()).unwrap();

        let bad = archive.path().join("b_bad");
        std::fs::create_dir_all(&bad).unwrap();
        std::fs::write(bad.join("X1_unknown.txt"), "banner\nIcoil1 Rpm1\n1 2\n").unwrap();

        let catalog = StaticCatalog::new().with(MAGNET, PartType::Helix);
        let summary = run_batch(
            &config(archive.path(), out.path()),
            &ArchiveSource::new(archive.path()),
            &catalog,
        )
        .unwrap();

        assert_eq!(summary.outcomes.len(), 1);
        assert_eq!(summary.outcomes[0].site, "a_good");
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].0, "b_bad");
        assert!(matches!(summary.failures[0].1, FlowError::UnknownHousing(_)));
        assert!(!out.path().join(format!("b_bad_{MAGNET}-flow_params.json")).exists());
    }

    #[test]
    fn partial_chain_still_writes_parameters() {
        let archive = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let site = archive.path().join("site");
        std::fs::create_dir_all(&site).unwrap();
        // Pump speed only; flow and pressures are absent.
        let mut text = String::from("banner\nIcoil1 Field Rpm1\n");
        for k in 0..50 {
            let i = 28_000.0 * k as f64 / 49.0;
            text.push_str(&format!("{i} {} {}\n", i / 1000.0, 2840.0 * (i / 28_000.0).powi(2) + 1000.0));
        }
        std::fs::write(site.join("M9_a.txt"), text).unwrap();

        let cfg = config(archive.path(), out.path());
        let outcome = process_site("site", PartType::Helix, &cfg, &ArchiveSource::new(archive.path())).unwrap();
        assert_eq!(outcome.chain.completed.len(), 1);
        assert!(outcome.output.exists());
        let saved = read_params_json(&outcome.output).unwrap();
        assert!(within(saved.vpmax.value, 2840.0, 1e-6));
        assert_eq!(saved.fmax, FlowParameterSet::default().fmax);
    }

    #[test]
    fn rerunning_a_site_gives_identical_parameters() {
        let archive = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let spec = SyntheticSpec {
            ramp_points: 600,
            plateau_points: 100,
            ..SyntheticSpec::default()
        };
        write_synthetic_site(&archive.path().join("site"), PartType::Helix, HousingId::M9, &spec, 2, start()).unwrap();

        let cfg = config(archive.path(), out.path());
        let source = ArchiveSource::new(archive.path());
        let first = process_site("site", PartType::Helix, &cfg, &source).unwrap();
        let first_json = std::fs::read_to_string(&first.output).unwrap();
        let second = process_site("site", PartType::Helix, &cfg, &source).unwrap();
        let second_json = std::fs::read_to_string(&second.output).unwrap();

        assert!(first.chain.is_complete(), "{:?}", first.chain.failure);
        assert_eq!(first.params, second.params);
        assert_eq!(first.imax.imax(), second.imax.imax());
        assert_eq!(first.imax.candidates.len(), second.imax.candidates.len());
        assert_eq!(first.output, second.output);
        assert_eq!(first_json, second_json);
    }

    #[test]
    fn unreadable_files_are_dropped_not_fatal() {
        let archive = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let spec = SyntheticSpec {
            ramp_points: 600,
            plateau_points: 100,
            ..SyntheticSpec::default()
        };
        let site = archive.path().join("site");
        write_synthetic_site(&site, PartType::Helix, HousingId::M9, &spec, 1, start()).unwrap();
        std::fs::write(site.join("M9_zz_broken.txt"), "banner\na b\n1 2 3\n").unwrap();

        let cfg = config(archive.path(), out.path());
        let outcome = process_site("site", PartType::Helix, &cfg, &ArchiveSource::new(archive.path())).unwrap();
        assert_eq!(outcome.dropped.len(), 1);
        assert!(matches!(outcome.dropped[0], FlowError::Parse { .. }));
        assert!(outcome.chain.is_complete());
    }
}
