//! Formatted terminal output.
//!
//! Everything printed to stdout goes through here so the fitting code never
//! formats strings for humans.

use std::path::Path;

use chrono::Local;

use crate::domain::FlowParameterSet;
use crate::fit::{ChainReport, ImaxEstimate};

/// Parameter table: name, value, unit.
pub fn format_params(params: &FlowParameterSet) -> String {
    let mut out = String::new();
    out.push_str(&format!("{:<6} {:>14} {:<5}", "name", "value", "unit"));
    out.push('\n');
    out.push_str(&format!("{:-<6} {:-<14} {:-<5}", "", "", ""));
    out.push('\n');
    for (name, param) in params.entries() {
        out.push_str(format!("{:<6} {:>14.4} {:<5}", name, param.value, param.unit.symbol()).trim_end());
        out.push('\n');
    }
    out
}

/// Summary of one processed site.
pub fn format_site_summary(
    site: &str,
    magnet: &str,
    params: &FlowParameterSet,
    imax: &ImaxEstimate,
    chain: &ChainReport,
    output: Option<&Path>,
) -> String {
    let mut out = String::new();

    out.push_str(&format!("=== flow-params - {site} / {magnet} ===\n"));
    out.push_str(&format!("Generated: {}\n", Local::now().format("%Y-%m-%d %H:%M:%S")));

    match imax.imax() {
        Some(value) => out.push_str(&format!(
            "Imax: {value:.1} A (from {} plateau(s), {} file(s) rejected)\n",
            imax.candidates.len(),
            imax.rejected.len()
        )),
        None => out.push_str("Imax: no plateau detected, nominal value kept\n"),
    }

    out.push_str("\nStages:\n");
    for stage in &chain.completed {
        let detail = match (&stage.fit, &stage.stats) {
            (Some(fit), _) => format!("params={} stderr={}", fmt_vec(&fit.params), fmt_vec(&fit.stderr())),
            (None, Some(stats)) => format!("mean={:.4} std={:.4}", stats.mean, stats.std),
            (None, None) => String::new(),
        };
        out.push_str(format!("  {:<16} n={:<7} {detail}", stage.stage.display_name(), stage.n_samples).trim_end());
        out.push('\n');
    }
    if let Some((stage, err)) = &chain.failure {
        out.push_str(&format!("  {:<16} FAILED: {err}\n", stage.display_name()));
    }

    out.push('\n');
    out.push_str(&format_params(params));

    if let Some(path) = output {
        out.push_str(&format!("\nWrote {}\n", path.display()));
    }
    out
}

fn fmt_vec(v: &[f64]) -> String {
    let parts: Vec<String> = v.iter().map(|x| format!("{x:.6}")).collect();
    format!("[{}]", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FlowError;
    use crate::fit::Stage;

    #[test]
    fn params_table_lists_every_entry_with_units() {
        let table = format_params(&FlowParameterSet::default());
        for name in ["Vp0", "Vpmax", "F0", "Fmax", "Pmax", "Pmin", "Pout", "Imax"] {
            assert!(table.lines().any(|l| l.starts_with(name)), "{name}");
        }
        assert!(table.contains("28000.0000 A"));
        assert!(table.contains("l/s"));
    }

    #[test]
    fn summary_reports_failed_stage_and_missing_plateau() {
        let chain = ChainReport {
            completed: Vec::new(),
            failure: Some((
                Stage::PumpSpeed,
                FlowError::EmptyResult {
                    context: "Icoil1 <= 28000".to_string(),
                },
            )),
        };
        let text = format_site_summary(
            "M9_site",
            "M19061901",
            &FlowParameterSet::default(),
            &ImaxEstimate::default(),
            &chain,
            None,
        );
        assert!(text.contains("no plateau detected"));
        assert!(text.contains("pump speed"));
        assert!(text.contains("FAILED"));
        assert!(!text.contains("Wrote"));
    }
}
