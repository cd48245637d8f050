//! Read/write the flow-parameter JSON artifact.
//!
//! The file holds exactly the eight named parameters, each as
//! `{"value": <number>, "unit": <string>}`; the schema is
//! `domain::FlowParameterSet`.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::domain::FlowParameterSet;
use crate::error::FlowError;

/// Artifact path for a site: `<out_dir>/<site>_<magnet>-flow_params.json`.
pub fn params_path(out_dir: &Path, site: &str, magnet: &str) -> PathBuf {
    out_dir.join(format!("{site}_{magnet}-flow_params.json"))
}

/// Write `params` as pretty-printed JSON, in a single pass.
pub fn write_params_json(path: &Path, params: &FlowParameterSet) -> Result<(), FlowError> {
    let file = File::create(path).map_err(|e| FlowError::io(path, e))?;
    let mut w = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut w, params)?;
    w.write_all(b"\n").map_err(|e| FlowError::io(path, e))?;
    w.flush().map_err(|e| FlowError::io(path, e))?;
    tracing::info!(path = %path.display(), "flow parameters written");
    Ok(())
}

pub fn read_params_json(path: &Path) -> Result<FlowParameterSet, FlowError> {
    let file = File::open(path).map_err(|e| FlowError::io(path, e))?;
    let params = serde_json::from_reader(file)?;
    Ok(params)
}
