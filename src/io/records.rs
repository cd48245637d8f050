//! Whitespace-separated measurement files.
//!
//! Layout:
//! - line 1: free text (acquisition banner), ignored
//! - line 2: column headers
//! - then one sample per line
//!
//! Cells that do not parse as numbers are kept as `NaN`; a row with the wrong
//! number of cells is a parse error for the whole file.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::data::Record;
use crate::error::FlowError;

/// Read one record file. The record is named after the file name.
pub fn read_record(path: &Path) -> Result<Record, FlowError> {
    let file = File::open(path).map_err(|e| FlowError::io(path, e))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let mut lines = BufReader::new(file).lines();
    let parse_err = |line: usize, message: &str| FlowError::Parse {
        file: name.clone(),
        line,
        message: message.to_string(),
    };

    lines
        .next()
        .ok_or_else(|| parse_err(1, "empty file"))?
        .map_err(|e| FlowError::io(path, e))?;
    let header_line = lines
        .next()
        .ok_or_else(|| parse_err(2, "missing header line"))?
        .map_err(|e| FlowError::io(path, e))?;
    let headers: Vec<String> = header_line.split_whitespace().map(str::to_string).collect();
    if headers.is_empty() {
        return Err(parse_err(2, "empty header line"));
    }

    let mut record = Record::new(name.clone(), headers);
    for (idx, line) in lines.enumerate() {
        let line_no = idx + 3;
        let line = line.map_err(|e| FlowError::io(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        let row: Vec<f64> = line
            .split_whitespace()
            .map(|cell| cell.parse::<f64>().unwrap_or(f64::NAN))
            .collect();
        record
            .push_row(row)
            .map_err(|e| parse_err(line_no, &e.to_string()))?;
    }

    tracing::debug!(file = %path.display(), rows = record.len(), columns = record.headers().len(), "record read");
    Ok(record)
}

/// Write `record` in the same layout `read_record` expects.
pub fn write_record(path: &Path, record: &Record) -> Result<(), FlowError> {
    let file = File::create(path).map_err(|e| FlowError::io(path, e))?;
    let mut w = BufWriter::new(file);

    let write = |w: &mut BufWriter<File>| -> std::io::Result<()> {
        writeln!(w, "# {}", record.name())?;
        writeln!(w, "{}", record.headers().join("\t"))?;
        for row in record.rows() {
            let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
            writeln!(w, "{}", cells.join("\t"))?;
        }
        w.flush()
    };
    write(&mut w).map_err(|e| FlowError::io(path, e))
}
