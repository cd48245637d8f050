//! In-memory measurement records.
//!
//! A `Record` holds the samples of one measurement file in acquisition order.
//! Cells that could not be read are stored as `NaN` so that the cleaner can
//! treat them uniformly with non-finite values.

use crate::error::FlowError;

/// One measurement file: named columns, rows in chronological order.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    name: String,
    headers: Vec<String>,
    rows: Vec<Vec<f64>>,
}

/// Borrowed view of a single row with access by column name.
#[derive(Debug, Clone, Copy)]
pub struct Sample<'a> {
    headers: &'a [String],
    values: &'a [f64],
}

impl<'a> Sample<'a> {
    /// Value of a named field; `None` if the record has no such column.
    pub fn get(&self, name: &str) -> Option<f64> {
        let idx = self.headers.iter().position(|h| h == name)?;
        self.values.get(idx).copied()
    }
}

impl Record {
    pub fn new(name: impl Into<String>, headers: Vec<String>) -> Self {
        Self {
            name: name.into(),
            headers,
            rows: Vec::new(),
        }
    }

    /// Build a record from equally sized columns.
    pub fn from_columns(name: impl Into<String>, columns: Vec<(String, Vec<f64>)>) -> Result<Self, FlowError> {
        let name = name.into();
        let n_rows = columns.first().map(|(_, c)| c.len()).unwrap_or(0);
        if let Some((col, values)) = columns.iter().find(|(_, c)| c.len() != n_rows) {
            return Err(FlowError::InvalidInput(format!(
                "column `{col}` of {name} has {} rows, expected {n_rows}",
                values.len()
            )));
        }

        let headers: Vec<String> = columns.iter().map(|(h, _)| h.clone()).collect();
        let rows = (0..n_rows)
            .map(|i| columns.iter().map(|(_, c)| c[i]).collect())
            .collect();
        Ok(Self { name, headers, rows })
    }

    pub fn push_row(&mut self, row: Vec<f64>) -> Result<(), FlowError> {
        if row.len() != self.headers.len() {
            return Err(FlowError::InvalidInput(format!(
                "row of {} values does not match {} headers in {}",
                row.len(),
                self.headers.len(),
                self.name
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Copy out a column by name.
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| r[idx]).collect())
    }

    /// Largest finite value of a column.
    pub fn max_of(&self, name: &str) -> Option<f64> {
        let idx = self.column_index(name)?;
        self.rows
            .iter()
            .map(|r| r[idx])
            .filter(|v| v.is_finite())
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |m| m.max(v))))
    }

    pub fn samples(&self) -> impl Iterator<Item = Sample<'_>> {
        self.rows.iter().map(|values| Sample {
            headers: &self.headers,
            values,
        })
    }

    /// Rows satisfying `predicate`, in original order.
    pub fn select<F>(&self, predicate: F) -> Record
    where
        F: Fn(&Sample<'_>) -> bool,
    {
        let rows = self
            .rows
            .iter()
            .filter(|values| {
                predicate(&Sample {
                    headers: &self.headers,
                    values,
                })
            })
            .cloned()
            .collect();
        Record {
            name: self.name.clone(),
            headers: self.headers.clone(),
            rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> Record {
        Record::from_columns(
            "M9_test.txt",
            vec![
                ("Icoil1".to_string(), vec![0.0, 100.0, 200.0, 300.0]),
                ("Rpm1".to_string(), vec![1000.0, 1500.0, f64::NAN, 3000.0]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn select_keeps_order_and_headers() {
        let r = record();
        let sel = r.select(|s| s.get("Icoil1").is_some_and(|i| i >= 100.0));
        assert_eq!(sel.len(), 3);
        assert_eq!(sel.column("Icoil1").unwrap(), vec![100.0, 200.0, 300.0]);
        assert_eq!(sel.headers(), r.headers());
    }

    #[test]
    fn max_of_skips_missing_values() {
        let r = record();
        assert_eq!(r.max_of("Rpm1"), Some(3000.0));
        assert_eq!(r.max_of("Flow1"), None);
    }

    #[test]
    fn from_columns_rejects_ragged_input() {
        let err = Record::from_columns(
            "bad",
            vec![("a".to_string(), vec![1.0]), ("b".to_string(), vec![1.0, 2.0])],
        );
        assert!(err.is_err());
    }
}
