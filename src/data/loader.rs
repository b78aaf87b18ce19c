// ============================================================
// Layer 4 — Series Loader
// ============================================================
// Reads the raw multivariate series from a headerless CSV:
//
//   one row    = one time slot
//   one column = one series (route / sensor / meter)
//
//   12.0,7.5,0.0,...   ← slot 0
//   11.2,7.9,0.3,...   ← slot 1
//
// Every row must have exactly n_route columns.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::domain::error::ForecastError;

/// The whole series, row-major: `values[slot * n_route + series]`.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesTable {
    values: Vec<f32>,
    n_route: usize,
}

impl SeriesTable {
    pub fn new(values: Vec<f32>, n_route: usize) -> Result<Self, ForecastError> {
        if n_route == 0 || values.len() % n_route != 0 {
            return Err(ForecastError::ShapeMismatch {
                expected: vec![n_route],
                found: vec![values.len()],
            });
        }
        Ok(Self { values, n_route })
    }

    pub fn n_route(&self) -> usize {
        self.n_route
    }

    /// Number of time slots.
    pub fn n_slots(&self) -> usize {
        self.values.len() / self.n_route
    }

    /// Rows `start..end`, flattened.
    pub fn rows(&self, start: usize, end: usize) -> &[f32] {
        &self.values[start * self.n_route..end * self.n_route]
    }
}

/// Loads a SeriesTable from a CSV file.
pub struct CsvLoader {
    path: PathBuf,
    n_route: usize,
}

impl CsvLoader {
    pub fn new(path: impl AsRef<Path>, n_route: usize) -> Self {
        Self { path: path.as_ref().to_path_buf(), n_route }
    }

    pub fn load(&self) -> Result<SeriesTable> {
        let file = std::fs::File::open(&self.path)
            .with_context(|| format!("Cannot open series file '{}'", self.path.display()))?;
        self.load_from(file)
    }

    fn load_from<R: std::io::Read>(&self, reader: R) -> Result<SeriesTable> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut values = Vec::new();
        for (row, record) in rdr.records().enumerate() {
            let record = record.with_context(|| format!("Malformed CSV at row {row}"))?;
            if record.len() != self.n_route {
                return Err(ForecastError::ShapeMismatch {
                    expected: vec![self.n_route],
                    found: vec![record.len()],
                })
                .with_context(|| format!("Row {row} of '{}'", self.path.display()));
            }
            for (col, field) in record.iter().enumerate() {
                let v: f32 = field
                    .parse()
                    .with_context(|| format!("Bad number '{field}' at row {row}, column {col}"))?;
                values.push(v);
            }
        }

        let table = SeriesTable::new(values, self.n_route)?;
        tracing::info!(
            "Loaded {} slots x {} series from '{}'",
            table.n_slots(),
            table.n_route(),
            self.path.display()
        );
        Ok(table)
    }
}
