//! The tabular dataset: one row per job, ordering, CSV export and console
//! rendering.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::path::{Path, PathBuf};

/// Column names, in output order.
pub const COLUMNS: [&str; 8] = [
    "threads",
    "dtype",
    "samples",
    "pi_approx",
    "runtime",
    "job_id",
    "status",
    "cluster",
];

/// Values extracted from a single job. Fields whose source pattern did not
/// match are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub threads: Option<u32>,
    pub dtype: Option<String>,
    pub samples: Option<i64>,
    pub pi_approx: Option<f64>,
    /// Seconds.
    pub runtime: Option<f64>,
    pub job_id: String,
    pub status: String,
    pub cluster: String,
}

/// Ordered collection of result rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultTable {
    rows: Vec<ResultRow>,
}

/// Compare two optional keys with `None` after every `Some`.
fn cmp_nulls_last<T: Ord>(a: &Option<T>, b: &Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

impl ResultTable {
    pub fn new(rows: Vec<ResultRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Stable sort by `(dtype, threads)` ascending, missing values last.
    pub fn sort_by_dtype_threads(&mut self) {
        self.rows.sort_by(|a, b| {
            cmp_nulls_last(&a.dtype, &b.dtype).then_with(|| cmp_nulls_last(&a.threads, &b.threads))
        });
    }

    /// Write the table as CSV with a header row, even when empty.
    pub fn write_csv(&self, path: &Path) -> Result<(), TableError> {
        let csv_err = |e| TableError::Csv {
            path: path.to_path_buf(),
            source: e,
        };

        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(path)
            .map_err(csv_err)?;
        wtr.write_record(COLUMNS).map_err(csv_err)?;
        for row in &self.rows {
            wtr.serialize(row).map_err(csv_err)?;
        }
        wtr.flush().map_err(|e| TableError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(())
    }

    /// Read a table previously written by [`ResultTable::write_csv`].
    #[cfg(test)]
    pub fn read_csv(path: &Path) -> Result<Self, TableError> {
        let csv_err = |e| TableError::Csv {
            path: path.to_path_buf(),
            source: e,
        };

        let mut rdr = csv::Reader::from_path(path).map_err(csv_err)?;
        let rows = rdr
            .deserialize()
            .collect::<Result<Vec<ResultRow>, _>>()
            .map_err(csv_err)?;
        Ok(Self { rows })
    }
}

fn cell<T: fmt::Display>(value: &Option<T>, null: &str) -> String {
    match value {
        Some(v) => v.to_string(),
        None => null.to_string(),
    }
}

/// Aligned, right-justified columns, one line per row. Missing numbers show
/// as `NaN`, a missing dtype as `None`.
impl fmt::Display for ResultTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body: Vec<[String; 8]> = self
            .rows
            .iter()
            .map(|r| {
                [
                    cell(&r.threads, "NaN"),
                    cell(&r.dtype, "None"),
                    cell(&r.samples, "NaN"),
                    cell(&r.pi_approx, "NaN"),
                    cell(&r.runtime, "NaN"),
                    r.job_id.clone(),
                    r.status.clone(),
                    r.cluster.clone(),
                ]
            })
            .collect();

        let mut widths = COLUMNS.map(str::len);
        for line in &body {
            for (w, c) in widths.iter_mut().zip(line) {
                *w = (*w).max(c.len());
            }
        }

        let header = COLUMNS.map(str::to_string);
        for line in std::iter::once(&header).chain(&body) {
            let padded: Vec<String> = line
                .iter()
                .zip(widths)
                .map(|(c, w)| format!("{c:>w$}"))
                .collect();
            writeln!(f, "{}", padded.join("  "))?;
        }
        if self.rows.is_empty() {
            writeln!(f, "(no rows)")?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub enum TableError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Csv {
        path: PathBuf,
        source: csv::Error,
    },
}

impl fmt::Display for TableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableError::Io { path, source } => {
                write!(f, "I/O error on {}: {source}", path.display())
            }
            TableError::Csv { path, source } => {
                write!(f, "CSV error on {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for TableError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TableError::Io { source, .. } => Some(source),
            TableError::Csv { source, .. } => Some(source),
        }
    }
}
