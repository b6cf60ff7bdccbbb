//! Reporter stage: CSV export, console table and the three charts.
use crate::analysis::{self, AnalysisError};
use crate::config::PlotConfig;
use crate::plot::{self, ChartSpec, PlotError};
use crate::table::{ResultTable, TableError};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Names of the files produced for one cluster.
///
/// Every output is prefixed with the cluster name so results from several
/// machines can share a directory.
#[derive(Debug, Clone)]
pub struct OutputPaths {
    dir: PathBuf,
    cluster: String,
}

impl OutputPaths {
    pub fn new(dir: impl Into<PathBuf>, cluster: &str) -> Self {
        Self {
            dir: dir.into(),
            cluster: cluster.to_string(),
        }
    }

    /// The directory all outputs are written to.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `{cluster}_pi_results.csv`
    pub fn csv(&self) -> PathBuf {
        self.file("pi_results.csv")
    }

    /// `{cluster}_strong_scaling.png`
    pub fn scaling(&self) -> PathBuf {
        self.file("strong_scaling.png")
    }

    /// `{cluster}_efficiency.png`
    pub fn efficiency(&self) -> PathBuf {
        self.file("efficiency.png")
    }

    /// `{cluster}_precision.png`
    pub fn precision(&self) -> PathBuf {
        self.file("precision.png")
    }

    fn file(&self, suffix: &str) -> PathBuf {
        self.dir.join(format!("{}_{suffix}", self.cluster))
    }
}

pub struct Reporter {
    paths: OutputPaths,
    plot: PlotConfig,
}

impl Reporter {
    pub fn new(paths: OutputPaths, plot: PlotConfig) -> Self {
        Self { paths, plot }
    }

    pub fn paths(&self) -> &OutputPaths {
        &self.paths
    }

    /// Write the CSV export, then print the table to `out`.
    pub fn write_table(&self, table: &ResultTable, out: &mut impl Write) -> Result<(), ReportError> {
        let csv = self.paths.csv();
        table.write_csv(&csv)?;
        tracing::info!(path = %csv.display(), rows = table.len(), "wrote results table");

        write!(out, "{table}").map_err(ReportError::Console)?;
        out.flush().map_err(ReportError::Console)?;
        Ok(())
    }

    /// Render the scaling, efficiency and precision charts, in that order.
    pub fn render_plots(&self, table: &ResultTable) -> Result<(), ReportError> {
        if table.is_empty() {
            tracing::warn!("no rows, charts will be empty");
        }
        let ticks = analysis::thread_ticks(table);

        let scaling = analysis::scaling_series(table)?;
        plot::thread_chart(
            &self.paths.scaling(),
            &self.scaling_spec(analysis::max_samples(table)),
            &scaling,
            &ticks,
        )?;

        let efficiency = analysis::efficiency_series(table)?;
        plot::thread_chart(
            &self.paths.efficiency(),
            &self.spec("Strong Scaling Efficiency", "Threads", "Parallel Efficiency"),
            &efficiency,
            &ticks,
        )?;

        let precision = analysis::precision_series(table);
        plot::loglog_chart(
            &self.paths.precision(),
            &self.spec(
                "Precision vs Samples",
                "Samples (log scale)",
                "Absolute Error (log scale)",
            ),
            &precision,
        )?;
        Ok(())
    }

    fn scaling_spec(&self, max_samples: Option<i64>) -> ChartSpec {
        let samples = match max_samples {
            Some(n) => n.to_string(),
            None => "NaN".to_string(),
        };
        self.spec(
            &format!("Scaling with Threads (samples={samples})"),
            "Threads",
            "Runtime (s)",
        )
    }

    fn spec(&self, title: &str, x_label: &str, y_label: &str) -> ChartSpec {
        ChartSpec {
            title: title.to_string(),
            x_label: x_label.to_string(),
            y_label: y_label.to_string(),
            width: self.plot.width,
            height: self.plot.height,
        }
    }
}

#[derive(Debug)]
pub enum ReportError {
    Table(TableError),
    Console(std::io::Error),
    Analysis(AnalysisError),
    Plot(PlotError),
}

impl std::fmt::Display for ReportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportError::Table(e) => write!(f, "{e}"),
            ReportError::Console(e) => write!(f, "failed to print results: {e}"),
            ReportError::Analysis(e) => write!(f, "{e}"),
            ReportError::Plot(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ReportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReportError::Table(e) => Some(e),
            ReportError::Console(e) => Some(e),
            ReportError::Analysis(e) => Some(e),
            ReportError::Plot(e) => Some(e),
        }
    }
}

impl From<TableError> for ReportError {
    fn from(e: TableError) -> Self {
        ReportError::Table(e)
    }
}

impl From<AnalysisError> for ReportError {
    fn from(e: AnalysisError) -> Self {
        ReportError::Analysis(e)
    }
}

impl From<PlotError> for ReportError {
    fn from(e: PlotError) -> Self {
        ReportError::Plot(e)
    }
}
