mod analysis;
mod config;
mod extract;
mod jobs;
mod plot;
mod report;
mod table;

use clap::Parser;
use config::{ConfigError, ReportConfig};
use extract::ExtractError;
use jobs::{JobRecord, JobSource, JobStatus, SourceError, SqliteJobSource};
use report::{OutputPaths, ReportError, Reporter};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use table::ResultTable;
use tracing_subscriber::EnvFilter;

/// Turn completed SbatchMan pi benchmark jobs into a results table and
/// scaling, efficiency and precision plots.
#[derive(Parser, Debug)]
#[command(name = "pi-report", version, about)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "pi-report.toml")]
    config: PathBuf,

    /// SbatchMan database (overrides config)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Cluster name (overrides config; default: the one cluster in the database)
    #[arg(long)]
    cluster: Option<String>,

    /// Output directory (overrides config)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Job status to include, repeatable (overrides config; default COMPLETED)
    #[arg(long = "status", value_name = "STATUS")]
    statuses: Vec<String>,

    /// Resolve settings and list matching jobs, don't write anything
    #[arg(long)]
    dry_run: bool,

    /// Extra logging (per-job extraction, skipped points)
    #[arg(short, long)]
    verbose: bool,

    /// Only warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(?cli, "parsed CLI arguments");

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("pi-report: {e}");
            ExitCode::FAILURE
        }
    }
}

/// CLI flags win over the config file.
fn apply_overrides(cfg: &mut ReportConfig, cli: &Cli) {
    if let Some(db) = &cli.db {
        cfg.source.db_path = db.clone();
    }
    if let Some(cluster) = &cli.cluster {
        cfg.report.cluster = Some(cluster.clone());
    }
    if let Some(dir) = &cli.output_dir {
        cfg.report.output_dir = dir.clone();
    }
    if !cli.statuses.is_empty() {
        cfg.source.statuses = cli.statuses.clone();
    }
}

fn run(cli: &Cli) -> Result<(), RunError> {
    let mut cfg = config::load_config(&cli.config)?;
    apply_overrides(&mut cfg, cli);

    let statuses: Vec<JobStatus> = cfg
        .source
        .statuses
        .iter()
        .map(|s| JobStatus::from(s.as_str()))
        .collect();

    let source = SqliteJobSource::open(
        &cfg.source.db_path,
        &cfg.source.stdout_file,
        cfg.source.include_archived,
    )?;
    let cluster = match &cfg.report.cluster {
        Some(name) => name.clone(),
        None => source.cluster_name()?,
    };
    tracing::info!(
        cluster = %cluster,
        db = %cfg.source.db_path.display(),
        statuses = ?cfg.source.statuses,
        "starting report"
    );

    if cli.dry_run {
        let jobs = source.jobs_list(&statuses, Some(cluster.as_str()))?;
        list_jobs(&jobs, &mut std::io::stdout().lock()).map_err(RunError::Console)?;
        return Ok(());
    }

    let table = collect_table(&source, &statuses, &cluster)?;

    std::fs::create_dir_all(&cfg.report.output_dir).map_err(|e| RunError::OutputDir {
        path: cfg.report.output_dir.clone(),
        source: e,
    })?;
    let reporter = Reporter::new(OutputPaths::new(&cfg.report.output_dir, &cluster), cfg.plot);
    reporter.write_table(&table, &mut std::io::stdout().lock())?;
    reporter.render_plots(&table)?;

    tracing::info!(dir = %reporter.paths().dir().display(), "report complete");
    Ok(())
}

/// Dry-run output: one tab-separated line per job.
fn list_jobs(jobs: &[JobRecord], out: &mut impl Write) -> std::io::Result<()> {
    writeln!(out, "Dry run: {} matching jobs, nothing written.", jobs.len())?;
    for job in jobs {
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}\t{}",
            job.job_id,
            job.cluster,
            job.config_name,
            job.tag,
            job.status,
            job.stdout_path.display()
        )?;
    }
    out.flush()
}

/// List the jobs, extract one row each and sort the result by dtype and
/// thread count.
fn collect_table(
    source: &impl JobSource,
    statuses: &[JobStatus],
    cluster: &str,
) -> Result<ResultTable, RunError> {
    let jobs = source.jobs_list(statuses, Some(cluster))?;
    if jobs.is_empty() {
        tracing::warn!(cluster, "no matching jobs");
    }

    let mut table = extract::jobs_to_table(&jobs, cluster)?;
    table.sort_by_dtype_threads();
    Ok(table)
}

#[derive(Debug)]
enum RunError {
    Config(ConfigError),
    Source(SourceError),
    Extract(ExtractError),
    OutputDir {
        path: PathBuf,
        source: std::io::Error,
    },
    Report(ReportError),
    Console(std::io::Error),
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunError::Config(e) => write!(f, "{e}"),
            RunError::Source(e) => write!(f, "{e}"),
            RunError::Extract(e) => write!(f, "{e}"),
            RunError::OutputDir { path, source } => {
                write!(f, "cannot create output directory {}: {source}", path.display())
            }
            RunError::Report(e) => write!(f, "{e}"),
            RunError::Console(e) => write!(f, "failed to print job list: {e}"),
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RunError::Config(e) => Some(e),
            RunError::Source(e) => Some(e),
            RunError::Extract(e) => Some(e),
            RunError::OutputDir { source, .. } => Some(source),
            RunError::Report(e) => Some(e),
            RunError::Console(e) => Some(e),
        }
    }
}

impl From<ConfigError> for RunError {
    fn from(e: ConfigError) -> Self {
        RunError::Config(e)
    }
}

impl From<SourceError> for RunError {
    fn from(e: SourceError) -> Self {
        RunError::Source(e)
    }
}

impl From<ExtractError> for RunError {
    fn from(e: ExtractError) -> Self {
        RunError::Extract(e)
    }
}

impl From<ReportError> for RunError {
    fn from(e: ReportError) -> Self {
        RunError::Report(e)
    }
}
