//! Field extraction: turn job records into result rows.
//!
//! Thread count comes from the config name (`8_threads`), dtype and sample
//! count from the job tag (`float_100000`), and the pi estimate and runtime
//! from the job's stdout, which looks like:
//!
//! ```text
//! Pi (float) = 3.14159274 (N=100000)
//! Runtime = 0.0123 seconds
//! ```
//!
//! A pattern that doesn't match leaves the field empty. A pattern that does
//! match but captures something unparseable is an error.
use crate::jobs::JobRecord;
use crate::table::{ResultRow, ResultTable};
use regex::Regex;
use std::sync::LazyLock;

static THREADS_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)_threads").unwrap());

static PI_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Pi\s*\(\w+\)\s*=\s*([0-9.]+)").unwrap());

static RUNTIME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Runtime\s*=\s*([0-9.]+)\s*seconds").unwrap());

/// Leading thread count of a config name like `8_threads`.
///
/// `Err` carries the digits when they don't fit a `u32`.
pub fn parse_threads(config_name: &str) -> Result<Option<u32>, String> {
    match THREADS_PATTERN.captures(config_name) {
        Some(c) => {
            let raw = &c[1];
            raw.parse::<u32>().map(Some).map_err(|_| raw.to_string())
        }
        None => Ok(None),
    }
}

/// Split a tag like `float_1000` into dtype and sample count.
///
/// Tags that don't split into exactly two `_`-separated parts yield
/// `Ok((None, None))`. A two-part tag whose second part is not an integer is
/// an error.
pub fn parse_tag(tag: &str) -> Result<(Option<String>, Option<i64>), std::num::ParseIntError> {
    let parts: Vec<&str> = tag.split('_').collect();
    match parts.as_slice() {
        [dtype, samples] => {
            let samples: i64 = samples.parse()?;
            Ok((Some(dtype.to_string()), Some(samples)))
        }
        _ => Ok((None, None)),
    }
}

/// First capture of `pattern` in `text`, parsed as a float.
///
/// `Ok(None)` when nothing matches; `Err` carries the captured text when it
/// isn't a number (e.g. `1.2.3`).
fn first_float(pattern: &Regex, text: &str) -> Result<Option<f64>, String> {
    match pattern.captures(text) {
        Some(c) => {
            let raw = &c[1];
            raw.parse::<f64>().map(Some).map_err(|_| raw.to_string())
        }
        None => Ok(None),
    }
}

/// Pi estimate printed by the benchmark, e.g. `Pi (double) = 3.14159`.
pub fn parse_pi(stdout: &str) -> Result<Option<f64>, String> {
    first_float(&PI_PATTERN, stdout)
}

/// Wall-clock runtime in seconds, e.g. `Runtime = 2.5 seconds`.
pub fn parse_runtime(stdout: &str) -> Result<Option<f64>, String> {
    first_float(&RUNTIME_PATTERN, stdout)
}

/// Build the row for one job given its already-read stdout.
pub fn extract_row(
    job: &JobRecord,
    stdout: &str,
    cluster: &str,
) -> Result<ResultRow, ExtractError> {
    let (dtype, samples) = parse_tag(&job.tag).map_err(|e| ExtractError::InvalidSamples {
        job_id: job.job_id.clone(),
        tag: job.tag.clone(),
        source: e,
    })?;

    let invalid = |field: &'static str| {
        let job_id = job.job_id.clone();
        move |text: String| ExtractError::InvalidNumber {
            job_id,
            field,
            text,
        }
    };
    let threads = parse_threads(&job.config_name).map_err(invalid("threads"))?;
    let pi_approx = parse_pi(stdout).map_err(invalid("pi_approx"))?;
    let runtime = parse_runtime(stdout).map_err(invalid("runtime"))?;

    Ok(ResultRow {
        threads,
        dtype,
        samples,
        pi_approx,
        runtime,
        job_id: job.job_id.clone(),
        status: job.status.to_string(),
        cluster: cluster.to_string(),
    })
}

/// Read each job's stdout and build one row per job, in input order.
pub fn jobs_to_table(jobs: &[JobRecord], cluster: &str) -> Result<ResultTable, ExtractError> {
    let mut rows = Vec::with_capacity(jobs.len());
    for job in jobs {
        let stdout = job.stdout().map_err(|e| ExtractError::Stdout {
            job_id: job.job_id.clone(),
            path: job.stdout_path.clone(),
            source: e,
        })?;
        let row = extract_row(job, &stdout, cluster)?;
        tracing::debug!(job_id = %row.job_id, ?row, "extracted");
        rows.push(row);
    }

    let incomplete = rows
        .iter()
        .filter(|r| {
            r.threads.is_none()
                || r.dtype.is_none()
                || r.pi_approx.is_none()
                || r.runtime.is_none()
        })
        .count();
    if incomplete > 0 {
        tracing::warn!(
            incomplete,
            total = rows.len(),
            "some jobs are missing fields; they will be left out of the plots that need them"
        );
    }
    tracing::info!(rows = rows.len(), "extracted results");

    Ok(ResultTable::new(rows))
}

#[derive(Debug)]
pub enum ExtractError {
    Stdout {
        job_id: String,
        path: std::path::PathBuf,
        source: std::io::Error,
    },
    InvalidSamples {
        job_id: String,
        tag: String,
        source: std::num::ParseIntError,
    },
    InvalidNumber {
        job_id: String,
        field: &'static str,
        text: String,
    },
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::Stdout {
                job_id,
                path,
                source,
            } => write!(
                f,
                "cannot read stdout of job {job_id} at {}: {source}",
                path.display()
            ),
            ExtractError::InvalidSamples { job_id, tag, .. } => write!(
                f,
                "job {job_id}: tag {tag:?} has a non-numeric sample count"
            ),
            ExtractError::InvalidNumber {
                job_id,
                field,
                text,
            } => write!(f, "job {job_id}: {field} value {text:?} is not a number"),
        }
    }
}

impl std::error::Error for ExtractError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExtractError::Stdout { source, .. } => Some(source),
            ExtractError::InvalidSamples { source, .. } => Some(source),
            ExtractError::InvalidNumber { .. } => None,
        }
    }
}
