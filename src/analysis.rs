//! Derived values behind the three plots.
//!
//! Rows are grouped by dtype; rows without a dtype belong to no group and are
//! not plotted. Within a group the scaling and efficiency series use only the
//! rows at the group's largest sample count, i.e. a fixed problem size.
use crate::table::{ResultRow, ResultTable};
use std::collections::BTreeMap;
use std::f64::consts::PI;

/// One labelled line of a chart.
#[derive(Debug, Clone, PartialEq)]
pub struct Series<X> {
    pub label: String,
    pub points: Vec<(X, f64)>,
}

/// Absolute distance of an estimate from pi.
pub fn abs_error(pi_approx: f64) -> f64 {
    (pi_approx - PI).abs()
}

/// Rows grouped by dtype, groups in ascending dtype order, rows in table order.
pub fn group_by_dtype(table: &ResultTable) -> BTreeMap<&str, Vec<&ResultRow>> {
    let mut groups: BTreeMap<&str, Vec<&ResultRow>> = BTreeMap::new();
    for row in table.rows() {
        if let Some(dtype) = row.dtype.as_deref() {
            groups.entry(dtype).or_default().push(row);
        }
    }
    groups
}

/// Sorted distinct thread counts across the whole table.
pub fn thread_ticks(table: &ResultTable) -> Vec<u32> {
    let mut ticks: Vec<u32> = table.rows().iter().filter_map(|r| r.threads).collect();
    ticks.sort_unstable();
    ticks.dedup();
    ticks
}

/// Largest sample count across the whole table.
pub fn max_samples(table: &ResultTable) -> Option<i64> {
    table.rows().iter().filter_map(|r| r.samples).max()
}

/// Rows of `group` at its own largest sample count that have both a thread
/// count and a runtime. Returns the sample count along with the rows.
fn fixed_size_subset(
    dtype: &str,
    group: &[&ResultRow],
) -> Result<(i64, Vec<(u32, f64)>), AnalysisError> {
    let empty = || AnalysisError::EmptySubset {
        dtype: dtype.to_string(),
    };
    let samples = group.iter().filter_map(|r| r.samples).max().ok_or_else(empty)?;

    let mut points = Vec::new();
    for row in group.iter().filter(|r| r.samples == Some(samples)) {
        match (row.threads, row.runtime) {
            (Some(threads), Some(runtime)) => points.push((threads, runtime)),
            _ => tracing::warn!(
                job_id = %row.job_id,
                dtype,
                "skipping job without thread count or runtime"
            ),
        }
    }

    if points.is_empty() {
        return Err(empty());
    }
    Ok((samples, points))
}

/// Runtime against thread count, one series per dtype.
pub fn scaling_series(table: &ResultTable) -> Result<Vec<Series<u32>>, AnalysisError> {
    group_by_dtype(table)
        .into_iter()
        .map(|(dtype, group)| {
            let (_, points) = fixed_size_subset(dtype, &group)?;
            Ok(Series {
                label: dtype.to_string(),
                points,
            })
        })
        .collect()
}

/// Parallel efficiency `(T1 / T) / threads` against thread count, one series
/// per dtype, where T1 is the runtime at the smallest thread count measured.
///
/// A zero T or T1 gives an infinite or NaN efficiency; it is not guarded.
pub fn efficiency_series(table: &ResultTable) -> Result<Vec<Series<u32>>, AnalysisError> {
    group_by_dtype(table)
        .into_iter()
        .map(|(dtype, group)| {
            let (samples, mut points) = fixed_size_subset(dtype, &group)?;
            points.sort_by_key(|&(threads, _)| threads);
            let t1 = points[0].1;

            let points = points
                .into_iter()
                .map(|(threads, runtime)| {
                    let speedup = t1 / runtime;
                    (threads, speedup / f64::from(threads))
                })
                .collect();
            Ok(Series {
                label: format!("{dtype} (N={samples})"),
                points,
            })
        })
        .collect()
}

/// Absolute error against sample count, one series per dtype, over every
/// row of the group that has both values.
pub fn precision_series(table: &ResultTable) -> Vec<Series<f64>> {
    group_by_dtype(table)
        .into_iter()
        .map(|(dtype, group)| {
            let points = group
                .iter()
                .filter_map(|r| Some((r.samples? as f64, abs_error(r.pi_approx?))))
                .collect();
            Series {
                label: dtype.to_string(),
                points,
            }
        })
        .collect()
}

#[derive(Debug)]
pub enum AnalysisError {
    /// No usable rows at the dtype's largest sample count.
    EmptySubset { dtype: String },
}

impl std::fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisError::EmptySubset { dtype } => write!(
                f,
                "dtype {dtype:?} has no job with threads and runtime at its largest sample count"
            ),
        }
    }
}

impl std::error::Error for AnalysisError {}
