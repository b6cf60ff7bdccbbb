//! PNG line charts.
//!
//! Two chart shapes cover all three plots: a linear chart with the thread
//! counts as x ticks, and a log-log chart.
use crate::analysis::Series;
use plotters::coord::cartesian::Cartesian2d;
use plotters::coord::ranged1d::Ranged;
use plotters::prelude::*;
use std::error::Error;
use std::ops::Range;
use std::path::{Path, PathBuf};

/// Line colors, cycled per series.
const COLORS: [RGBColor; 6] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
];

/// Image size and text of a chart.
#[derive(Debug, Clone)]
pub struct ChartSpec {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub width: u32,
    pub height: u32,
}

/// Lines against thread count, with ticks only at the values in `ticks`.
pub fn thread_chart(
    path: &Path,
    spec: &ChartSpec,
    series: &[Series<u32>],
    ticks: &[u32],
) -> Result<(), PlotError> {
    draw_thread_chart(path, spec, series, ticks).map_err(|e| PlotError::Render {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    tracing::info!(path = %path.display(), "wrote chart");
    Ok(())
}

/// Lines on log-log axes. Points that can't sit on a log axis are dropped.
pub fn loglog_chart(
    path: &Path,
    spec: &ChartSpec,
    series: &[Series<f64>],
) -> Result<(), PlotError> {
    draw_loglog_chart(path, spec, series).map_err(|e| PlotError::Render {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    tracing::info!(path = %path.display(), "wrote chart");
    Ok(())
}

fn draw_thread_chart(
    path: &Path,
    spec: &ChartSpec,
    series: &[Series<u32>],
    ticks: &[u32],
) -> Result<(), Box<dyn Error>> {
    let root = BitMapBackend::new(path, (spec.width, spec.height)).into_drawing_area();
    root.fill(&WHITE)?;

    let x_range = thread_range(ticks).with_key_points(ticks.to_vec());
    let y_range = linear_range(
        series
            .iter()
            .flat_map(|s| s.points.iter().map(|&(_, y)| y))
            .filter(|y| y.is_finite()),
    );

    let mut chart = ChartBuilder::on(&root)
        .caption(&spec.title, ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range, y_range)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(ticks.len().max(1))
        .x_label_formatter(&|x: &u32| x.to_string())
        .x_desc(spec.x_label.as_str())
        .y_desc(spec.y_label.as_str())
        .draw()?;

    draw_lines(&mut chart, series, |&(_, y): &(u32, f64)| y.is_finite())?;
    root.present()?;
    Ok(())
}

fn draw_loglog_chart(
    path: &Path,
    spec: &ChartSpec,
    series: &[Series<f64>],
) -> Result<(), Box<dyn Error>> {
    let root = BitMapBackend::new(path, (spec.width, spec.height)).into_drawing_area();
    root.fill(&WHITE)?;

    let on_log_axes = |&(x, y): &(f64, f64)| x.is_finite() && y.is_finite() && x > 0.0 && y > 0.0;
    let kept = || series.iter().flat_map(|s| s.points.iter().copied()).filter(on_log_axes);
    let x_range = log_range(kept().map(|(x, _)| x));
    let y_range = log_range(kept().map(|(_, y)| y));

    let mut chart = ChartBuilder::on(&root)
        .caption(&spec.title, ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range.log_scale(), y_range.log_scale())?;

    chart
        .configure_mesh()
        .x_label_formatter(&|x: &f64| format!("{x:.0e}"))
        .y_label_formatter(&|y: &f64| format!("{y:.0e}"))
        .x_desc(spec.x_label.as_str())
        .y_desc(spec.y_label.as_str())
        .draw()?;

    draw_lines(&mut chart, series, on_log_axes)?;
    root.present()?;
    Ok(())
}

/// One line with circle markers per series, plus a legend.
fn draw_lines<'a, 'b: 'a, X, Y, XV>(
    chart: &mut ChartContext<'a, BitMapBackend<'b>, Cartesian2d<X, Y>>,
    series: &[Series<XV>],
    keep: impl Fn(&(XV, f64)) -> bool,
) -> Result<(), Box<dyn Error>>
where
    X: Ranged<ValueType = XV>,
    Y: Ranged<ValueType = f64>,
    XV: Copy + 'static,
{
    for (idx, s) in series.iter().enumerate() {
        let color = COLORS[idx % COLORS.len()];
        let points: Vec<(XV, f64)> = s.points.iter().copied().filter(|p| keep(p)).collect();
        if points.len() < s.points.len() {
            tracing::debug!(
                series = %s.label,
                dropped = s.points.len() - points.len(),
                "points outside the drawable range"
            );
        }

        chart
            .draw_series(LineSeries::new(points.clone(), color.stroke_width(2)))?
            .label(s.label.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
        chart.draw_series(points.iter().map(|&p| Circle::new(p, 4, color.filled())))?;
    }

    if !series.is_empty() {
        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()?;
    }
    Ok(())
}

/// X range for the thread axis with one unit of slack on each side.
fn thread_range(ticks: &[u32]) -> Range<u32> {
    match (ticks.first(), ticks.last()) {
        (Some(&lo), Some(&hi)) => lo.saturating_sub(1)..hi.saturating_add(1),
        _ => 0..2,
    }
}

/// Bounds of `values` padded by 5%, or a unit range when there is nothing to
/// show.
fn linear_range(values: impl Iterator<Item = f64>) -> Range<f64> {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if lo > hi {
        return 0.0..1.0;
    }
    let pad = if hi > lo {
        (hi - lo) * 0.05
    } else {
        (hi.abs() * 0.1).max(0.5)
    };
    (lo - pad)..(hi + pad)
}

/// Bounds of strictly positive `values` widened by a factor of 2, or one
/// decade when there is nothing to show.
fn log_range(values: impl Iterator<Item = f64>) -> Range<f64> {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if lo > hi {
        return 1.0..10.0;
    }
    (lo / 2.0)..(hi * 2.0)
}

#[derive(Debug)]
pub enum PlotError {
    Render { path: PathBuf, message: String },
}

impl std::fmt::Display for PlotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlotError::Render { path, message } => {
                write!(f, "failed to render {}: {message}", path.display())
            }
        }
    }
}

impl std::error::Error for PlotError {}
