use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use plotters::prelude::*;
use serde::Deserialize;

pub const REQUIRED_COLUMNS: [&str; 4] = ["Operation Name", "Index", "Number of Records", "Time (ms)"];

#[derive(Debug, thiserror::Error)]
pub enum PlotError {
  #[error("CSV file not found: {0:?}")]
  NotFound(PathBuf),

  #[error("expected column '{0}' not found in CSV")]
  MissingColumn(String),

  #[error("csv: {0}")]
  Csv(#[from] csv::Error),

  #[error("no plottable rows in {0:?}")]
  Empty(PathBuf),

  #[error("rendering chart: {0}")]
  Render(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
  pub operation: String,
  pub index: bool,
  pub records: u64,
  pub elapsed_ms: f64,
}

#[derive(Debug, Deserialize)]
struct RawRow {
  #[serde(rename = "Operation Name")]
  operation: String,
  #[serde(rename = "Index")]
  index: String,
  #[serde(rename = "Number of Records")]
  records: String,
  #[serde(rename = "Time (ms)")]
  elapsed_ms: String,
}

impl RawRow {
  fn coerce(self) -> Option<ResultRow> {
    if self.operation.is_empty() {
      return None;
    }
    let records = parse_count(&self.records)?;
    let elapsed_ms = self.elapsed_ms.parse::<f64>().ok().filter(|v| v.is_finite())?;
    return Some(ResultRow {
      operation: self.operation,
      index: self.index.eq_ignore_ascii_case("true"),
      records,
      elapsed_ms,
    });
  }
}

/// Accepts `300000` as well as `300000.0`.
fn parse_count(raw: &str) -> Option<u64> {
  if let Ok(count) = raw.parse::<u64>() {
    return Some(count);
  }
  let value = raw.parse::<f64>().ok()?;
  if value >= 0.0 && value.fract() == 0.0 && value <= u64::MAX as f64 {
    return Some(value as u64);
  }
  return None;
}

pub fn load_results(path: &Path) -> Result<Vec<ResultRow>, PlotError> {
  if !path.is_file() {
    return Err(PlotError::NotFound(path.to_path_buf()));
  }

  let mut reader = csv::ReaderBuilder::new()
    .trim(csv::Trim::All)
    .flexible(true)
    .from_path(path)?;

  let headers = reader.headers()?.clone();
  for column in REQUIRED_COLUMNS {
    if !headers.iter().any(|h| h == column) {
      return Err(PlotError::MissingColumn(column.to_string()));
    }
  }

  let mut rows = Vec::new();
  let mut dropped = 0;
  for record in reader.records() {
    let record = record?;
    match record
      .deserialize::<RawRow>(Some(&headers))
      .ok()
      .and_then(RawRow::coerce)
    {
      Some(row) => rows.push(row),
      None => dropped += 1,
    }
  }
  if dropped > 0 {
    log::warn!("Dropped {dropped} malformed rows from {path:?}");
  }
  return Ok(rows);
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
  pub operation: String,
  pub index: bool,
  /// Sorted by record count.
  pub points: Vec<(u64, f64)>,
}

impl Series {
  pub fn label(&self) -> String {
    if self.index {
      return format!("{} (idx)", self.operation);
    }
    return self.operation.clone();
  }
}

pub fn group_series(rows: &[ResultRow]) -> Vec<Series> {
  let mut groups: BTreeMap<(&str, bool), Vec<(u64, f64)>> = BTreeMap::new();
  for row in rows {
    groups
      .entry((row.operation.as_str(), row.index))
      .or_default()
      .push((row.records, row.elapsed_ms));
  }

  return groups
    .into_iter()
    .map(|((operation, index), mut points)| {
      points.sort_by_key(|&(records, _)| records);
      Series {
        operation: operation.to_string(),
        index,
        points,
      }
    })
    .collect();
}

fn render_err<E: std::fmt::Display>(err: E) -> PlotError {
  return PlotError::Render(err.to_string());
}

/// Draws every series into an SVG file. Series of the same operation share a color; indexed series use a thin line
/// with cross markers, unindexed ones a thick line with circles.
pub fn render_chart(series: &[Series], out: &Path) -> Result<(), PlotError> {
  let points = series.iter().flat_map(|s| s.points.iter());
  let x_min = points.clone().map(|p| p.0).min();
  let x_max = points.clone().map(|p| p.0).max();
  let y_max = points.map(|p| p.1).fold(0.0f64, f64::max);
  let (Some(x_min), Some(x_max)) = (x_min, x_max) else {
    return Err(PlotError::Empty(out.to_path_buf()));
  };
  let x_max = x_max.max(x_min + 1);
  let y_max = (y_max * 1.1).max(1.0);

  let root = SVGBackend::new(out, (1200, 700)).into_drawing_area();
  root.fill(&WHITE).map_err(render_err)?;

  let mut chart = ChartBuilder::on(&root)
    .caption("Operation Time vs Number of Records", ("sans-serif", 24))
    .margin(20)
    .x_label_area_size(40)
    .y_label_area_size(70)
    .build_cartesian_2d(x_min..x_max, 0f64..y_max)
    .map_err(render_err)?;

  chart
    .configure_mesh()
    .x_desc("Number of Records")
    .y_desc("Time (ms)")
    .draw()
    .map_err(render_err)?;

  let mut colors: BTreeMap<&str, usize> = BTreeMap::new();
  for s in series {
    let next = colors.len();
    let color = Palette99::pick(*colors.entry(s.operation.as_str()).or_insert(next)).to_rgba();
    let width = if s.index { 1 } else { 2 };

    chart
      .draw_series(LineSeries::new(s.points.iter().copied(), color.stroke_width(width)))
      .map_err(render_err)?
      .label(s.label())
      .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(width)));

    if s.index {
      chart
        .draw_series(s.points.iter().map(|&p| Cross::new(p, 4, color)))
        .map_err(render_err)?;
    } else {
      chart
        .draw_series(s.points.iter().map(|&p| Circle::new(p, 3, color.filled())))
        .map_err(render_err)?;
    }
  }

  chart
    .configure_series_labels()
    .position(SeriesLabelPosition::UpperLeft)
    .background_style(WHITE.mix(0.8))
    .border_style(BLACK)
    .draw()
    .map_err(render_err)?;

  root.present().map_err(render_err)?;
  log::info!("Saved plot to {out:?}");
  return Ok(());
}

pub fn plot(csv: &Path, out: &Path) -> Result<usize, PlotError> {
  let rows = load_results(csv)?;
  if rows.is_empty() {
    return Err(PlotError::Empty(csv.to_path_buf()));
  }
  let series = group_series(&rows);
  render_chart(&series, out)?;
  return Ok(series.len());
}
