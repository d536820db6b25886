use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use constants::RESULTS_HEADER;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy)]
pub struct Clock {
  origin: Instant,
}

impl Clock {
  pub fn start() -> Self {
    return Self {
      origin: Instant::now(),
    };
  }

  pub fn now_ns(&self) -> u128 {
    return self.origin.elapsed().as_nanos();
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimingRecord {
  pub operation: String,
  pub index: bool,
  pub records: u64,
  pub elapsed_ms: f64,
  pub description: String,
}

impl TimingRecord {
  pub fn to_line(&self) -> String {
    return format!(
      "{}, {}, {}, {}, {}",
      sanitize(&self.operation),
      if self.index { "True" } else { "False" },
      self.records,
      self.elapsed_ms,
      sanitize(&self.description),
    );
  }
}

fn sanitize(field: &str) -> String {
  return field.replace(',', ";").replace(['\n', '\r'], " ");
}

/// Append-only writer for the results CSV. Without an output every row is dropped and `record` reports it.
pub struct Recorder {
  path: PathBuf,
  out: Option<Box<dyn Write>>,
  rows: u64,
}

impl Recorder {
  pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
    let path = path.into();
    let file = OpenOptions::new()
      .create(true)
      .write(true)
      .truncate(true)
      .open(&path)
      .map_err(|err| Error::io_at(&path, err))?;
    return Self::from_writer(path, file);
  }

  /// Like [`Recorder::create`], but falls back to dropping every row when the file cannot be written.
  pub fn open(path: impl Into<PathBuf>) -> Self {
    let path = path.into();
    return match Self::create(&path) {
      Ok(recorder) => recorder,
      Err(err) => {
        log::warn!("Cannot write results to {path:?}, measurements will only be logged: {err}");
        Self {
          path,
          out: None,
          rows: 0,
        }
      }
    };
  }

  pub fn from_writer(path: impl Into<PathBuf>, out: impl Write + 'static) -> Result<Self> {
    let mut out: Box<dyn Write> = Box::new(out);
    writeln!(out, "{RESULTS_HEADER}")?;
    out.flush()?;

    return Ok(Self {
      path: path.into(),
      out: Some(out),
      rows: 0,
    });
  }

  pub fn path(&self) -> &Path {
    return &self.path;
  }

  pub fn is_discarding(&self) -> bool {
    return self.out.is_none();
  }

  pub fn rows(&self) -> u64 {
    return self.rows;
  }

  pub fn record(
    &mut self,
    start_ns: u128,
    end_ns: u128,
    operation: &str,
    description: &str,
    index: bool,
    records: u64,
  ) -> Result<TimingRecord> {
    let record = TimingRecord {
      operation: operation.to_string(),
      index,
      records,
      elapsed_ms: elapsed_ms(start_ns, end_ns),
      description: description.to_string(),
    };

    log::info!(
      "{operation} [index={index}, records={records}]: {:.3} ms",
      record.elapsed_ms
    );

    let Some(out) = self.out.as_mut() else {
      return Err(Error::ResultsUnavailable(self.path.clone()));
    };
    writeln!(out, "{}", record.to_line())?;
    out.flush()?;
    self.rows += 1;
    return Ok(record);
  }
}

pub fn elapsed_ms(start_ns: u128, end_ns: u128) -> f64 {
  return end_ns.saturating_sub(start_ns) as f64 / 1_000_000.0;
}
