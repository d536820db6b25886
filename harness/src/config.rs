use std::path::{Path, PathBuf};
use std::str::FromStr;

use constants::*;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sweep {
  min: u64,
  step: u64,
  max: u64,
}

impl Sweep {
  pub fn new(min: u64, step: u64, max: u64) -> Result<Self> {
    if step == 0 {
      return Err(Error::Config("sweep step must be positive".into()));
    }
    if min > max {
      return Err(Error::Config(format!(
        "sweep min ({min}) is larger than max ({max})"
      )));
    }
    return Ok(Self { min, step, max });
  }

  pub fn min(&self) -> u64 {
    return self.min;
  }

  pub fn step(&self) -> u64 {
    return self.step;
  }

  pub fn max(&self) -> u64 {
    return self.max;
  }

  pub fn counts(&self) -> impl Iterator<Item = u64> {
    let step = usize::try_from(self.step).unwrap_or(usize::MAX);
    return (self.min..=self.max).step_by(step);
  }

  pub fn len(&self) -> usize {
    return ((self.max - self.min) / self.step + 1) as usize;
  }

  pub fn iterations(&self, modes: &[bool]) -> usize {
    return modes.len() * self.len();
  }
}

impl Default for Sweep {
  fn default() -> Self {
    return Self {
      min: SWEEP_MIN,
      step: SWEEP_STEP,
      max: SWEEP_MAX,
    };
  }
}

#[derive(Debug, Clone)]
pub struct Config {
  /// Databases, generated TSV files and the results CSV live here.
  pub work_dir: PathBuf,
  pub data_dir: PathBuf,
  pub sql_dir: PathBuf,
  pub results_file: PathBuf,
  pub sweep: Sweep,
  pub index_modes: Vec<bool>,
  pub seed: Option<u64>,
}

impl Default for Config {
  fn default() -> Self {
    return Self {
      work_dir: PathBuf::from("."),
      data_dir: PathBuf::from("data"),
      sql_dir: PathBuf::from("sql"),
      results_file: PathBuf::from(RESULTS_FILE),
      sweep: Sweep::default(),
      index_modes: INDEX_MODES.to_vec(),
      seed: None,
    };
  }
}

const ENV_PREFIX: &str = "INDEX_BENCH_";

impl Config {
  /// Defaults overridden by `INDEX_BENCH_*` variables. A `.env` file is loaded first if present.
  pub fn from_env() -> Result<Self> {
    if let Ok(path) = dotenvy::dotenv() {
      log::debug!("Loaded environment from {path:?}");
    }
    return Self::from_lookup(|key| std::env::var(format!("{ENV_PREFIX}{key}")).ok());
  }

  pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
    let mut config = Config::default();

    if let Some(dir) = lookup("WORK_DIR") {
      config.work_dir = PathBuf::from(dir);
    }
    if let Some(dir) = lookup("DATA_DIR") {
      config.data_dir = PathBuf::from(dir);
    }
    if let Some(dir) = lookup("SQL_DIR") {
      config.sql_dir = PathBuf::from(dir);
    }
    if let Some(file) = lookup("RESULTS") {
      config.results_file = PathBuf::from(file);
    }

    let min = parse_var(&lookup, "SWEEP_MIN")?.unwrap_or(config.sweep.min());
    let step = parse_var(&lookup, "SWEEP_STEP")?.unwrap_or(config.sweep.step());
    let max = parse_var(&lookup, "SWEEP_MAX")?.unwrap_or(config.sweep.max());
    config.sweep = Sweep::new(min, step, max)?;

    if let Some(modes) = lookup("INDEX_MODES") {
      config.index_modes = parse_modes(&modes)?;
    }
    config.seed = parse_var(&lookup, "SEED")?;

    return Ok(config);
  }

  pub fn database_path(&self, name: &str) -> PathBuf {
    return self.work_dir.join(format!("{name}.{DB_EXTENSION}"));
  }

  pub fn results_path(&self) -> PathBuf {
    return self.in_work_dir(&self.results_file);
  }

  pub fn history_path(&self) -> PathBuf {
    return self.work_dir.join(HISTORY_FILE);
  }

  pub fn persons_path(&self) -> PathBuf {
    return self.work_dir.join(PERSONS_FILE);
  }

  pub fn person_script(&self) -> PathBuf {
    return self.sql_dir.join(PERSON_SCRIPT);
  }

  pub fn history_script(&self) -> PathBuf {
    return self.sql_dir.join(HISTORY_SCRIPT);
  }

  pub fn word_list(&self, file: &str) -> PathBuf {
    return self.data_dir.join(file);
  }

  fn in_work_dir(&self, path: &Path) -> PathBuf {
    if path.is_absolute() {
      return path.to_path_buf();
    }
    return self.work_dir.join(path);
  }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
  T::Err: std::fmt::Display,
{
  let Some(raw) = lookup(key) else {
    return Ok(None);
  };
  return raw
    .trim()
    .parse::<T>()
    .map(Some)
    .map_err(|err| Error::Config(format!("{ENV_PREFIX}{key}={raw:?}: {err}")));
}

fn parse_modes(raw: &str) -> Result<Vec<bool>> {
  let modes = raw
    .split(',')
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(|s| match s.to_ascii_lowercase().as_str() {
      "true" | "on" | "1" => Ok(true),
      "false" | "off" | "0" => Ok(false),
      _ => Err(Error::Config(format!("unknown index mode {s:?}"))),
    })
    .collect::<Result<Vec<_>>>()?;

  if modes.is_empty() {
    return Err(Error::Config("no index modes given".into()));
  }
  return Ok(modes);
}
