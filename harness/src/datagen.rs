use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use constants::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::Config;
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct WordList {
  words: Vec<String>,
}

impl WordList {
  pub fn load(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|err| Error::io_at(path, err))?;
    let words = contents
      .lines()
      .map(str::trim)
      .filter(|line| !line.is_empty())
      .map(String::from)
      .collect();
    return Self::from_words(path, words);
  }

  pub fn from_words(path: impl Into<PathBuf>, words: Vec<String>) -> Result<Self> {
    let path = path.into();
    if words.is_empty() {
      return Err(Error::EmptyWordList(path));
    }
    return Ok(Self { words });
  }

  pub fn len(&self) -> usize {
    return self.words.len();
  }

  pub fn contains(&self, word: &str) -> bool {
    return self.words.iter().any(|w| w == word);
  }

  pub fn pick<R: Rng>(&self, rng: &mut R) -> &str {
    return &self.words[rng.gen_range(0..self.words.len())];
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRecord {
  pub pid: u32,
  pub year: u16,
  pub month: u8,
  pub city: String,
  pub country: String,
}

impl fmt::Display for HistoryRecord {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    return write!(
      f,
      "{}\t{}\t{}\t{}\t{}",
      self.pid, self.year, self.month, self.city, self.country
    );
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonRecord {
  pub id: u32,
  pub first_name: String,
  pub last_name: String,
  pub birth_year: u16,
}

impl fmt::Display for PersonRecord {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    return write!(
      f,
      "{}\t{}\t{}\t{}",
      self.id, self.first_name, self.last_name, self.birth_year
    );
  }
}

pub struct HistoryGenerator {
  cities: WordList,
  countries: WordList,
}

impl HistoryGenerator {
  pub fn new(cities: WordList, countries: WordList) -> Self {
    return Self { cities, countries };
  }

  pub fn load(config: &Config) -> Result<Self> {
    return Ok(Self::new(
      WordList::load(config.word_list(CITIES_FILE))?,
      WordList::load(config.word_list(COUNTRIES_FILE))?,
    ));
  }

  pub fn cities(&self) -> &WordList {
    return &self.cities;
  }

  pub fn countries(&self) -> &WordList {
    return &self.countries;
  }

  pub fn records<'a, R: Rng>(
    &'a self,
    count: u64,
    rng: &'a mut R,
  ) -> impl Iterator<Item = HistoryRecord> + 'a {
    return (0..count).map(move |_| HistoryRecord {
      pid: rng.gen_range(PERSON_ID_RANGE),
      year: rng.gen_range(YEAR_RANGE),
      month: rng.gen_range(MONTH_RANGE),
      city: self.cities.pick(rng).to_string(),
      country: self.countries.pick(rng).to_string(),
    });
  }

  pub fn write_tsv<R: Rng>(&self, count: u64, rng: &mut R, path: &Path) -> Result<u64> {
    let written = write_records(path, self.records(count, rng))?;
    log::debug!("Generated {written} history records into {path:?}");
    return Ok(written);
  }
}

pub struct PersonGenerator {
  first_names: WordList,
  last_names: WordList,
}

impl PersonGenerator {
  pub fn new(first_names: WordList, last_names: WordList) -> Self {
    return Self {
      first_names,
      last_names,
    };
  }

  pub fn load(config: &Config) -> Result<Self> {
    return Ok(Self::new(
      WordList::load(config.word_list(FIRST_NAMES_FILE))?,
      WordList::load(config.word_list(LAST_NAMES_FILE))?,
    ));
  }

  pub fn records<'a, R: Rng>(
    &'a self,
    count: u32,
    rng: &'a mut R,
  ) -> impl Iterator<Item = PersonRecord> + 'a {
    return (1..=count).map(move |id| PersonRecord {
      id,
      first_name: self.first_names.pick(rng).to_string(),
      last_name: self.last_names.pick(rng).to_string(),
      birth_year: rng.gen_range(BIRTH_YEAR_RANGE),
    });
  }
}

/// Writes the person file unless it already exists. Seeded, so every run sees the same persons.
pub fn ensure_persons_file(config: &Config) -> Result<PathBuf> {
  let path = config.persons_path();
  if path.is_file() {
    return Ok(path);
  }

  let generator = PersonGenerator::load(config)?;
  let mut rng = StdRng::seed_from_u64(PERSON_SEED);
  let written = write_records(&path, generator.records(PERSON_COUNT, &mut rng))?;
  log::info!("Generated {written} person records into {path:?}");
  return Ok(path);
}

fn write_records<T: fmt::Display>(path: &Path, records: impl Iterator<Item = T>) -> Result<u64> {
  let file = File::create(path).map_err(|err| Error::io_at(path, err))?;
  let mut writer = BufWriter::new(file);
  let mut written = 0;
  for record in records {
    writeln!(writer, "{record}")?;
    written += 1;
  }
  writer.flush()?;
  return Ok(written);
}
