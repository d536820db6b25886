//! Schema/load scripts.
//!
//! A script is a list of `;`-terminated statements. Lines starting with `--` are comments. Besides plain SQL a script
//! may bulk-load a tab-separated file:
//!
//! ```sql
//! LOAD DATA LOCAL INFILE 'phistory.tsv' INTO TABLE history (pid, eyear, emonth, city, country);
//! ```
//!
//! SQLite has no such statement, so the stage imports the file itself with one prepared `INSERT` per line. Relative
//! paths resolve against the work directory. Without a column list every column of the table is filled in declaration
//! order.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::connection::{Cursor, Session};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScriptOutcome {
  pub statements: usize,
  pub rows_loaded: u64,
}

pub struct LoadStage {
  work_dir: PathBuf,
}

impl LoadStage {
  pub fn new(work_dir: impl Into<PathBuf>) -> Self {
    return Self {
      work_dir: work_dir.into(),
    };
  }

  pub fn run_script(&self, session: &Session, path: &Path) -> Result<ScriptOutcome> {
    let script = std::fs::read_to_string(path).map_err(|err| Error::io_at(path, err))?;
    let cursor = session.cursor();

    let mut outcome = ScriptOutcome::default();
    for statement in split_statements(&script) {
      match LoadData::parse(&statement)? {
        Some(load) => outcome.rows_loaded += self.load(&cursor, &load)?,
        None => cursor.execute_batch(&statement)?,
      }
      outcome.statements += 1;
    }
    session.commit()?;

    log::debug!(
      "{path:?}: {} statements, {} rows loaded",
      outcome.statements,
      outcome.rows_loaded
    );
    return Ok(outcome);
  }

  fn load(&self, cursor: &Cursor<'_>, load: &LoadData) -> Result<u64> {
    let path = if load.file.is_absolute() {
      load.file.clone()
    } else {
      self.work_dir.join(&load.file)
    };
    let file = File::open(&path).map_err(|err| Error::io_at(&path, err))?;

    let conn = cursor.connection();
    let columns = match &load.columns {
      Some(columns) => columns.clone(),
      None => table_columns(cursor, &load.table)?,
    };
    if columns.is_empty() {
      return Err(Error::SqlExecution {
        message: format!("LOAD DATA: table {} has no columns", load.table),
      });
    }

    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
    let quoted: Vec<String> = columns.iter().map(|c| format!("\"{c}\"")).collect();
    let sql = format!(
      "INSERT INTO \"{}\" ({}) VALUES ({})",
      load.table,
      quoted.join(", "),
      placeholders.join(", ")
    );
    let mut stmt = conn
      .prepare(&sql)
      .map_err(|err| Error::sql(format!("LOAD DATA into {}", load.table), err))?;

    let mut loaded = 0;
    for (i, line) in BufReader::new(file).lines().enumerate() {
      let line = line?;
      let line = line.trim_end_matches('\r');
      if line.is_empty() {
        continue;
      }

      let fields: Vec<&str> = line.split('\t').collect();
      if fields.len() != columns.len() {
        return Err(Error::SqlExecution {
          message: format!(
            "{path:?} line {}: expected {} fields, found {}",
            i + 1,
            columns.len(),
            fields.len()
          ),
        });
      }

      stmt
        .execute(rusqlite::params_from_iter(fields.iter()))
        .map_err(|err| Error::sql(format!("{path:?} line {}", i + 1), err))?;
      loaded += 1;
    }

    return Ok(loaded);
  }
}

fn table_columns(cursor: &Cursor<'_>, table: &str) -> Result<Vec<String>> {
  let query = || -> rusqlite::Result<Vec<String>> {
    let mut stmt = cursor
      .connection()
      .prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")?;
    let names = stmt
      .query_map([table], |row| row.get::<_, String>(0))?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    return Ok(names);
  };
  return query().map_err(|err| Error::sql(format!("columns of {table}"), err));
}

/// Splits on `;`, drops `--` comment lines and blank statements.
pub fn split_statements(script: &str) -> Vec<String> {
  let without_comments: String = script
    .lines()
    .filter(|line| !line.trim_start().starts_with("--"))
    .collect::<Vec<_>>()
    .join("\n");

  return without_comments
    .split(';')
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(String::from)
    .collect();
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct LoadData {
  file: PathBuf,
  table: String,
  columns: Option<Vec<String>>,
}

impl LoadData {
  /// `Ok(None)` when the statement is not a `LOAD DATA`.
  fn parse(statement: &str) -> Result<Option<Self>> {
    let Some(rest) = keyword(statement, "LOAD").and_then(|r| keyword(r, "DATA")) else {
      return Ok(None);
    };

    let malformed = || Error::SqlExecution {
      message: format!("malformed LOAD DATA statement: {statement}"),
    };

    let rest = keyword(rest, "LOCAL").unwrap_or(rest);
    let rest = keyword(rest, "INFILE").ok_or_else(malformed)?;
    let (file, rest) = quoted(rest).ok_or_else(malformed)?;
    let rest = keyword(rest, "INTO")
      .and_then(|r| keyword(r, "TABLE"))
      .ok_or_else(malformed)?;
    let (table, rest) = identifier(rest).ok_or_else(malformed)?;

    // FIELDS/LINES clauses are accepted and ignored: the import is always tab-separated, one row per line.
    let columns = match (rest.find('('), rest.rfind(')')) {
      (Some(open), Some(close)) if open < close => {
        let columns: Vec<String> = rest[open + 1..close]
          .split(',')
          .map(|c| c.trim().trim_matches(|ch| ch == '`' || ch == '"').to_string())
          .filter(|c| !c.is_empty())
          .collect();
        Some(columns)
      }
      (None, None) => None,
      _ => return Err(malformed()),
    };

    return Ok(Some(Self {
      file: PathBuf::from(file),
      table,
      columns,
    }));
  }
}

fn keyword<'a>(input: &'a str, word: &str) -> Option<&'a str> {
  let input = input.trim_start();
  let head = input.get(..word.len())?;
  if !head.eq_ignore_ascii_case(word) {
    return None;
  }
  let rest = &input[word.len()..];
  return match rest.chars().next() {
    None => Some(rest),
    Some(c) if c.is_whitespace() || c == '\'' || c == '"' => Some(rest),
    _ => None,
  };
}

fn quoted(input: &str) -> Option<(&str, &str)> {
  let input = input.trim_start();
  let quote = input.chars().next().filter(|c| *c == '\'' || *c == '"')?;
  let body = &input[1..];
  let end = body.find(quote)?;
  return Some((&body[..end], &body[end + 1..]));
}

fn identifier(input: &str) -> Option<(String, &str)> {
  let input = input.trim_start();
  let end = input
    .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '`' || c == '"'))
    .unwrap_or(input.len());
  let name = input[..end].trim_matches(|c| c == '`' || c == '"');
  if name.is_empty() {
    return None;
  }
  return Some((name.to_string(), &input[end..]));
}
