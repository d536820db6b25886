//! Session handling for the benchmark database.
//!
//! The database is an SQLite file `<work_dir>/<name>.sqlite`. It must exist before `run`: [`ConnectionManager::init`]
//! creates it together with the single account allowed to open it. Sessions never run in autocommit mode; every
//! session holds an open transaction and [`Session::commit`] / [`Session::rollback`] immediately start the next one.

use std::path::{Path, PathBuf};

use constants::*;
use rusqlite::{Connection, ErrorCode, OpenFlags, OptionalExtension};
use xxhash_rust::xxh3::xxh3_128;

use crate::config::Config;
use crate::error::{Error, Result};

#[derive(Clone)]
pub struct ConnectionParams {
  pub database: String,
  pub user: String,
  pub password: String,
}

impl std::fmt::Debug for ConnectionParams {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    return f
      .debug_struct("ConnectionParams")
      .field("database", &self.database)
      .field("user", &self.user)
      .field("password", &"***")
      .finish();
  }
}

pub struct ConnectionManager {
  params: ConnectionParams,
  path: PathBuf,
}

impl ConnectionManager {
  pub fn new(params: ConnectionParams, config: &Config) -> Self {
    let path = config.database_path(&params.database);
    return Self { params, path };
  }

  pub fn path(&self) -> &Path {
    return &self.path;
  }

  pub fn init(&self) -> Result<()> {
    if self.path.exists() {
      return Err(Error::DatabaseExists {
        name: self.params.database.clone(),
        path: self.path.clone(),
      });
    }

    let conn = Connection::open_with_flags(
      &self.path,
      OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|source| self.unknown(source))?;

    conn.execute_batch(CREATE_ACCOUNT_TABLE_QUERY)?;
    conn.execute(
      INSERT_ACCOUNT_QUERY,
      (&self.params.user, digest(&self.params.user, &self.params.password)),
    )?;
    conn.close().map_err(|(_conn, err)| Error::Sqlite(err))?;

    log::info!("Created database '{}' at {:?}", self.params.database, self.path);
    return Ok(());
  }

  /// Opens a session. Fails with `DatabaseNotFound`, `Authentication` or `UnknownConnection`.
  pub fn acquire(&self) -> Result<Session> {
    if !self.path.is_file() {
      return Err(Error::DatabaseNotFound {
        name: self.params.database.clone(),
        path: self.path.clone(),
      });
    }

    let conn = Connection::open_with_flags(
      &self.path,
      OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|source| self.unknown(source))?;

    self.authenticate(&conn)?;

    conn
      .execute_batch(PRAGMAS)
      .map_err(|source| self.unknown(source))?;
    conn
      .execute_batch("BEGIN")
      .map_err(|source| self.unknown(source))?;

    let version: String = conn
      .query_row("SELECT sqlite_version()", (), |row| row.get(0))
      .map_err(|source| self.unknown(source))?;
    log::info!(
      "Connection established to '{}' (SQLite v{version})",
      self.params.database
    );

    return Ok(Session {
      conn,
      name: self.params.database.clone(),
    });
  }

  fn authenticate(&self, conn: &Connection) -> Result<()> {
    let stored: Option<String> = match conn
      .query_row(ACCOUNT_DIGEST_QUERY, [&self.params.user], |row| row.get(0))
      .optional()
    {
      Ok(stored) => stored,
      // No account table: the file was not created by `init`.
      Err(err) if err.sqlite_error_code() == Some(ErrorCode::Unknown) => None,
      Err(err) => return Err(self.unknown(err)),
    };

    if stored.as_deref() != Some(digest(&self.params.user, &self.params.password).as_str()) {
      log::warn!("Rejected credentials for user '{}'", self.params.user);
      return Err(Error::Authentication {
        user: self.params.user.clone(),
      });
    }
    return Ok(());
  }

  fn unknown(&self, source: rusqlite::Error) -> Error {
    return Error::UnknownConnection {
      name: self.params.database.clone(),
      source,
    };
  }
}

fn digest(user: &str, password: &str) -> String {
  return format!("{:032x}", xxh3_128(format!("{user}\0{password}").as_bytes()));
}

pub fn release(session: Session) -> Result<()> {
  return session.close();
}

pub struct Session {
  conn: Connection,
  name: String,
}

impl Session {
  pub fn cursor(&self) -> Cursor<'_> {
    return Cursor { conn: &self.conn };
  }

  pub fn in_transaction(&self) -> bool {
    return !self.conn.is_autocommit();
  }

  pub fn commit(&self) -> Result<()> {
    if self.in_transaction() {
      self
        .conn
        .execute_batch("COMMIT")
        .map_err(|err| Error::sql("COMMIT", err))?;
    }
    return self.begin();
  }

  pub fn rollback(&self) -> Result<()> {
    // SQLite may already have rolled back on its own after certain errors.
    if self.in_transaction() {
      self
        .conn
        .execute_batch("ROLLBACK")
        .map_err(|err| Error::sql("ROLLBACK", err))?;
    }
    return self.begin();
  }

  pub fn close(self) -> Result<()> {
    if self.in_transaction() {
      self.conn.execute_batch("ROLLBACK")?;
    }
    self.conn.close().map_err(|(_conn, err)| Error::Sqlite(err))?;
    log::info!("Connection to '{}' closed", self.name);
    return Ok(());
  }

  fn begin(&self) -> Result<()> {
    return self
      .conn
      .execute_batch("BEGIN")
      .map_err(|err| Error::sql("BEGIN", err));
  }
}

pub struct Cursor<'a> {
  conn: &'a Connection,
}

impl<'a> Cursor<'a> {
  pub fn execute(&self, sql: &str) -> Result<usize> {
    return self
      .conn
      .execute(sql, ())
      .map_err(|err| Error::sql(brief(sql), err));
  }

  pub fn execute_batch(&self, sql: &str) -> Result<()> {
    return self
      .conn
      .execute_batch(sql)
      .map_err(|err| Error::sql(brief(sql), err));
  }

  pub fn query_rows(&self, sql: &str) -> Result<usize> {
    let fetch = || -> rusqlite::Result<usize> {
      let mut stmt = self.conn.prepare_cached(sql)?;
      let mut rows = stmt.query(())?;
      let mut count = 0;
      while rows.next()?.is_some() {
        count += 1;
      }
      return Ok(count);
    };
    return fetch().map_err(|err| Error::sql(brief(sql), err));
  }

  pub fn query_count(&self, sql: &str) -> Result<u64> {
    let count: i64 = self
      .conn
      .query_row(sql, (), |row| row.get(0))
      .map_err(|err| Error::sql(brief(sql), err))?;
    return Ok(count.max(0) as u64);
  }

  pub(crate) fn connection(&self) -> &'a Connection {
    return self.conn;
  }
}

pub(crate) fn brief(sql: &str) -> String {
  let flat = sql.split_whitespace().collect::<Vec<_>>().join(" ");
  if flat.chars().count() <= 60 {
    return flat;
  }
  let cut: String = flat.chars().take(57).collect();
  return format!("{cut}...");
}
