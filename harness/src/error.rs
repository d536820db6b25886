use std::path::PathBuf;

use rusqlite::ErrorCode;

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("access denied for user '{user}'")]
  Authentication { user: String },

  #[error("database '{name}' does not exist (expected at {path:?})")]
  DatabaseNotFound { name: String, path: PathBuf },

  #[error("database '{name}' already exists at {path:?}")]
  DatabaseExists { name: String, path: PathBuf },

  #[error("connection to '{name}' failed: {source}")]
  UnknownConnection {
    name: String,
    #[source]
    source: rusqlite::Error,
  },

  #[error("file not found: {0:?}")]
  FileNotFound(PathBuf),

  #[error("word list {0:?} has no entries")]
  EmptyWordList(PathBuf),

  #[error("statement failed: {message}")]
  SqlExecution { message: String },

  #[error("results file {0:?} is not writable, row dropped")]
  ResultsUnavailable(PathBuf),

  #[error("invalid configuration: {0}")]
  Config(String),

  #[error("sqlite: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("io: {0}")]
  Io(#[from] std::io::Error),
}

impl Error {
  /// Connection-level failures end the sweep; anything else only skips the step.
  pub fn is_fatal(&self) -> bool {
    return match self {
      Error::Authentication { .. }
      | Error::DatabaseNotFound { .. }
      | Error::DatabaseExists { .. }
      | Error::UnknownConnection { .. } => true,
      Error::Sqlite(err) => is_connection_failure(err),
      _ => false,
    };
  }

  pub(crate) fn sql(context: impl std::fmt::Display, err: rusqlite::Error) -> Self {
    if is_connection_failure(&err) {
      return Error::Sqlite(err);
    }
    return Error::SqlExecution {
      message: format!("{context}: {err}"),
    };
  }

  pub(crate) fn io_at(path: &std::path::Path, err: std::io::Error) -> Self {
    if err.kind() == std::io::ErrorKind::NotFound {
      return Error::FileNotFound(path.to_path_buf());
    }
    return Error::Io(err);
  }
}

fn is_connection_failure(err: &rusqlite::Error) -> bool {
  return match err.sqlite_error_code() {
    Some(
      ErrorCode::CannotOpen
      | ErrorCode::NotADatabase
      | ErrorCode::DatabaseCorrupt
      | ErrorCode::SystemIoFailure
      | ErrorCode::DiskFull
      | ErrorCode::PermissionDenied,
    ) => true,
    _ => false,
  };
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
