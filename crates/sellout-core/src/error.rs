//! Error types for `sellout-core`.

use std::path::PathBuf;

use thiserror::Error;

use crate::backend::DbError;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] DbError),

  #[error("failed to read {}: {source}", path.display())]
  Io {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// A statement failed during fallback execution with an error that is not
  /// a duplicate-object conflict. The whole script was rolled back.
  #[error("SQL statement failed: {statement}: {source}")]
  Statement {
    statement: String,
    #[source]
    source:    DbError,
  },

  #[error("script {} could not be applied", .0.display())]
  ScriptFailed(PathBuf),

  #[error("no free backup table name derived from {0}")]
  BackupNameExhausted(String),

  #[error("invalid identifier {name:?}: {reason}")]
  InvalidIdentifier { name: String, reason: &'static str },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
