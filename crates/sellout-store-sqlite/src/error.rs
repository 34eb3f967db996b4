//! Error type for `sellout-store-sqlite`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("failed to open SQLite database {}: {source}", path.display())]
  Open {
    path:   PathBuf,
    #[source]
    source: rusqlite::Error,
  },

  #[error("database error: {0}")]
  Database(#[from] rusqlite::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
