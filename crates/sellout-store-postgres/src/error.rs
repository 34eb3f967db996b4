//! Error type for `sellout-store-postgres`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("could not connect to {host}:{port}/{dbname}: {source}")]
  Connect {
    host:   String,
    port:   u16,
    dbname: String,
    #[source]
    source: postgres::Error,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
