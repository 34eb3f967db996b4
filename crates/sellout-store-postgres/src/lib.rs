//! Postgres backend for the sellout engine.
//!
//! Uses the synchronous [`postgres`] client: the engine is strictly
//! single-connection and sequential, so there is no async runtime.

mod backend;
mod classify;
mod config;

pub mod error;

pub use backend::PgBackend;
pub use config::ConnectionConfig;
pub use error::{Error, Result};
