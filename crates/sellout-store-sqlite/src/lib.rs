//! SQLite backend for the sellout engine.
//!
//! Wraps a single [`rusqlite::Connection`]. Used for local runs against a file
//! and as the test bed for the core engine.

mod backend;
mod classify;

pub mod error;

pub use backend::SqliteBackend;
pub use error::{Error, Result};
