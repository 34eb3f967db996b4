//! Core engine for the sellout ETL bootstrap.
//!
//! This crate has no database drivers. Backends implement
//! [`Backend`] (e.g. `sellout-store-postgres`, `sellout-store-sqlite`) and the
//! engine drives them through a [`Session`], which owns the transaction
//! discipline shared by every step.

pub mod backend;
pub mod curation;
pub mod error;
pub mod ident;
pub mod pipeline;
pub mod probe;
pub mod report;
pub mod script;
pub mod session;

pub use backend::{Backend, ColumnInfo, DbError, DbErrorKind, Dialect, QueryResult};
pub use error::{Error, Result};
pub use ident::Ident;
pub use session::Session;
