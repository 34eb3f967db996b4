//! The `Backend` trait and the types it exchanges with the engine.
//!
//! A backend is a single raw database connection. It knows nothing about
//! transactions; [`Session`](crate::Session) layers those on top. Higher
//! layers depend on this abstraction, not on any concrete driver.

use std::fmt;

use thiserror::Error;

use crate::ident::Ident;

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Classification of a driver error, independent of the engine in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbErrorKind {
  SyntaxError,
  UndefinedTable,
  DuplicateTable,
  DuplicateObject,
  Connection,
  Other,
}

impl DbErrorKind {
  /// Batch failures that justify retrying a script statement by statement.
  /// Transient failures such as a dropped connection are not retried.
  pub fn triggers_fallback(self) -> bool {
    matches!(
      self,
      Self::SyntaxError | Self::UndefinedTable | Self::DuplicateTable
    )
  }

  /// Conflicts that a statement-level retry skips instead of failing on.
  pub fn is_duplicate(self) -> bool {
    matches!(self, Self::DuplicateTable | Self::DuplicateObject)
  }
}

/// An error reported by a [`Backend`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct DbError {
  pub kind:    DbErrorKind,
  pub message: String,
}

impl DbError {
  pub fn new(kind: DbErrorKind, message: impl Into<String>) -> Self {
    Self { kind, message: message.into() }
  }

  pub fn other(message: impl Into<String>) -> Self {
    Self::new(DbErrorKind::Other, message)
  }
}

// ─── Results ─────────────────────────────────────────────────────────────────

/// A fully materialised result set with every value rendered as text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryResult {
  pub columns: Vec<String>,
  /// `None` marks SQL `NULL`.
  pub rows:    Vec<Vec<Option<String>>>,
}

impl QueryResult {
  /// Interpret a single-cell result (e.g. `SELECT COUNT(*)`) as a count.
  pub fn first_u64(&self) -> Result<u64, DbError> {
    let cell = self
      .rows
      .first()
      .and_then(|row| row.first())
      .cloned()
      .flatten()
      .ok_or_else(|| DbError::other("expected a single non-null value"))?;
    cell
      .trim()
      .parse()
      .map_err(|_| DbError::other(format!("expected a count, got {cell:?}")))
  }
}

/// One column of a table as reported by the schema catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
  pub name:      String,
  /// Declared type, normalised to the `information_schema.columns.data_type`
  /// vocabulary (`integer`, `numeric`, `double precision`, `date`, ...).
  pub data_type: String,
}

// ─── Dialect ─────────────────────────────────────────────────────────────────

/// SQL templates that differ between engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
  Postgres,
  Sqlite,
}

impl Dialect {
  /// In-place conversion of a text column to `DATE`, if the engine supports
  /// altering a column's type.
  pub fn cast_to_date(self, table: &Ident, column: &Ident) -> Option<String> {
    match self {
      Self::Postgres => Some(format!(
        "ALTER TABLE {table} ALTER COLUMN {column} TYPE DATE USING {column}::date"
      )),
      Self::Sqlite => None,
    }
  }

  /// Predicate that holds only for values shaped exactly like `YYYY-MM-DD`.
  pub fn iso_date_predicate(self, column: &Ident) -> String {
    match self {
      Self::Postgres => format!(r"{column}::text ~ '^\d{{4}}-\d{{2}}-\d{{2}}$'"),
      Self::Sqlite => format!(
        "{column} GLOB '[0-9][0-9][0-9][0-9]-[0-9][0-9]-[0-9][0-9]'"
      ),
    }
  }

  /// Expression converting an ISO date string to the engine's date value.
  pub fn text_to_date(self, column: &Ident) -> String {
    match self {
      Self::Postgres => format!("{column}::text::date"),
      Self::Sqlite => format!("date({column})"),
    }
  }
}

impl fmt::Display for Dialect {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Postgres => "postgres",
      Self::Sqlite => "sqlite",
    })
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// A single raw database connection.
///
/// Implementations must not manage transactions themselves: every statement
/// they are handed, including `BEGIN`/`COMMIT`/`SAVEPOINT`, comes from the
/// owning [`Session`](crate::Session).
pub trait Backend {
  fn dialect(&self) -> Dialect;

  /// Run one or more `;`-separated statements, discarding any rows.
  fn execute(&mut self, sql: &str) -> Result<(), DbError>;

  /// Run a single statement and collect its result set.
  fn query(&mut self, sql: &str) -> Result<QueryResult, DbError>;

  /// Whether `name` resolves to a table or view, matched case-sensitively.
  fn relation_exists(&mut self, name: &str) -> Result<bool, DbError>;

  /// Columns of `table` in ordinal order; empty if the table does not exist.
  fn columns(&mut self, table: &str) -> Result<Vec<ColumnInfo>, DbError>;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fallback_kinds_are_closed() {
    assert!(DbErrorKind::SyntaxError.triggers_fallback());
    assert!(DbErrorKind::UndefinedTable.triggers_fallback());
    assert!(DbErrorKind::DuplicateTable.triggers_fallback());
    assert!(!DbErrorKind::DuplicateObject.triggers_fallback());
    assert!(!DbErrorKind::Connection.triggers_fallback());
    assert!(!DbErrorKind::Other.triggers_fallback());
  }

  #[test]
  fn first_u64_parses_counts() {
    let result = QueryResult {
      columns: vec!["count".into()],
      rows:    vec![vec![Some("42".into())]],
    };
    assert_eq!(result.first_u64().unwrap(), 42);

    let empty = QueryResult::default();
    assert!(empty.first_u64().is_err());

    let null = QueryResult { columns: vec!["count".into()], rows: vec![vec![None]] };
    assert!(null.first_u64().is_err());
  }

  #[test]
  fn postgres_date_templates() {
    let table = Ident::new("sellout").unwrap();
    let column = Ident::new("daily").unwrap();
    assert_eq!(
      Dialect::Postgres.cast_to_date(&table, &column).unwrap(),
      "ALTER TABLE \"sellout\" ALTER COLUMN \"daily\" TYPE DATE USING \"daily\"::date"
    );
    assert_eq!(
      Dialect::Postgres.iso_date_predicate(&column),
      r#""daily"::text ~ '^\d{4}-\d{2}-\d{2}$'"#
    );
    assert!(Dialect::Sqlite.cast_to_date(&table, &column).is_none());
  }
}
