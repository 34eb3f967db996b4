//! Mapping from Postgres errors to the engine's error kinds.

use sellout_core::{DbError, DbErrorKind};

pub fn db_error(err: postgres::Error) -> DbError {
  let kind = match err.code() {
    Some(state) => classify_sqlstate(state.code()),
    None if err.is_closed() => DbErrorKind::Connection,
    None => DbErrorKind::Other,
  };
  let message = match err.as_db_error() {
    Some(db) => db.message().to_owned(),
    None => err.to_string(),
  };
  DbError::new(kind, message)
}

pub fn classify_sqlstate(code: &str) -> DbErrorKind {
  match code {
    "42601" => DbErrorKind::SyntaxError,
    "42P01" => DbErrorKind::UndefinedTable,
    "42P07" => DbErrorKind::DuplicateTable,
    "42710" => DbErrorKind::DuplicateObject,
    // Class 08: connection exception.
    c if c.starts_with("08") => DbErrorKind::Connection,
    _ => DbErrorKind::Other,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn maps_sqlstates() {
    assert_eq!(classify_sqlstate("42601"), DbErrorKind::SyntaxError);
    assert_eq!(classify_sqlstate("42P01"), DbErrorKind::UndefinedTable);
    assert_eq!(classify_sqlstate("42P07"), DbErrorKind::DuplicateTable);
    assert_eq!(classify_sqlstate("42710"), DbErrorKind::DuplicateObject);
    assert_eq!(classify_sqlstate("08006"), DbErrorKind::Connection);
    assert_eq!(classify_sqlstate("23505"), DbErrorKind::Other);
    assert_eq!(classify_sqlstate("22007"), DbErrorKind::Other);
  }
}
