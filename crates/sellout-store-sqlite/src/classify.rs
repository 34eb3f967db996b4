//! Mapping from SQLite errors and declared types to the engine's vocabulary.
//!
//! SQLite reports most schema errors as a generic `SQLITE_ERROR`, so the kind
//! is recovered from the message text.

use rusqlite::ErrorCode;
use sellout_core::{DbError, DbErrorKind};

pub fn db_error(err: rusqlite::Error) -> DbError {
  match &err {
    rusqlite::Error::SqliteFailure(failure, message) => {
      let message = message.clone().unwrap_or_else(|| err.to_string());
      let kind = match failure.code {
        ErrorCode::CannotOpen | ErrorCode::NotADatabase => DbErrorKind::Connection,
        _ => classify_message(&message),
      };
      DbError::new(kind, message)
    }
    _ => DbError::other(err.to_string()),
  }
}

pub fn classify_message(message: &str) -> DbErrorKind {
  let lower = message.to_ascii_lowercase();
  if lower.contains("syntax error") || lower.starts_with("incomplete input") {
    DbErrorKind::SyntaxError
  } else if lower.starts_with("no such table") {
    DbErrorKind::UndefinedTable
  } else if lower.contains("already exists") {
    if lower.starts_with("table ") || lower.starts_with("view ") {
      DbErrorKind::DuplicateTable
    } else {
      DbErrorKind::DuplicateObject
    }
  } else {
    DbErrorKind::Other
  }
}

/// Normalise a declared column type (`PRAGMA table_info`) to the
/// `information_schema` names the engine compares against.
pub fn normalize_type(declared: &str) -> String {
  let upper = declared.trim().to_ascii_uppercase();
  if upper == "DATE" {
    "date".into()
  } else if upper.contains("INT") {
    "integer".into()
  } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
    "text".into()
  } else if upper == "REAL" {
    "real".into()
  } else if upper.contains("DOUB") || upper.contains("FLOA") {
    "double precision".into()
  } else if upper.starts_with("NUM") || upper.starts_with("DECIMAL") {
    "numeric".into()
  } else {
    declared.trim().to_ascii_lowercase()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn classifies_engine_messages() {
    assert_eq!(classify_message("near \"CREAT\": syntax error"), DbErrorKind::SyntaxError);
    assert_eq!(classify_message("incomplete input"), DbErrorKind::SyntaxError);
    assert_eq!(classify_message("no such table: chains"), DbErrorKind::UndefinedTable);
    assert_eq!(classify_message("table chains already exists"), DbErrorKind::DuplicateTable);
    assert_eq!(classify_message("view v already exists"), DbErrorKind::DuplicateTable);
    assert_eq!(
      classify_message("index chains_name_idx already exists"),
      DbErrorKind::DuplicateObject
    );
    assert_eq!(classify_message("NOT NULL constraint failed: t.x"), DbErrorKind::Other);
  }

  #[test]
  fn normalises_declared_types() {
    assert_eq!(normalize_type("INTEGER"), "integer");
    assert_eq!(normalize_type("BIGINT"), "integer");
    assert_eq!(normalize_type("INT"), "integer");
    assert_eq!(normalize_type("REAL"), "real");
    assert_eq!(normalize_type("DOUBLE PRECISION"), "double precision");
    assert_eq!(normalize_type("NUMERIC(10,2)"), "numeric");
    assert_eq!(normalize_type("NUM"), "numeric");
    assert_eq!(normalize_type("VARCHAR(20)"), "text");
    assert_eq!(normalize_type("date"), "date");
    assert_eq!(normalize_type("DATETIME"), "datetime");
    assert_eq!(normalize_type(""), "");
  }
}
