//! Validated SQL identifiers.
//!
//! Every table or column name spliced into dynamic SQL goes through [`Ident`].
//! Names are restricted to `[A-Za-z_][A-Za-z0-9_]*` and always rendered
//! double-quoted, so a value that reached the catalog through a probe can be
//! dropped into a fixed statement template without further escaping.

use std::fmt;

use crate::{Error, Result};

/// Postgres truncates identifiers beyond `NAMEDATALEN - 1` bytes.
pub const MAX_IDENT_LEN: usize = 63;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ident(String);

impl Ident {
  pub fn new(name: impl Into<String>) -> Result<Self> {
    let name = name.into();
    match invalid_reason(&name) {
      None => Ok(Self(name)),
      Some(reason) => Err(Error::InvalidIdentifier { name, reason }),
    }
  }

  /// Append `suffix` to the raw name, re-validating the result.
  pub fn with_suffix(&self, suffix: &str) -> Result<Self> {
    Self::new(format!("{}{suffix}", self.0))
  }

  /// The unquoted name, suitable for catalog lookups and bind parameters.
  pub fn as_str(&self) -> &str { &self.0 }
}

fn invalid_reason(name: &str) -> Option<&'static str> {
  let mut chars = name.chars();
  match chars.next() {
    None => return Some("cannot be empty"),
    Some(c) if c.is_ascii_digit() => return Some("cannot start with a digit"),
    Some(_) => {}
  }
  if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
    return Some("only ASCII letters, digits and underscore are allowed");
  }
  if name.len() > MAX_IDENT_LEN {
    return Some("longer than 63 bytes");
  }
  None
}

impl fmt::Display for Ident {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "\"{}\"", self.0)
  }
}

impl AsRef<str> for Ident {
  fn as_ref(&self) -> &str { &self.0 }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn accepts_plain_names() {
    let ident = Ident::new("combined_sellout").unwrap();
    assert_eq!(ident.as_str(), "combined_sellout");
    assert_eq!(ident.to_string(), "\"combined_sellout\"");
  }

  #[test]
  fn rejects_injection_attempts() {
    for bad in ["", "1table", "sales; DROP TABLE x", "a\"b", "qty-1", "año"] {
      assert!(Ident::new(bad).is_err(), "{bad:?} should be rejected");
    }
  }

  #[test]
  fn rejects_overlong_names() {
    assert!(Ident::new("a".repeat(63)).is_ok());
    assert!(Ident::new("a".repeat(64)).is_err());
  }

  #[test]
  fn suffix_is_revalidated() {
    let table = Ident::new("sellout").unwrap();
    assert_eq!(
      table.with_suffix("_backup_20240101_120000").unwrap().as_str(),
      "sellout_backup_20240101_120000"
    );
    assert!(table.with_suffix(" x").is_err());
  }
}
