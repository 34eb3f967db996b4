//! Schema prober: resolves candidate names against the live catalog.
//!
//! Probes never propagate errors. Each lookup runs under its own savepoint so
//! one failing probe cannot poison the transaction for the next.

use std::fmt;

use tracing::{error, info, warn};

use crate::{
  backend::{Backend, ColumnInfo, DbError},
  ident::Ident,
  session::Session,
};

/// Column types treated as quantities.
pub const NUMERIC_TYPES: &[&str] = &[
  "integer",
  "bigint",
  "smallint",
  "numeric",
  "double precision",
  "real",
];

impl ColumnInfo {
  pub fn is_numeric(&self) -> bool { NUMERIC_TYPES.contains(&self.data_type.as_str()) }
}

// ─── Census ──────────────────────────────────────────────────────────────────

/// Result of probing a single table during a census.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableCount {
  Rows(u64),
  Absent,
  Error(String),
}

impl fmt::Display for TableCount {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Rows(n) => write!(f, "{n}"),
      Self::Absent => f.write_str("absent"),
      Self::Error(e) => write!(f, "error: {e}"),
    }
  }
}

/// Row counts per table name, in the order the names were requested.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Census {
  entries: Vec<(String, TableCount)>,
}

impl Census {
  pub fn get(&self, name: &str) -> Option<&TableCount> {
    self
      .entries
      .iter()
      .find(|(n, _)| n == name)
      .map(|(_, count)| count)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &TableCount)> {
    self.entries.iter().map(|(n, c)| (n.as_str(), c))
  }

  pub fn len(&self) -> usize { self.entries.len() }

  pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

impl fmt::Display for Census {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, (name, count)) in self.entries.iter().enumerate() {
      if i > 0 {
        f.write_str(", ")?;
      }
      write!(f, "{name}={count}")?;
    }
    Ok(())
  }
}

// ─── Probes ──────────────────────────────────────────────────────────────────

/// Return the first candidate that names an existing relation.
///
/// Candidates that are not valid identifiers are skipped.
pub fn find_existing<B: Backend, S: AsRef<str>>(
  session: &mut Session<B>,
  candidates: &[S],
) -> Option<Ident> {
  for candidate in candidates {
    let ident = match Ident::new(candidate.as_ref()) {
      Ok(ident) => ident,
      Err(e) => {
        warn!(candidate = candidate.as_ref(), error = %e, "skipping candidate");
        continue;
      }
    };
    match session.savepoint(|s| s.relation_exists(ident.as_str())) {
      Ok(true) => return Some(ident),
      Ok(false) => {}
      Err(e) => warn!(table = ident.as_str(), error = %e, "existence check failed"),
    }
  }
  None
}

/// Count rows in every named table. Always yields one entry per name and
/// ends the unit of work with a commit.
pub fn census<B: Backend, S: AsRef<str>>(session: &mut Session<B>, names: &[S]) -> Census {
  let entries = names
    .iter()
    .map(|name| {
      let name = name.as_ref();
      (name.to_owned(), probe_table(session, name))
    })
    .collect();

  if let Err(e) = session.commit() {
    warn!(error = %e, "failed to close census transaction");
  }
  Census { entries }
}

fn probe_table<B: Backend>(session: &mut Session<B>, name: &str) -> TableCount {
  let ident = match Ident::new(name) {
    Ok(ident) => ident,
    Err(e) => return TableCount::Error(e.to_string()),
  };

  let counted = session.savepoint(|s| {
    if !s.relation_exists(ident.as_str())? {
      return Ok(None);
    }
    count_rows(s, &ident).map(Some)
  });

  match counted {
    Ok(Some(rows)) => TableCount::Rows(rows),
    Ok(None) => TableCount::Absent,
    Err(e) => {
      error!(table = name, error = %e, "failed to count rows");
      TableCount::Error(e.to_string())
    }
  }
}

pub fn count_rows<B: Backend>(session: &mut Session<B>, table: &Ident) -> Result<u64, DbError> {
  session
    .query(&format!("SELECT COUNT(*) FROM {table}"))?
    .first_u64()
}

/// Pick the quantity-like column of `table`.
///
/// Prefers the first candidate that is a numeric column; otherwise falls back
/// to the first numeric column in ordinal order. Catalog errors yield `None`.
pub fn detect_numeric_column<B: Backend, S: AsRef<str>>(
  session: &mut Session<B>,
  table: &Ident,
  candidates: &[S],
) -> Option<Ident> {
  let columns = match session.savepoint(|s| s.columns(table.as_str())) {
    Ok(columns) => columns,
    Err(e) => {
      error!(table = table.as_str(), error = %e, "failed to read column catalog");
      return None;
    }
  };

  let numeric: Vec<Ident> = columns
    .iter()
    .filter(|c| c.is_numeric())
    .filter_map(|c| Ident::new(c.name.as_str()).ok())
    .collect();

  for candidate in candidates {
    if let Some(found) = numeric.iter().find(|c| c.as_str() == candidate.as_ref()) {
      return Some(found.clone());
    }
  }

  let first = numeric.into_iter().next()?;
  info!(table = table.as_str(), column = first.as_str(), "using first numeric column");
  Some(first)
}

/// Catalog entry for one column of `table`, if it exists.
pub fn find_column<B: Backend>(
  session: &mut Session<B>,
  table: &Ident,
  column: &Ident,
) -> Result<Option<ColumnInfo>, DbError> {
  Ok(
    session
      .columns(table.as_str())?
      .into_iter()
      .find(|c| c.name == column.as_str()),
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn census_display_keeps_input_order() {
    let census = Census {
      entries: vec![
        ("chains".into(), TableCount::Rows(3)),
        ("stores".into(), TableCount::Absent),
        ("sellout".into(), TableCount::Error("permission denied".into())),
      ],
    };
    assert_eq!(
      census.to_string(),
      "chains=3, stores=absent, sellout=error: permission denied"
    );
    assert_eq!(census.get("stores"), Some(&TableCount::Absent));
    assert_eq!(census.get("products"), None);
  }

  #[test]
  fn numeric_types() {
    let col = |t: &str| ColumnInfo { name: "c".into(), data_type: t.into() };
    assert!(col("integer").is_numeric());
    assert!(col("double precision").is_numeric());
    assert!(!col("text").is_numeric());
    assert!(!col("date").is_numeric());
  }
}
