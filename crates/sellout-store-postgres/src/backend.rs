//! [`PgBackend`] is the Postgres implementation of [`Backend`].

use postgres::{Client, NoTls, SimpleQueryMessage};
use sellout_core::{Backend, ColumnInfo, DbError, Dialect, QueryResult};
use tracing::info;

use crate::{ConnectionConfig, Error, Result, classify::db_error};

// ─── Catalog queries ─────────────────────────────────────────────────────────

// The relation an unqualified, exact-case name resolves to on the search path.
// Existence checks and column lookups must agree on it.
macro_rules! visible_relation {
  () => {
    "c.relname = $1::text
       AND pg_catalog.pg_table_is_visible(c.oid)
       AND c.relkind IN ('r', 'p', 'v', 'm', 'f')"
  };
}

const RELATION_EXISTS_SQL: &str = concat!(
  "SELECT EXISTS (SELECT 1 FROM pg_catalog.pg_class c WHERE ",
  visible_relation!(),
  ")"
);

// format_type yields the information_schema spellings for the types the engine
// inspects (integer, numeric, double precision, date, ...).
const COLUMNS_SQL: &str = concat!(
  "SELECT a.attname::text, pg_catalog.format_type(a.atttypid, NULL)
     FROM pg_catalog.pg_attribute a
     JOIN pg_catalog.pg_class c ON c.oid = a.attrelid
    WHERE ",
  visible_relation!(),
  "
      AND a.attnum > 0
      AND NOT a.attisdropped
    ORDER BY a.attnum"
);

// ─── Backend ─────────────────────────────────────────────────────────────────

/// A sellout backend over one Postgres connection.
///
/// Statements go through the simple query protocol, so a whole script can be
/// submitted as one batch and result values arrive as text.
pub struct PgBackend {
  client: Client,
}

impl PgBackend {
  pub fn connect(config: &ConnectionConfig) -> Result<Self> {
    let client = config
      .to_pg_config()
      .connect(NoTls)
      .map_err(|source| Error::Connect {
        host: config.host.clone(),
        port: config.port,
        dbname: config.db.clone(),
        source,
      })?;
    info!(host = %config.host, port = config.port, db = %config.db, "connected to Postgres");
    Ok(Self { client })
  }
}

impl Backend for PgBackend {
  fn dialect(&self) -> Dialect { Dialect::Postgres }

  fn execute(&mut self, sql: &str) -> Result<(), DbError> {
    self.client.batch_execute(sql).map_err(db_error)
  }

  fn query(&mut self, sql: &str) -> Result<QueryResult, DbError> {
    let mut result = QueryResult::default();
    for message in self.client.simple_query(sql).map_err(db_error)? {
      match message {
        // Sent before any rows, so empty results still carry headers.
        SimpleQueryMessage::RowDescription(columns) => {
          result.columns = columns.iter().map(|c| c.name().to_owned()).collect();
        }
        SimpleQueryMessage::Row(row) => {
          if result.columns.is_empty() {
            result.columns = row.columns().iter().map(|c| c.name().to_owned()).collect();
          }
          result
            .rows
            .push((0..row.len()).map(|i| row.get(i).map(str::to_owned)).collect());
        }
        _ => {}
      }
    }
    Ok(result)
  }

  fn relation_exists(&mut self, name: &str) -> Result<bool, DbError> {
    let row = self
      .client
      .query_one(RELATION_EXISTS_SQL, &[&name])
      .map_err(db_error)?;
    Ok(row.get(0))
  }

  fn columns(&mut self, table: &str) -> Result<Vec<ColumnInfo>, DbError> {
    let rows = self.client.query(COLUMNS_SQL, &[&table]).map_err(db_error)?;
    Ok(
      rows
        .iter()
        .map(|r| ColumnInfo { name: r.get(0), data_type: r.get(1) })
        .collect(),
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn existence_and_columns_resolve_the_same_relation() {
    let predicate = visible_relation!();
    assert!(RELATION_EXISTS_SQL.contains(predicate));
    assert!(COLUMNS_SQL.contains(predicate));
    assert!(predicate.contains("pg_table_is_visible"));
    assert!(!COLUMNS_SQL.contains("current_schema()"));
  }
}
