//! [`SqliteBackend`] is the SQLite implementation of [`Backend`].

use std::path::Path;

use rusqlite::{Connection, types::ValueRef};
use sellout_core::{Backend, ColumnInfo, DbError, Dialect, QueryResult};

use crate::{
  Error, Result,
  classify::{db_error, normalize_type},
};

/// A sellout backend over one SQLite connection.
pub struct SqliteBackend {
  conn: Connection,
}

impl SqliteBackend {
  /// Open (or create) a database file at `path`.
  pub fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let conn = Connection::open(path).map_err(|source| Error::Open {
      path: path.to_path_buf(),
      source,
    })?;
    Ok(Self { conn })
  }

  /// Open an in-memory database, used by the tests.
  pub fn open_in_memory() -> Result<Self> {
    Ok(Self { conn: Connection::open_in_memory()? })
  }
}

impl Backend for SqliteBackend {
  fn dialect(&self) -> Dialect { Dialect::Sqlite }

  fn execute(&mut self, sql: &str) -> Result<(), DbError> {
    self.conn.execute_batch(sql).map_err(db_error)
  }

  fn query(&mut self, sql: &str) -> Result<QueryResult, DbError> {
    let mut stmt = self.conn.prepare(sql).map_err(db_error)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(str::to_owned).collect();
    let width = columns.len();

    let mut rows = Vec::new();
    let mut cursor = stmt.query([]).map_err(db_error)?;
    while let Some(row) = cursor.next().map_err(db_error)? {
      let values = (0..width)
        .map(|i| row.get_ref(i).map(render_value))
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(db_error)?;
      rows.push(values);
    }

    Ok(QueryResult { columns, rows })
  }

  fn relation_exists(&mut self, name: &str) -> Result<bool, DbError> {
    self
      .conn
      .query_row(
        "SELECT EXISTS (
           SELECT 1 FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?1
         )",
        [name],
        |r| r.get(0),
      )
      .map_err(db_error)
  }

  fn columns(&mut self, table: &str) -> Result<Vec<ColumnInfo>, DbError> {
    let mut stmt = self
      .conn
      .prepare("SELECT name, type FROM pragma_table_info(?1) ORDER BY cid")
      .map_err(db_error)?;
    let columns = stmt
      .query_map([table], |r| {
        let name: String = r.get(0)?;
        let declared: String = r.get(1)?;
        Ok(ColumnInfo { name, data_type: normalize_type(&declared) })
      })
      .map_err(db_error)?
      .collect::<rusqlite::Result<Vec<_>>>()
      .map_err(db_error)?;
    Ok(columns)
  }
}

fn render_value(value: ValueRef<'_>) -> Option<String> {
  match value {
    ValueRef::Null => None,
    ValueRef::Integer(i) => Some(i.to_string()),
    ValueRef::Real(f) => Some(f.to_string()),
    ValueRef::Text(t) => Some(String::from_utf8_lossy(t).into_owned()),
    ValueRef::Blob(b) => Some(format!("\\x{}", hex::encode(b))),
  }
}
