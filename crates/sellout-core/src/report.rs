//! Validation queries and tabular previews of their results.

use std::{fs, path::Path};

use comfy_table::{Table, presets::ASCII_FULL};
use tracing::{error, info, warn};

use crate::{
  Error, Result,
  backend::{Backend, DbError, QueryResult},
  script::{preview, split_statements},
  session::Session,
};

/// Rows rendered per validation query.
pub const DEFAULT_PREVIEW_ROWS: usize = 10;

/// Read a file of `;`-separated queries.
pub fn load_queries(path: &Path) -> Result<Vec<String>> {
  let content = fs::read_to_string(path).map_err(|source| Error::Io {
    path: path.to_path_buf(),
    source,
  })?;
  Ok(split_statements(&content).into_iter().map(str::to_owned).collect())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewOutcome {
  /// `result` holds at most the preview limit; `total_rows` is the full count.
  Rows { result: QueryResult, total_rows: usize },
  Failed(DbError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPreview {
  /// 1-based position in the query file.
  pub index:     usize,
  pub statement: String,
  pub outcome:   PreviewOutcome,
}

/// Run each query in isolation, logging a rendered preview of at most
/// `limit` rows. A failing query is logged and does not stop the rest.
///
/// Queries are expected to be read-only; the unit ends with a rollback.
pub fn run_validation_queries<B: Backend>(
  session: &mut Session<B>,
  queries: &[String],
  limit: usize,
) -> Vec<QueryPreview> {
  let previews = queries
    .iter()
    .enumerate()
    .map(|(i, statement)| {
      let index = i + 1;
      info!(query = index, "running validation query");
      let outcome = match session.savepoint(|s| s.query(statement)) {
        Ok(mut result) => {
          let total_rows = result.rows.len();
          result.rows.truncate(limit);
          info!("\n{}\n", render(&result));
          PreviewOutcome::Rows { result, total_rows }
        }
        Err(e) => {
          error!(query = index, statement = %preview(statement), error = %e, "validation query failed");
          PreviewOutcome::Failed(e)
        }
      };
      QueryPreview { index, statement: statement.clone(), outcome }
    })
    .collect();

  if let Err(e) = session.rollback() {
    warn!(error = %e, "failed to close validation transaction");
  }
  previews
}

/// Render a result set as an ASCII table with a header row.
pub fn render(result: &QueryResult) -> String {
  let mut table = Table::new();
  table.load_preset(ASCII_FULL);
  table.set_header(result.columns.iter());
  for row in &result.rows {
    table.add_row(row.iter().map(|value| value.as_deref().unwrap_or("NULL")));
  }
  table.to_string()
}
