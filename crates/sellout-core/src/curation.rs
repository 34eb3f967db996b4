//! Curation engine for the sellout fact table.
//!
//! Steps run top-down and each one commits on its own: resolve the table,
//! normalise the date column, resolve the quantity column, quarantine
//! anomalous rows. A failing date conversion is abandoned without aborting
//! the rest; any other failure rolls back the step in flight and is reported
//! as [`CurationOutcome::Failed`].

use chrono::Local;
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::{
  Error, Result,
  backend::Backend,
  ident::{Ident, MAX_IDENT_LEN},
  probe::{detect_numeric_column, find_column, find_existing},
  session::Session,
};

/// Quantities above this are treated as data-entry errors.
pub const DEFAULT_UPPER_BOUND: i64 = 1_000_000;

/// Attempts to find a free backup name before giving up.
const MAX_BACKUP_ATTEMPTS: u32 = 100;

/// Width of the longest collision suffix, `_100`.
const COLLISION_SUFFIX_LEN: usize = 4;

// ─── Plan ────────────────────────────────────────────────────────────────────

/// Names and thresholds the curation pass works with.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CurationPlan {
  /// Fact table names in order of preference.
  pub table_candidates:    Vec<String>,
  pub date_column:         String,
  /// Quantity column names in order of preference.
  pub quantity_candidates: Vec<String>,
  pub upper_bound:         i64,
}

impl Default for CurationPlan {
  fn default() -> Self {
    Self {
      table_candidates:    vec!["combined_sellout".into(), "sales".into(), "sellout".into()],
      date_column:         "daily".into(),
      quantity_candidates: vec![
        "quantity".into(),
        "qty".into(),
        "cantidad".into(),
        "amount".into(),
      ],
      upper_bound:         DEFAULT_UPPER_BOUND,
    }
  }
}

// ─── Outcomes ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateOutcome {
  /// The table has no such column.
  Absent,
  AlreadyDate,
  /// Converted in place with a direct cast.
  Cast,
  /// Rebuilt via a temporary column; values not shaped `YYYY-MM-DD` became
  /// `NULL`.
  Rebuilt,
  /// Both strategies failed; the original column is untouched.
  Abandoned(String),
}

/// Result of the quarantine step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quarantine {
  pub column:  Ident,
  /// Rows matching the anomaly predicate, all of which were removed.
  pub removed: u64,
  /// Snapshot of the full table taken before deletion; `None` when nothing
  /// was removed.
  pub backup:  Option<Ident>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurationReport {
  pub table:      Ident,
  pub date:       DateOutcome,
  /// `None` when the table has no numeric column to validate.
  pub quarantine: Option<Quarantine>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CurationOutcome {
  /// None of the candidate tables exist.
  Skipped,
  Completed(CurationReport),
  Failed { table: Ident, reason: String },
}

impl CurationOutcome {
  pub fn is_failed(&self) -> bool { matches!(self, Self::Failed { .. }) }
}

// ─── Engine ──────────────────────────────────────────────────────────────────

pub fn curate<B: Backend>(session: &mut Session<B>, plan: &CurationPlan) -> CurationOutcome {
  info!("starting curation");

  let Some(table) = find_existing(session, &plan.table_candidates) else {
    warn!(candidates = ?plan.table_candidates, "no sellout table found, skipping curation");
    if let Err(e) = session.rollback() {
      warn!(error = %e, "failed to close probe transaction");
    }
    return CurationOutcome::Skipped;
  };
  info!(table = table.as_str(), "sellout table resolved");

  match curate_table(session, plan, &table) {
    Ok(report) => CurationOutcome::Completed(report),
    Err(e) => {
      error!(table = table.as_str(), error = %e, "curation failed");
      if let Err(rollback) = session.rollback() {
        warn!(error = %rollback, "rollback after failed curation also failed");
      }
      CurationOutcome::Failed { table, reason: e.to_string() }
    }
  }
}

fn curate_table<B: Backend>(
  session: &mut Session<B>,
  plan: &CurationPlan,
  table: &Ident,
) -> Result<CurationReport> {
  let date = match normalize_date_column(session, table, &plan.date_column) {
    Ok(outcome) => outcome,
    Err(e) => {
      warn!(table = table.as_str(), error = %e, "date normalisation skipped");
      session.rollback()?;
      DateOutcome::Abandoned(e.to_string())
    }
  };

  let Some(column) = detect_numeric_column(session, table, &plan.quantity_candidates) else {
    warn!(table = table.as_str(), "no quantity column detected");
    session.commit()?;
    return Ok(CurationReport { table: table.clone(), date, quarantine: None });
  };
  info!(table = table.as_str(), column = column.as_str(), "quantity column detected");

  let quarantine = quarantine_anomalies(session, table, &column, plan.upper_bound)?;
  Ok(CurationReport { table: table.clone(), date, quarantine: Some(quarantine) })
}

// ── Date normalisation ──────────────────────────────────────────────────────

/// Convert `column` of `table` to `DATE` if it exists and is not one already.
pub fn normalize_date_column<B: Backend>(
  session: &mut Session<B>,
  table: &Ident,
  column: &str,
) -> Result<DateOutcome> {
  let column = Ident::new(column)?;
  let Some(info) = find_column(session, table, &column)? else {
    session.commit()?;
    return Ok(DateOutcome::Absent);
  };
  if info.data_type == "date" {
    session.commit()?;
    return Ok(DateOutcome::AlreadyDate);
  }

  info!(
    table = table.as_str(),
    column = column.as_str(),
    from = info.data_type.as_str(),
    "converting column to DATE"
  );

  if let Some(sql) = session.dialect().cast_to_date(table, &column) {
    match session.execute(&sql) {
      Ok(()) => {
        session.commit()?;
        info!(table = table.as_str(), column = column.as_str(), "direct DATE cast succeeded");
        return Ok(DateOutcome::Cast);
      }
      Err(e) => {
        warn!(error = %e, "direct DATE cast failed, rebuilding column");
        session.rollback()?;
      }
    }
  }

  match rebuild_date_column(session, table, &column) {
    Ok(()) => {
      session.commit()?;
      info!(table = table.as_str(), column = column.as_str(), "column rebuilt as DATE");
      Ok(DateOutcome::Rebuilt)
    }
    Err(e) => {
      error!(table = table.as_str(), column = column.as_str(), error = %e, "column rebuild failed");
      session.rollback()?;
      Ok(DateOutcome::Abandoned(e.to_string()))
    }
  }
}

/// Add a nullable date column, fill it where the original is strictly
/// `YYYY-MM-DD`, then swap it in. The caller commits or rolls back all four
/// statements together.
fn rebuild_date_column<B: Backend>(
  session: &mut Session<B>,
  table: &Ident,
  column: &Ident,
) -> Result<()> {
  let temp = column.with_suffix("_temp")?;
  let dialect = session.dialect();

  session.execute(&format!("ALTER TABLE {table} ADD COLUMN {temp} DATE"))?;
  session.execute(&format!(
    "UPDATE {table} SET {temp} = CASE WHEN {} THEN {} ELSE NULL END",
    dialect.iso_date_predicate(column),
    dialect.text_to_date(column),
  ))?;
  session.execute(&format!("ALTER TABLE {table} DROP COLUMN {column}"))?;
  session.execute(&format!("ALTER TABLE {table} RENAME COLUMN {temp} TO {column}"))?;
  Ok(())
}

// ── Quarantine ──────────────────────────────────────────────────────────────

/// Back up `table` and delete rows whose `column` is NULL, non-positive or
/// above `upper_bound`. Backup and delete commit together; with no anomalous
/// rows neither happens.
pub fn quarantine_anomalies<B: Backend>(
  session: &mut Session<B>,
  table: &Ident,
  column: &Ident,
  upper_bound: i64,
) -> Result<Quarantine> {
  let predicate = format!("{column} IS NULL OR {column} <= 0 OR {column} > {upper_bound}");

  let problematic = session
    .query(&format!("SELECT COUNT(*) FROM {table} WHERE {predicate}"))?
    .first_u64()?;
  info!(table = table.as_str(), problematic, "problematic rows detected");

  if problematic == 0 {
    session.commit()?;
    return Ok(Quarantine { column: column.clone(), removed: 0, backup: None });
  }

  let backup = backup_name(session, table)?;
  session.execute(&format!("CREATE TABLE {backup} AS SELECT * FROM {table}"))?;
  session.execute(&format!("DELETE FROM {table} WHERE {predicate}"))?;
  session.commit()?;

  info!(
    table = table.as_str(),
    removed = problematic,
    backup = backup.as_str(),
    "problematic rows quarantined"
  );
  Ok(Quarantine { column: column.clone(), removed: problematic, backup: Some(backup) })
}

/// `<table>_backup_<YYYYMMDD_HHMMSS>`, with a numeric suffix if a backup was
/// already taken within the same second.
fn backup_name<B: Backend>(session: &mut Session<B>, table: &Ident) -> Result<Ident> {
  let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
  let base = backup_base(table, &stamp)?;
  if !session.relation_exists(base.as_str())? {
    return Ok(base);
  }
  for n in 2..=MAX_BACKUP_ATTEMPTS {
    let candidate = base.with_suffix(&format!("_{n}"))?;
    if !session.relation_exists(candidate.as_str())? {
      return Ok(candidate);
    }
  }
  Err(Error::BackupNameExhausted(base.as_str().to_owned()))
}

/// Long table names are cut so the backup name, including a collision
/// suffix, still fits in [`MAX_IDENT_LEN`].
fn backup_base(table: &Ident, stamp: &str) -> Result<Ident> {
  let suffix = format!("_backup_{stamp}");
  let room = MAX_IDENT_LEN.saturating_sub(suffix.len() + COLLISION_SUFFIX_LEN);
  // Ident names are ASCII, so any byte offset is a char boundary.
  let name = table.as_str();
  let head = &name[..name.len().min(room)];
  Ident::new(format!("{head}{suffix}"))
}

#[cfg(test)]
mod tests {
  use std::{cell::RefCell, rc::Rc};

  use super::*;
  use crate::backend::{ColumnInfo, DbError, DbErrorKind, Dialect, QueryResult};

  /// Postgres-flavoured backend that records statements and fails those
  /// containing any of `fail_on`.
  #[derive(Clone)]
  struct Scripted {
    log:     Rc<RefCell<Vec<String>>>,
    fail_on: Vec<&'static str>,
    columns: Vec<ColumnInfo>,
  }

  impl Scripted {
    fn with_text_dates(fail_on: &[&'static str]) -> Self {
      Self {
        log:     Rc::default(),
        fail_on: fail_on.to_vec(),
        columns: vec![
          ColumnInfo { name: "daily".into(), data_type: "text".into() },
          ColumnInfo { name: "quantity".into(), data_type: "integer".into() },
        ],
      }
    }

    fn log(&self) -> Vec<String> { self.log.borrow().clone() }
  }

  impl Backend for Scripted {
    fn dialect(&self) -> Dialect { Dialect::Postgres }

    fn execute(&mut self, sql: &str) -> Result<(), DbError> {
      self.log.borrow_mut().push(sql.to_owned());
      if self.fail_on.iter().any(|pattern| sql.contains(pattern)) {
        return Err(DbError::new(DbErrorKind::Other, "invalid input syntax for type date"));
      }
      Ok(())
    }

    fn query(&mut self, sql: &str) -> Result<QueryResult, DbError> {
      self.execute(sql).map(|()| QueryResult::default())
    }

    fn relation_exists(&mut self, _name: &str) -> Result<bool, DbError> { Ok(false) }

    fn columns(&mut self, _table: &str) -> Result<Vec<ColumnInfo>, DbError> {
      Ok(self.columns.clone())
    }
  }

  fn sellout() -> Ident { Ident::new("sellout").unwrap() }

  fn daily() -> Ident { Ident::new("daily").unwrap() }

  fn cast_sql() -> String { Dialect::Postgres.cast_to_date(&sellout(), &daily()).unwrap() }

  fn rebuild_sql() -> Vec<String> {
    let dialect = Dialect::Postgres;
    vec![
      r#"ALTER TABLE "sellout" ADD COLUMN "daily_temp" DATE"#.to_owned(),
      format!(
        r#"UPDATE "sellout" SET "daily_temp" = CASE WHEN {} THEN {} ELSE NULL END"#,
        dialect.iso_date_predicate(&daily()),
        dialect.text_to_date(&daily()),
      ),
      r#"ALTER TABLE "sellout" DROP COLUMN "daily""#.to_owned(),
      r#"ALTER TABLE "sellout" RENAME COLUMN "daily_temp" TO "daily""#.to_owned(),
    ]
  }

  #[test]
  fn direct_cast_commits_once() {
    let backend = Scripted::with_text_dates(&[]);
    let mut session = Session::new(backend.clone());

    let outcome = normalize_date_column(&mut session, &sellout(), "daily").unwrap();
    assert_eq!(outcome, DateOutcome::Cast);
    assert!(!session.in_transaction());
    assert_eq!(backend.log(), vec!["BEGIN".to_owned(), cast_sql(), "COMMIT".to_owned()]);
  }

  #[test]
  fn failed_cast_rolls_back_then_rebuilds_in_one_transaction() {
    let backend = Scripted::with_text_dates(&["TYPE DATE USING"]);
    let mut session = Session::new(backend.clone());

    let outcome = normalize_date_column(&mut session, &sellout(), "daily").unwrap();
    assert_eq!(outcome, DateOutcome::Rebuilt);
    assert!(!session.in_transaction());

    let mut expected = vec!["BEGIN".to_owned(), cast_sql(), "ROLLBACK".to_owned(), "BEGIN".to_owned()];
    expected.extend(rebuild_sql());
    expected.push("COMMIT".to_owned());
    assert_eq!(backend.log(), expected);
  }

  #[test]
  fn failed_rebuild_is_rolled_back_and_abandoned() {
    let backend = Scripted::with_text_dates(&["TYPE DATE USING", "DROP COLUMN"]);
    let mut session = Session::new(backend.clone());

    let outcome = normalize_date_column(&mut session, &sellout(), "daily").unwrap();
    assert!(matches!(outcome, DateOutcome::Abandoned(_)));
    assert!(!session.in_transaction());

    let log = backend.log();
    assert_eq!(log.last().map(String::as_str), Some("ROLLBACK"));
    assert!(!log.iter().any(|sql| sql == "COMMIT"));
    assert!(!log.iter().any(|sql| sql.contains("RENAME COLUMN")));
  }

  #[test]
  fn date_typed_column_is_not_touched() {
    let mut backend = Scripted::with_text_dates(&[]);
    backend.columns[0].data_type = "date".into();
    let mut session = Session::new(backend.clone());

    let outcome = normalize_date_column(&mut session, &sellout(), "daily").unwrap();
    assert_eq!(outcome, DateOutcome::AlreadyDate);
    assert_eq!(backend.log(), ["BEGIN", "COMMIT"]);
  }

  #[test]
  fn backup_base_fits_identifier_limit() {
    let short = backup_base(&sellout(), "20240101_120000").unwrap();
    assert_eq!(short.as_str(), "sellout_backup_20240101_120000");

    let long = Ident::new("t".repeat(MAX_IDENT_LEN)).unwrap();
    let base = backup_base(&long, "20240101_120000").unwrap();
    assert!(base.as_str().ends_with("_backup_20240101_120000"));
    assert!(base.with_suffix(&format!("_{MAX_BACKUP_ATTEMPTS}")).is_ok());
  }
}
