//! Script executor: applies a SQL file as one batch, falling back to
//! statement-by-statement execution when the batch is rejected for a
//! recoverable reason.
//!
//! # Script shape
//!
//! The fallback splits on every `;`. Scripts must therefore not contain a `;`
//! inside string literals, comments or function bodies, and must not manage
//! their own transactions (`BEGIN`/`COMMIT`).

use std::{fs, path::Path};

use tracing::{error, info, warn};

use crate::{
  Error, Result,
  backend::{Backend, DbError},
  session::Session,
};

/// Statements quoted in logs and errors are cut to this many characters.
pub const STATEMENT_PREVIEW_CHARS: usize = 100;

/// How a script was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptOutcome {
  /// The file does not exist; nothing was executed.
  Missing,
  /// The file holds only whitespace.
  Empty,
  /// The whole script was applied in a single submission.
  Batch,
  /// The script was applied statement by statement. `skipped` counts
  /// statements dropped because the object they create already exists.
  Statements { applied: usize, skipped: usize, total: usize },
  /// The batch failed with an error outside the fallback set and was rolled
  /// back.
  Rejected(DbError),
}

impl ScriptOutcome {
  pub fn succeeded(&self) -> bool {
    match self {
      Self::Missing | Self::Rejected(_) => false,
      Self::Empty | Self::Batch => true,
      Self::Statements { applied, skipped, total } => applied + skipped == *total,
    }
  }
}

/// Split script text on `;`, trimming fragments and dropping empty ones.
pub fn split_statements(content: &str) -> Vec<&str> {
  content
    .split(';')
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .collect()
}

pub(crate) fn preview(statement: &str) -> String {
  statement.chars().take(STATEMENT_PREVIEW_CHARS).collect()
}

/// Apply the script at `path`.
///
/// Returns `Err` only for I/O failures, a failed commit/rollback, or an
/// unrecoverable statement during fallback execution. In every case the
/// session is left without an open transaction.
pub fn apply_script<B: Backend>(
  session: &mut Session<B>,
  path: &Path,
) -> Result<ScriptOutcome> {
  info!(path = %path.display(), "applying SQL script");

  if !path.exists() {
    error!(path = %path.display(), "SQL script not found");
    return Ok(ScriptOutcome::Missing);
  }

  let raw = fs::read_to_string(path).map_err(|source| Error::Io {
    path: path.to_path_buf(),
    source,
  })?;
  let content = raw.trim();
  if content.is_empty() {
    warn!(path = %path.display(), "SQL script is empty");
    return Ok(ScriptOutcome::Empty);
  }

  match session.execute(content) {
    Ok(()) => {
      session.commit()?;
      info!(path = %path.display(), "script applied as a single batch");
      Ok(ScriptOutcome::Batch)
    }
    Err(e) if e.kind.triggers_fallback() => {
      warn!(
        path = %path.display(),
        error = %e,
        "batch execution failed, retrying statement by statement"
      );
      session.rollback()?;
      apply_statements(session, path, content)
    }
    Err(e) => {
      error!(path = %path.display(), error = %e, "script rejected");
      session.rollback()?;
      Ok(ScriptOutcome::Rejected(e))
    }
  }
}

fn apply_statements<B: Backend>(
  session: &mut Session<B>,
  path: &Path,
  content: &str,
) -> Result<ScriptOutcome> {
  let statements = split_statements(content);
  let total = statements.len();
  let mut applied = 0;
  let mut skipped = 0;

  for statement in statements {
    match session.savepoint(|s| s.execute(statement)) {
      Ok(()) => applied += 1,
      Err(e) if e.kind.is_duplicate() => {
        warn!(statement = %preview(statement), error = %e, "object already exists, statement skipped");
        skipped += 1;
      }
      Err(e) => {
        error!(statement = %preview(statement), error = %e, "statement failed");
        if let Err(rollback) = session.rollback() {
          warn!(error = %rollback, "rollback after failed statement also failed");
        }
        return Err(Error::Statement { statement: preview(statement), source: e });
      }
    }
  }

  session.commit()?;
  info!(
    path = %path.display(),
    applied,
    skipped,
    total,
    "script applied statement by statement"
  );
  Ok(ScriptOutcome::Statements { applied, skipped, total })
}
