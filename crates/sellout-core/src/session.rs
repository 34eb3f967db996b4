//! [`Session`]: explicit, autocommit-off transaction handling over a
//! [`Backend`].
//!
//! The first statement after a commit or rollback implicitly opens a
//! transaction; nothing is persisted until [`Session::commit`]. Dropping or
//! closing a session rolls back whatever is still open, so the connection is
//! released exactly once on every exit path.

use tracing::warn;

use crate::backend::{Backend, ColumnInfo, DbError, Dialect, QueryResult};

pub struct Session<B: Backend> {
  backend:       B,
  in_tx:         bool,
  savepoint_seq: u64,
}

impl<B: Backend> Session<B> {
  pub fn new(backend: B) -> Self {
    Self { backend, in_tx: false, savepoint_seq: 0 }
  }

  pub fn dialect(&self) -> Dialect { self.backend.dialect() }

  /// Whether a transaction is currently open.
  pub fn in_transaction(&self) -> bool { self.in_tx }

  fn ensure_tx(&mut self) -> Result<(), DbError> {
    if !self.in_tx {
      self.backend.execute("BEGIN")?;
      self.in_tx = true;
    }
    Ok(())
  }

  // ── Statements ────────────────────────────────────────────────────────────

  pub fn execute(&mut self, sql: &str) -> Result<(), DbError> {
    self.ensure_tx()?;
    self.backend.execute(sql)
  }

  pub fn query(&mut self, sql: &str) -> Result<QueryResult, DbError> {
    self.ensure_tx()?;
    self.backend.query(sql)
  }

  pub fn relation_exists(&mut self, name: &str) -> Result<bool, DbError> {
    self.ensure_tx()?;
    self.backend.relation_exists(name)
  }

  pub fn columns(&mut self, table: &str) -> Result<Vec<ColumnInfo>, DbError> {
    self.ensure_tx()?;
    self.backend.columns(table)
  }

  // ── Transaction control ───────────────────────────────────────────────────

  /// Commit the open transaction, if any.
  ///
  /// A failed commit is followed by a rollback so the session never reports
  /// an open transaction it cannot finish.
  pub fn commit(&mut self) -> Result<(), DbError> {
    if !self.in_tx {
      return Ok(());
    }
    self.in_tx = false;
    if let Err(e) = self.backend.execute("COMMIT") {
      if let Err(rollback) = self.backend.execute("ROLLBACK") {
        warn!(error = %rollback, "rollback after failed commit also failed");
      }
      return Err(e);
    }
    Ok(())
  }

  /// Roll back the open transaction, if any.
  pub fn rollback(&mut self) -> Result<(), DbError> {
    if !self.in_tx {
      return Ok(());
    }
    self.in_tx = false;
    self.backend.execute("ROLLBACK")
  }

  /// Run `f` under a savepoint. If `f` fails, only its own effects are undone
  /// and the surrounding transaction stays usable.
  ///
  /// `f` must not commit or roll back the enclosing transaction.
  pub fn savepoint<T>(
    &mut self,
    f: impl FnOnce(&mut Self) -> Result<T, DbError>,
  ) -> Result<T, DbError> {
    self.ensure_tx()?;
    self.savepoint_seq += 1;
    let name = format!("sellout_sp_{}", self.savepoint_seq);
    self.backend.execute(&format!("SAVEPOINT {name}"))?;

    match f(self) {
      Ok(value) => {
        self.backend.execute(&format!("RELEASE SAVEPOINT {name}"))?;
        Ok(value)
      }
      Err(e) => {
        let undo = self
          .backend
          .execute(&format!("ROLLBACK TO SAVEPOINT {name}"))
          .and_then(|()| self.backend.execute(&format!("RELEASE SAVEPOINT {name}")));
        if let Err(undo) = undo {
          warn!(savepoint = %name, error = %undo, "failed to roll back to savepoint");
        }
        Err(e)
      }
    }
  }

  /// Roll back anything still open and release the connection.
  pub fn close(mut self) -> Result<(), DbError> { self.rollback() }
}

impl<B: Backend> Drop for Session<B> {
  fn drop(&mut self) {
    if let Err(e) = self.rollback() {
      warn!(error = %e, "rollback on session drop failed");
    }
  }
}
