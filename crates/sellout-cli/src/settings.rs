//! Layered configuration: built-in defaults, then the optional TOML file,
//! then `POSTGRES_*` environment variables.

use std::path::Path;

use anyhow::Context as _;
use sellout_core::pipeline::RunPlan;
use sellout_store_postgres::ConnectionConfig;
use serde::Deserialize;

/// Shape of `sellout.toml`.
///
/// ```toml
/// [postgres]
/// host = "localhost"
///
/// [run]
/// scripts = ["ddl/chains.sql", "ddl/stores.sql"]
/// queries = "sql/queries.sql"
///
/// [run.curation]
/// upper_bound = 500000
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
  pub postgres: ConnectionConfig,
  pub run:      RunPlan,
}

impl Settings {
  /// Load settings from `path` (which may be absent) and the process
  /// environment.
  pub fn load(path: &Path) -> anyhow::Result<Self> { Self::load_with_env(path, None) }

  /// Like [`Settings::load`], reading variables from `env` instead of the
  /// process environment when given.
  pub fn load_with_env(
    path: &Path,
    env: Option<config::Map<String, String>>,
  ) -> anyhow::Result<Self> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      // POSTGRES_HOST -> postgres.host, POSTGRES_DB -> postgres.db, ...
      .add_source(
        config::Environment::with_prefix("POSTGRES")
          .keep_prefix(true)
          .separator("_")
          .try_parsing(true)
          .source(env),
      )
      .build()
      .with_context(|| format!("failed to read config file {}", path.display()))?
      .try_deserialize()
      .context("failed to deserialise settings")
  }
}

#[cfg(test)]
mod tests {
  use std::{fs, path::PathBuf};

  use super::*;

  fn env(pairs: &[(&str, &str)]) -> config::Map<String, String> {
    pairs
      .iter()
      .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
      .collect()
  }

  #[test]
  fn missing_file_yields_defaults() {
    let settings =
      Settings::load_with_env(Path::new("/nonexistent/sellout.toml"), Some(env(&[]))).unwrap();
    assert_eq!(settings.postgres.host, "db");
    assert_eq!(settings.postgres.port, 5432);
    assert_eq!(settings.run.scripts.len(), 4);
    assert_eq!(settings.run.curation.upper_bound, 1_000_000);
    assert_eq!(settings.run.preview_rows, 10);
  }

  #[test]
  fn file_overrides_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sellout.toml");
    fs::write(
      &path,
      r#"
[postgres]
host = "localhost"

[run]
scripts = ["ddl/only.sql"]
census_tables = ["sellout"]

[run.curation]
upper_bound = 500
"#,
    )
    .unwrap();

    let settings = Settings::load_with_env(&path, Some(env(&[]))).unwrap();
    assert_eq!(settings.postgres.host, "localhost");
    assert_eq!(settings.postgres.db, "etl_db");
    assert_eq!(settings.run.scripts, [PathBuf::from("ddl/only.sql")]);
    assert_eq!(settings.run.census_tables, ["sellout"]);
    assert_eq!(settings.run.curation.upper_bound, 500);
    assert_eq!(settings.run.curation.date_column, "daily");
  }

  #[test]
  fn environment_overrides_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sellout.toml");
    fs::write(&path, "[postgres]\nhost = \"localhost\"\n").unwrap();

    let settings = Settings::load_with_env(
      &path,
      Some(env(&[
        ("POSTGRES_HOST", "warehouse"),
        ("POSTGRES_PORT", "6543"),
        ("POSTGRES_DB", "sellout"),
        ("POSTGRES_USER", "loader"),
        ("POSTGRES_PASSWORD", "hunter2"),
      ])),
    )
    .unwrap();
    assert_eq!(settings.postgres.host, "warehouse");
    assert_eq!(settings.postgres.port, 6543);
    assert_eq!(settings.postgres.db, "sellout");
    assert_eq!(settings.postgres.user, "loader");
    assert_eq!(settings.postgres.password, "hunter2");
  }
}
