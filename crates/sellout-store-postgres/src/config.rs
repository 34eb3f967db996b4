//! Connection parameters.
//!
//! Deserialised from the `[postgres]` section of the config file, with
//! `POSTGRES_HOST`, `POSTGRES_PORT`, `POSTGRES_DB`, `POSTGRES_USER` and
//! `POSTGRES_PASSWORD` taking precedence.

use std::{fmt, time::Duration};

use serde::Deserialize;

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
  pub host:                 String,
  pub port:                 u16,
  pub db:                   String,
  pub user:                 String,
  pub password:             String,
  pub connect_timeout_secs: u64,
}

impl Default for ConnectionConfig {
  fn default() -> Self {
    Self {
      host:                 "db".into(),
      port:                 5432,
      db:                   "etl_db".into(),
      user:                 "etl_user".into(),
      password:             "etl_pass".into(),
      connect_timeout_secs: 10,
    }
  }
}

impl ConnectionConfig {
  pub fn to_pg_config(&self) -> postgres::Config {
    let mut config = postgres::Config::new();
    config
      .host(&self.host)
      .port(self.port)
      .dbname(&self.db)
      .user(&self.user)
      .password(&self.password)
      .connect_timeout(Duration::from_secs(self.connect_timeout_secs));
    config
  }
}

// Keep the password out of logs.
impl fmt::Debug for ConnectionConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ConnectionConfig")
      .field("host", &self.host)
      .field("port", &self.port)
      .field("db", &self.db)
      .field("user", &self.user)
      .field("password", &"<redacted>")
      .field("connect_timeout_secs", &self.connect_timeout_secs)
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_match_compose_setup() {
    let config = ConnectionConfig::default();
    assert_eq!(config.host, "db");
    assert_eq!(config.port, 5432);
    assert_eq!(config.db, "etl_db");
    assert_eq!(config.user, "etl_user");
    assert_eq!(config.connect_timeout_secs, 10);
  }

  #[test]
  fn pg_config_carries_timeout() {
    let pg = ConnectionConfig::default().to_pg_config();
    assert_eq!(pg.get_connect_timeout(), Some(&Duration::from_secs(10)));
    assert_eq!(pg.get_dbname(), Some("etl_db"));
    assert_eq!(pg.get_ports(), &[5432]);
  }

  #[test]
  fn debug_redacts_password() {
    let rendered = format!("{:?}", ConnectionConfig::default());
    assert!(!rendered.contains("etl_pass"));
    assert!(rendered.contains("<redacted>"));
  }
}
