//! `sellout`: bootstrap the sellout schema, curate the fact table and print
//! validation previews.
//!
//! # Usage
//!
//! ```text
//! sellout --config sellout.toml
//! POSTGRES_HOST=localhost sellout --skip-queries
//! sellout --sqlite ./etl.db
//! ```

mod settings;

use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use sellout_core::{Backend, Session, pipeline};
use sellout_store_postgres::PgBackend;
use sellout_store_sqlite::SqliteBackend;
use settings::Settings;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Sellout schema bootstrap and curation")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "sellout.toml")]
  config: PathBuf,

  /// Run against a SQLite database file instead of Postgres.
  #[arg(long, value_name = "FILE")]
  sqlite: Option<PathBuf>,

  /// Bootstrap and count tables, but leave the fact table untouched.
  #[arg(long)]
  skip_curation: bool,

  /// Do not run the validation queries.
  #[arg(long)]
  skip_queries: bool,
}

fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let settings = Settings::load(&cli.config)?;

  let mut plan = settings.run;
  plan.skip_curation |= cli.skip_curation;
  if cli.skip_queries {
    plan.queries = None;
  }

  info!("starting sellout ETL");
  match &cli.sqlite {
    Some(path) => {
      let backend = SqliteBackend::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
      execute(Session::new(backend), &plan)
    }
    None => {
      let backend =
        PgBackend::connect(&settings.postgres).context("could not connect to the database")?;
      execute(Session::new(backend), &plan)
    }
  }
}

/// Run the pipeline, then close the session whatever the outcome.
fn execute<B: Backend>(mut session: Session<B>, plan: &pipeline::RunPlan) -> anyhow::Result<()> {
  let result = pipeline::run(&mut session, plan);

  match session.close() {
    Ok(()) => info!("database connection closed"),
    Err(e) => warn!(error = %e, "error while closing the database connection"),
  }

  result.context("ETL run failed")?;
  Ok(())
}
