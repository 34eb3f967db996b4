//! Top-level run order: bootstrap, census, curation, census, validation.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{error, info, warn};

use crate::{
  Error, Result,
  backend::Backend,
  curation::{CurationOutcome, CurationPlan, curate},
  probe::{Census, census},
  report::{DEFAULT_PREVIEW_ROWS, QueryPreview, load_queries, run_validation_queries},
  script::{ScriptOutcome, apply_script},
  session::Session,
};

/// Everything a run needs besides the connection.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunPlan {
  /// Startup scripts, applied in order. Every one of them is required.
  pub scripts:       Vec<PathBuf>,
  /// Tables counted before and after curation.
  pub census_tables: Vec<String>,
  pub curation:      CurationPlan,
  pub skip_curation: bool,
  /// `;`-separated validation queries; `None` disables the final step.
  pub queries:       Option<PathBuf>,
  pub preview_rows:  usize,
}

impl Default for RunPlan {
  fn default() -> Self {
    Self {
      scripts:       vec![
        "ddl/chains.sql".into(),
        "ddl/stores.sql".into(),
        "ddl/products.sql".into(),
        "ddl/combined_sellout.sql".into(),
      ],
      census_tables: vec![
        "chains".into(),
        "stores".into(),
        "products".into(),
        "sellout".into(),
      ],
      curation:      CurationPlan::default(),
      skip_curation: false,
      queries:       Some("sql/queries.sql".into()),
      preview_rows:  DEFAULT_PREVIEW_ROWS,
    }
  }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
  pub scripts:      Vec<(PathBuf, ScriptOutcome)>,
  pub initial:      Census,
  /// `None` when curation was disabled.
  pub curation:     Option<CurationOutcome>,
  pub final_census: Census,
  pub previews:     Vec<QueryPreview>,
}

/// Apply every script in order, stopping at the first one that does not
/// succeed.
pub fn bootstrap<B: Backend>(
  session: &mut Session<B>,
  scripts: &[PathBuf],
) -> Result<Vec<(PathBuf, ScriptOutcome)>> {
  let mut outcomes = Vec::with_capacity(scripts.len());
  for path in scripts {
    let outcome = apply_script(session, path)?;
    if !outcome.succeeded() {
      error!(path = %path.display(), "critical script failed, aborting bootstrap");
      return Err(Error::ScriptFailed(path.clone()));
    }
    outcomes.push((path.clone(), outcome));
  }
  Ok(outcomes)
}

pub fn run<B: Backend>(session: &mut Session<B>, plan: &RunPlan) -> Result<RunSummary> {
  info!(dialect = %session.dialect(), scripts = plan.scripts.len(), "starting ETL run");

  let scripts = bootstrap(session, &plan.scripts)?;

  let initial = census(session, &plan.census_tables);
  info!(counts = %initial, "row counts after bootstrap");

  let curation = if plan.skip_curation {
    info!("curation disabled");
    None
  } else {
    let outcome = curate(session, &plan.curation);
    match &outcome {
      CurationOutcome::Skipped => warn!("curation found nothing to do"),
      CurationOutcome::Failed { .. } => warn!("curation ran into problems"),
      CurationOutcome::Completed(_) => {}
    }
    Some(outcome)
  };

  let final_census = census(session, &plan.census_tables);
  info!(counts = %final_census, "row counts after curation");

  let previews = match &plan.queries {
    Some(path) => validation_previews(session, path, plan.preview_rows),
    None => Vec::new(),
  };

  info!("ETL run completed");
  Ok(RunSummary { scripts, initial, curation, final_census, previews })
}

fn validation_previews<B: Backend>(
  session: &mut Session<B>,
  path: &Path,
  limit: usize,
) -> Vec<QueryPreview> {
  info!(path = %path.display(), "running validation queries");
  match load_queries(path) {
    Ok(queries) => run_validation_queries(session, &queries, limit),
    Err(e) => {
      warn!(error = %e, "validation queries skipped");
      Vec::new()
    }
  }
}
