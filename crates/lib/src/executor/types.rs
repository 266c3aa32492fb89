//! Executor options, results, and the error taxonomy.

use std::path::PathBuf;

use thiserror::Error;

use crate::clean::CleanError;
use crate::packaging::PackagingError;
use crate::resolver::{GraphError, PrerequisiteError};
use crate::runner::RunnerError;
use crate::state::store::StoreError;
use crate::step::Step;

/// What to do when a recorded step needs a silent re-run or clean.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutdatedAction {
  /// Clean and re-run (or update in place) with a logged hint.
  #[default]
  Clean,
  /// Fail the run with a `StepOutdated` error.
  Error,
}

impl std::str::FromStr for OutdatedAction {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "clean" => Ok(OutdatedAction::Clean),
      "error" => Ok(OutdatedAction::Error),
      other => Err(format!("unknown outdated action '{}', expected 'clean' or 'error'", other)),
    }
  }
}

/// Global policy knobs for one run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
  pub on_outdated: OutdatedAction,
}

/// What a run accomplished.
#[derive(Debug, Clone)]
pub struct RunSummary {
  /// Whether any external operation actually ran.
  pub work_done: bool,
  /// Where the final package metadata was written, for full Prime runs.
  pub package_metadata: Option<PathBuf>,
}

/// Errors that abort a lifecycle run.
#[derive(Debug, Error)]
pub enum ExecError {
  #[error(transparent)]
  Graph(#[from] GraphError),

  #[error(transparent)]
  Store(#[from] StoreError),

  /// A record the scheduler relies on is missing; guessing is unsafe.
  #[error("state record missing for part '{part}' step '{step}'")]
  MissingRecord { part: String, step: Step },

  /// A step needs re-running but the policy forbids doing it silently.
  #[error("the '{step}' step of part '{part}' is out of date ({summary}); clean that part to continue")]
  StepOutdated { part: String, step: Step, summary: String },

  /// The external operation for a step failed.
  #[error("the '{step}' step of part '{part}' failed: {source}")]
  ExternalOperation {
    part: String,
    step: Step,
    #[source]
    source: RunnerError,
  },

  /// Two parts stage the same path with different content.
  #[error("parts '{first_part}' and '{second_part}' both stage '{path}' with different content")]
  Collision {
    path: PathBuf,
    first_part: String,
    second_part: String,
  },

  /// A prerequisite chain re-entered a (part, step) already in progress.
  #[error("prerequisite loop detected while satisfying part '{part}'")]
  PrerequisiteLoop { part: String },

  #[error(transparent)]
  Clean(#[from] CleanError),

  #[error(transparent)]
  Packaging(#[from] PackagingError),
}

impl From<PrerequisiteError> for ExecError {
  fn from(err: PrerequisiteError) -> Self {
    match err {
      PrerequisiteError::Graph(e) => ExecError::Graph(e),
      PrerequisiteError::Store(e) => ExecError::Store(e),
    }
  }
}
