//! The external step operation interface.
//!
//! The executor never performs a step's real work itself: it prepares a
//! [`StepContext`] and hands it to a [`StepRunner`]. Runners are opaque to
//! the scheduler: they either succeed and report what they produced, or
//! fail and abort the run.
//!
//! The execution environment is an explicit value on the context,
//! assembled per call; nothing is ever stored in process-wide state.

pub mod script;

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::PathBuf;

use serde_json::Value;
use thiserror::Error;

use crate::consts::SCRIPTLET_METADATA_FILENAME;
use crate::fingerprint::{ContentHash, DirHashError};
use crate::paths::WorkDirs;
use crate::project::{Part, Project};
use crate::state::metadata::Metadata;
use crate::state::types::ArtifactSet;
use crate::step::Step;

pub use script::ScriptRunner;

/// Resolved directories for one part's step execution.
#[derive(Debug, Clone)]
pub struct StepDirs {
  pub part_dir: PathBuf,
  pub src: PathBuf,
  pub build: PathBuf,
  pub install: PathBuf,
  pub stage: PathBuf,
  pub prime: PathBuf,
}

impl StepDirs {
  pub fn for_part(dirs: &WorkDirs, part: &str) -> Self {
    Self {
      part_dir: dirs.part_dir(part),
      src: dirs.part_src_dir(part),
      build: dirs.part_build_dir(part),
      install: dirs.part_install_dir(part),
      stage: dirs.stage_dir(),
      prime: dirs.prime_dir(),
    }
  }

  /// Where scriptlets write metadata (exposed as `PACKFORGE_METADATA`).
  pub fn scriptlet_metadata_path(&self) -> PathBuf {
    self.part_dir.join(SCRIPTLET_METADATA_FILENAME)
  }
}

/// Everything an external operation needs to execute one step.
#[derive(Debug)]
pub struct StepContext<'a> {
  pub part: &'a Part,
  pub step: Step,
  pub project: &'a Project,
  pub dirs: StepDirs,
  /// The execution environment, passed explicitly into the operation.
  pub environment: Vec<(String, String)>,
  /// Absolute path of the declared source location (Pull).
  pub source_dir: Option<PathBuf>,
  /// The part's own recorded Stage artifacts (Prime).
  pub staged: Option<ArtifactSet>,
  /// Paths staged by this part's dependencies (Prime provenance tagging).
  pub dependency_staged: BTreeSet<PathBuf>,
}

/// What an external operation produced.
#[derive(Debug, Clone, Default)]
pub struct StepOutcome {
  /// Step-specific metadata recorded for later inspection.
  pub manifest: BTreeMap<String, Value>,
  /// Filesystem artifacts, relative to the step's output area.
  pub artifacts: ArtifactSet,
  /// Metadata derived from inspecting artifacts.
  pub extracted: Option<Metadata>,
  /// Metadata set explicitly by a scriptlet.
  pub scriptlet: Option<Metadata>,
  /// Source content fingerprint, reported by Pull.
  pub source_fingerprint: Option<ContentHash>,
}

/// Errors raised by an external step operation.
#[derive(Debug, Error)]
pub enum RunnerError {
  #[error("'{script}' scriptlet failed with exit code {code:?}")]
  ScriptFailed { script: String, code: Option<i32> },

  #[error("failed to spawn scriptlet '{script}': {source}")]
  Spawn {
    script: String,
    #[source]
    source: io::Error,
  },

  #[error("part '{part}' declares missing source {path}")]
  MissingSource { part: String, path: PathBuf },

  #[error("io error on {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse metadata file {path}: {source}")]
  MetadataParse {
    path: PathBuf,
    #[source]
    source: serde_yaml::Error,
  },

  #[error(transparent)]
  Fingerprint(#[from] DirHashError),
}

/// An external step operation.
///
/// `run` must be callable repeatedly from a clean state, and must not
/// corrupt other parts' data in the shared areas on failure.
pub trait StepRunner {
  fn run(&self, ctx: &StepContext<'_>) -> Result<StepOutcome, RunnerError>;

  /// Whether this runner can refresh an outdated step in place, cheaper
  /// than a clean re-run.
  fn supports_update(&self, _step: Step) -> bool {
    false
  }

  /// Refresh an outdated step in place. Only invoked when
  /// `supports_update` returned true for the step.
  fn update(&self, ctx: &StepContext<'_>) -> Result<StepOutcome, RunnerError> {
    self.run(ctx)
  }
}

/// Assemble the environment for one step execution.
pub fn build_environment(part: &Part, project: &Project, dirs: &StepDirs) -> Vec<(String, String)> {
  let mut env = vec![
    ("PACKFORGE_PART_NAME".to_string(), part.name.clone()),
    ("PACKFORGE_PART_SRC".to_string(), dirs.src.display().to_string()),
    ("PACKFORGE_PART_BUILD".to_string(), dirs.build.display().to_string()),
    ("PACKFORGE_PART_INSTALL".to_string(), dirs.install.display().to_string()),
    ("PACKFORGE_STAGE".to_string(), dirs.stage.display().to_string()),
    ("PACKFORGE_PRIME".to_string(), dirs.prime.display().to_string()),
    (
      "PACKFORGE_METADATA".to_string(),
      dirs.scriptlet_metadata_path().display().to_string(),
    ),
    (
      "PACKFORGE_PARALLEL_BUILD_COUNT".to_string(),
      project.parallel_build_count().to_string(),
    ),
  ];

  if let Some(arch) = project.option_str("target_arch") {
    env.push(("PACKFORGE_TARGET_ARCH".to_string(), arch.to_string()));
  }

  env
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::BTreeMap;

  fn sample_part() -> Part {
    Part {
      name: "app".to_string(),
      after: vec![],
      properties: BTreeMap::new(),
    }
  }

  fn sample_project() -> Project {
    Project {
      name: "demo".to_string(),
      version: "1.0".to_string(),
      options: BTreeMap::from([
        ("target_arch".to_string(), serde_json::json!("amd64")),
        ("parallel_build_count".to_string(), serde_json::json!(2)),
      ]),
    }
  }

  #[test]
  fn environment_names_all_working_dirs() {
    let dirs = StepDirs::for_part(&WorkDirs::new(PathBuf::from("/work")), "app");
    let env = build_environment(&sample_part(), &sample_project(), &dirs);
    let map: BTreeMap<_, _> = env.into_iter().collect();

    assert_eq!(map["PACKFORGE_PART_NAME"], "app");
    assert_eq!(map["PACKFORGE_PART_SRC"], "/work/parts/app/src");
    assert_eq!(map["PACKFORGE_PART_INSTALL"], "/work/parts/app/install");
    assert_eq!(map["PACKFORGE_STAGE"], "/work/stage");
    assert_eq!(map["PACKFORGE_PRIME"], "/work/prime");
    assert_eq!(map["PACKFORGE_TARGET_ARCH"], "amd64");
    assert_eq!(map["PACKFORGE_PARALLEL_BUILD_COUNT"], "2");
  }

  #[test]
  fn target_arch_is_omitted_when_unset() {
    let project = Project {
      options: BTreeMap::new(),
      ..sample_project()
    };
    let dirs = StepDirs::for_part(&WorkDirs::new(PathBuf::from("/work")), "app");
    let env = build_environment(&sample_part(), &project, &dirs);
    assert!(env.iter().all(|(k, _)| k != "PACKFORGE_TARGET_ARCH"));
  }
}
