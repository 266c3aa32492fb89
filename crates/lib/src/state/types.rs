//! Durable state record types.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::fingerprint::ContentHash;
use crate::state::metadata::Metadata;

/// Filesystem artifacts produced by one step, relative to the step's
/// output area.
///
/// `files` and `directories` are owned by the producing part;
/// `dependency_artifacts` are paths inherited from a dependency's output,
/// recorded so Stage and Prime can distinguish "mine" from "theirs".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactSet {
  pub files: BTreeSet<PathBuf>,
  pub directories: BTreeSet<PathBuf>,
  pub dependency_artifacts: BTreeSet<PathBuf>,
}

impl ArtifactSet {
  pub fn is_empty(&self) -> bool {
    self.files.is_empty() && self.directories.is_empty() && self.dependency_artifacts.is_empty()
  }
}

/// One completed execution of a lifecycle step for one part.
///
/// A part has at most one record per step; the record is replaced
/// wholesale on every successful (re-)run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepState {
  /// Plugin-reported metadata recorded for later inspection.
  pub manifest: BTreeMap<String, Value>,

  /// Filesystem artifacts produced by the step.
  pub artifacts: ArtifactSet,

  /// Names of the parts this step depended on when it ran.
  pub dependencies: Vec<String>,

  /// The part's full declared property map at run time.
  pub part_properties: BTreeMap<String, Value>,

  /// The project's full option map at run time.
  pub project_options: BTreeMap<String, Value>,

  /// Content fingerprint of the declared source (recorded by Pull).
  pub source_fingerprint: Option<ContentHash>,

  /// Metadata derived by inspecting artifacts (Pull).
  pub extracted: Option<Metadata>,

  /// Metadata set explicitly by a scriptlet (Pull and Prime).
  pub scriptlet: Option<Metadata>,

  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl StepState {
  /// The recorded part properties restricted to the given names.
  pub fn properties_of_interest(&self, names: &[&str]) -> BTreeMap<String, Value> {
    select_keys(&self.part_properties, names)
  }

  /// The recorded project options restricted to the given names.
  pub fn options_of_interest(&self, names: &[&str]) -> BTreeMap<String, Value> {
    select_keys(&self.project_options, names)
  }
}

/// The project-level option snapshot, stored once per build tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
  pub options: BTreeMap<String, Value>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl ProjectRecord {
  pub fn new(options: BTreeMap<String, Value>) -> Self {
    let now = Utc::now();
    Self {
      options,
      created_at: now,
      updated_at: now,
    }
  }
}

/// Restrict a key/value map to the given keys.
pub fn select_keys(map: &BTreeMap<String, Value>, names: &[&str]) -> BTreeMap<String, Value> {
  map
    .iter()
    .filter(|(k, _)| names.contains(&k.as_str()))
    .map(|(k, v)| (k.clone(), v.clone()))
    .collect()
}
