//! Dirty and outdated analysis.
//!
//! A recorded step is **dirty** when the declared inputs that govern it
//! (part properties or project options of interest) no longer match the
//! snapshot taken when it ran: the result is invalid and must be redone.
//! A step is **outdated** when it is merely stale (an earlier step has
//! completed more recently, or the source content changed on disk) and
//! may be salvageable through an in-place update. Dirty takes priority;
//! outdated is only evaluated for steps that are not dirty.

pub mod cache;

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use crate::fingerprint::ContentHash;
use crate::state::types::{StepState, select_keys};
use crate::step::Step;

pub use cache::StatusCache;

/// Why a recorded step is invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirtyReport {
  /// Part property names whose values differ from the recorded snapshot.
  pub dirty_properties: BTreeSet<String>,
  /// Project option names whose values differ from the recorded snapshot.
  pub dirty_project_options: BTreeSet<String>,
}

impl DirtyReport {
  pub fn is_empty(&self) -> bool {
    self.dirty_properties.is_empty() && self.dirty_project_options.is_empty()
  }

  /// One-line human summary, e.g. `'source' part property changed`.
  pub fn summary(&self) -> String {
    let mut reasons = Vec::new();

    if !self.dirty_properties.is_empty() {
      let noun = if self.dirty_properties.len() == 1 {
        "part property"
      } else {
        "part properties"
      };
      reasons.push(format!("{} {}", humanize_list(&self.dirty_properties), noun));
    }

    if !self.dirty_project_options.is_empty() {
      let noun = if self.dirty_project_options.len() == 1 {
        "project option"
      } else {
        "project options"
      };
      reasons.push(format!("{} {}", humanize_list(&self.dirty_project_options), noun));
    }

    format!("{} changed", reasons.join(" and "))
  }
}

/// Why a recorded step is stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutdatedReport {
  /// An earlier step that completed more recently than this one.
  pub previous_step_modified: Option<Step>,
  /// The declared source content changed on disk since the step ran.
  pub source_updated: bool,
}

impl OutdatedReport {
  pub fn is_empty(&self) -> bool {
    self.previous_step_modified.is_none() && !self.source_updated
  }

  /// One-line human summary, e.g. `'pull' step and source changed`.
  pub fn summary(&self) -> String {
    let mut reasons = Vec::new();
    if let Some(step) = self.previous_step_modified {
      reasons.push(format!("'{}' step", step));
    }
    if self.source_updated {
      reasons.push("source".to_string());
    }
    format!("{} changed", reasons.join(" and "))
  }

  /// Multi-line detail for error messages.
  pub fn report(&self) -> String {
    let mut lines = String::new();
    if let Some(step) = self.previous_step_modified {
      lines.push_str(&format!("The '{}' step has run more recently.\n", step));
    }
    if self.source_updated {
      lines.push_str("The source has changed on disk.\n");
    }
    lines
  }
}

/// Compare a recorded step against the part's current declaration and
/// the current project options.
///
/// Only keys of interest to the step are compared; the diff is symmetric,
/// so a key present on either side with a differing (or missing) value on
/// the other counts as changed.
pub fn dirty_report(
  step: Step,
  recorded: &StepState,
  current_properties: &BTreeMap<String, Value>,
  current_options: &BTreeMap<String, Value>,
) -> Option<DirtyReport> {
  let property_names = step.part_property_names();
  let option_names = step.project_option_names();

  let report = DirtyReport {
    dirty_properties: differing_keys(
      &recorded.properties_of_interest(property_names),
      &select_keys(current_properties, property_names),
    ),
    dirty_project_options: differing_keys(
      &recorded.options_of_interest(option_names),
      &select_keys(current_options, option_names),
    ),
  };

  (!report.is_empty()).then_some(report)
}

/// Check whether a recorded step is stale.
///
/// `earlier` holds the recorded states of this part's earlier steps, in
/// lifecycle order; `current_fingerprint` is the source fingerprint as it
/// is on disk right now (only consulted for Pull).
pub fn outdated_report(
  step: Step,
  recorded: &StepState,
  earlier: &[(Step, StepState)],
  current_fingerprint: Option<&ContentHash>,
) -> Option<OutdatedReport> {
  let previous_step_modified = earlier
    .iter()
    .find(|(_, state)| state.updated_at > recorded.updated_at)
    .map(|(step, _)| *step);

  let source_updated = step == Step::Pull
    && match (&recorded.source_fingerprint, current_fingerprint) {
      (Some(recorded), Some(current)) => recorded != current,
      _ => false,
    };

  let report = OutdatedReport {
    previous_step_modified,
    source_updated,
  };

  (!report.is_empty()).then_some(report)
}

/// Symmetric key-wise diff: keys present in either map whose values
/// differ (including missing-vs-present) on the other side.
fn differing_keys(a: &BTreeMap<String, Value>, b: &BTreeMap<String, Value>) -> BTreeSet<String> {
  let mut keys = BTreeSet::new();
  for (key, value) in a {
    if b.get(key) != Some(value) {
      keys.insert(key.clone());
    }
  }
  for (key, value) in b {
    if a.get(key) != Some(value) {
      keys.insert(key.clone());
    }
  }
  keys
}

fn humanize_list(items: &BTreeSet<String>) -> String {
  let quoted: Vec<String> = items.iter().map(|i| format!("'{}'", i)).collect();
  match quoted.as_slice() {
    [] => String::new(),
    [only] => only.clone(),
    [first, second] => format!("{} and {}", first, second),
    [init @ .., last] => format!("{}, and {}", init.join(", "), last),
  }
}
