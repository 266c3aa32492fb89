//! Memoized step status for one run.
//!
//! Computing a step's status means reading state records and, for Pull,
//! fingerprinting the source tree. The executor consults status for every
//! (part, step) pair, often repeatedly through prerequisite checks, so
//! results are cached here and invalidated with [`StatusCache::clear`]
//! whenever a step is cleaned or re-committed.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use serde_json::Value;
use tracing::debug;

use crate::fingerprint::{ContentHash, fingerprint_source};
use crate::project::Part;
use crate::state::store::{StateStore, StoreError};
use crate::state::types::StepState;
use crate::status::{DirtyReport, OutdatedReport, dirty_report, outdated_report};
use crate::step::Step;

type Key = (String, Step);

/// Per-run cache of step states and dirty/outdated reports.
#[derive(Debug)]
pub struct StatusCache {
  project_dir: PathBuf,
  states: HashMap<Key, Option<StepState>>,
  dirty: HashMap<Key, Option<DirtyReport>>,
  outdated: HashMap<Key, Option<OutdatedReport>>,
  fingerprints: HashMap<String, Option<ContentHash>>,
}

impl StatusCache {
  /// Create a cache; `project_dir` anchors relative source declarations
  /// for fingerprinting.
  pub fn new(project_dir: PathBuf) -> Self {
    Self {
      project_dir,
      states: HashMap::new(),
      dirty: HashMap::new(),
      outdated: HashMap::new(),
      fingerprints: HashMap::new(),
    }
  }

  /// The recorded state for a part's step, if any.
  pub fn step_state(&mut self, store: &StateStore, part: &str, step: Step) -> Result<Option<StepState>, StoreError> {
    let key = (part.to_string(), step);
    if let Some(cached) = self.states.get(&key) {
      return Ok(cached.clone());
    }
    let state = store.get(part, step)?;
    self.states.insert(key, state.clone());
    Ok(state)
  }

  /// True when the part has a record for the step.
  pub fn step_has_run(&mut self, store: &StateStore, part: &str, step: Step) -> Result<bool, StoreError> {
    Ok(self.step_state(store, part, step)?.is_some())
  }

  /// The dirty report for a part's step, if the step has run and its
  /// governing inputs changed.
  pub fn dirty_report(
    &mut self,
    store: &StateStore,
    part: &Part,
    project_options: &BTreeMap<String, Value>,
    step: Step,
  ) -> Result<Option<DirtyReport>, StoreError> {
    let key = (part.name.clone(), step);
    if let Some(cached) = self.dirty.get(&key) {
      return Ok(cached.clone());
    }

    let report = match self.step_state(store, &part.name, step)? {
      Some(recorded) => dirty_report(step, &recorded, &part.properties, project_options),
      None => None,
    };
    self.dirty.insert(key, report.clone());
    Ok(report)
  }

  /// The outdated report for a part's step, if the step has run and is
  /// stale relative to later activity.
  pub fn outdated_report(
    &mut self,
    store: &StateStore,
    part: &Part,
    step: Step,
  ) -> Result<Option<OutdatedReport>, StoreError> {
    let key = (part.name.clone(), step);
    if let Some(cached) = self.outdated.get(&key) {
      return Ok(cached.clone());
    }

    let report = match self.step_state(store, &part.name, step)? {
      Some(recorded) => {
        let mut earlier = Vec::new();
        for earlier_step in step.previous_steps() {
          if let Some(state) = self.step_state(store, &part.name, *earlier_step)? {
            earlier.push((*earlier_step, state));
          }
        }

        let fingerprint = if step == Step::Pull {
          self.source_fingerprint(part)
        } else {
          None
        };

        outdated_report(step, &recorded, &earlier, fingerprint.as_ref())
      }
      None => None,
    };
    self.outdated.insert(key, report.clone());
    Ok(report)
  }

  /// Whether a step still needs to run: it has no record, is dirty or
  /// outdated, or any earlier step needs to run.
  pub fn step_should_run(
    &mut self,
    store: &StateStore,
    part: &Part,
    project_options: &BTreeMap<String, Value>,
    step: Step,
  ) -> Result<bool, StoreError> {
    for current in step.previous_steps().iter().copied().chain([step]) {
      if !self.step_has_run(store, &part.name, current)?
        || self.dirty_report(store, part, project_options, current)?.is_some()
        || self.outdated_report(store, part, current)?.is_some()
      {
        return Ok(true);
      }
    }
    Ok(false)
  }

  /// Drop cached status for a part's step (after a clean or a commit).
  pub fn clear(&mut self, part: &str, step: Step) {
    let key = (part.to_string(), step);
    self.states.remove(&key);
    self.dirty.remove(&key);
    self.outdated.remove(&key);
    // Later steps' outdated reports referenced this step's timestamp.
    for later in step.next_steps() {
      self.outdated.remove(&(part.to_string(), *later));
    }
  }

  /// Drop the cached source fingerprint for a part (after an update).
  pub fn clear_fingerprint(&mut self, part: &str) {
    self.fingerprints.remove(part);
  }

  fn source_fingerprint(&mut self, part: &Part) -> Option<ContentHash> {
    if let Some(cached) = self.fingerprints.get(&part.name) {
      return cached.clone();
    }

    let fingerprint = part.source().and_then(|source| {
      let path = self.project_dir.join(source);
      match fingerprint_source(&path) {
        Ok(hash) => Some(hash),
        Err(e) => {
          debug!(part = %part.name, error = %e, "source fingerprint unavailable");
          None
        }
      }
    });

    self.fingerprints.insert(part.name.clone(), fingerprint.clone());
    fingerprint
  }
}
