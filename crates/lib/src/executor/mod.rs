//! The lifecycle executor.
//!
//! For every step up to the target, in lifecycle order, and for every
//! selected part, in canonical order, the executor decides one of: skip
//! (already valid), run fresh, re-run dirty, re-run or update outdated,
//! or error. It then performs the action and commits the bookkeeping.
//!
//! Prerequisites are satisfied by re-entrant runs: before a part
//! executes a step, each dependency that has not reached the step's
//! prerequisite is driven there first. An in-progress set turns a
//! mis-configured dependency loop into an error instead of unbounded
//! recursion.

pub mod collision;
pub mod types;

use std::collections::{BTreeSet, HashSet};

use chrono::Utc;
use tracing::{info, warn};

use crate::clean::clean_step;
use crate::packaging::{Packager, PartSummary};
use crate::paths::WorkDirs;
use crate::project::{Part, Project};
use crate::resolver::PartGraph;
use crate::runner::{StepContext, StepDirs, StepOutcome, StepRunner, build_environment};
use crate::state::metadata::Metadata;
use crate::state::store::StateStore;
use crate::state::types::{ProjectRecord, StepState};
use crate::status::StatusCache;
use crate::step::{STEPS, Step};

pub use types::{ExecError, OutdatedAction, RunOptions, RunSummary};

/// Drives parts through the lifecycle, one step at a time.
pub struct LifecycleExecutor<'a> {
  project: &'a Project,
  graph: &'a PartGraph,
  runner: &'a dyn StepRunner,
  packager: &'a dyn Packager,
  options: RunOptions,
  dirs: WorkDirs,
  project_dir: std::path::PathBuf,
  store: StateStore,
  cache: StatusCache,
  in_progress: HashSet<(String, Step)>,
  work_done: bool,
}

impl<'a> LifecycleExecutor<'a> {
  pub fn new(
    project: &'a Project,
    graph: &'a PartGraph,
    project_dir: &std::path::Path,
    dirs: WorkDirs,
    runner: &'a dyn StepRunner,
    packager: &'a dyn Packager,
    options: RunOptions,
  ) -> Self {
    let store = StateStore::new(dirs.state_dir());
    let cache = StatusCache::new(project_dir.to_path_buf());
    Self {
      project,
      graph,
      runner,
      packager,
      options,
      dirs,
      project_dir: project_dir.to_path_buf(),
      store,
      cache,
      in_progress: HashSet::new(),
      work_done: false,
    }
  }

  /// The state store this executor commits to.
  pub fn store(&self) -> &StateStore {
    &self.store
  }

  /// Run the lifecycle until `target` for the named parts (all parts
  /// when `part_names` is `None`).
  pub fn execute(&mut self, target: Step, part_names: Option<&[String]>) -> Result<RunSummary, ExecError> {
    self.work_done = false;

    // Refresh the project option snapshot for this build tree, keeping
    // the original creation timestamp.
    let record = match self.store.get_project()? {
      Some(mut existing) => {
        existing.options = self.project.options.clone();
        existing.updated_at = Utc::now();
        existing
      }
      None => ProjectRecord::new(self.project.options.clone()),
    };
    self.store.put_project(&record)?;

    let full_set = match part_names {
      None => true,
      Some(names) => self.graph.expand(names)?.len() == self.graph.parts().len(),
    };

    self.run(target, part_names, part_names)?;

    let package_metadata = if target == Step::Prime && full_set {
      Some(self.create_package_metadata()?)
    } else {
      None
    };

    Ok(RunSummary {
      work_done: self.work_done,
      package_metadata,
    })
  }

  /// One traversal: every step up to `target`, every selected part.
  ///
  /// `explicit` carries the part names the user requested on the command
  /// line; prerequisite re-entry passes `None` so the forced re-run rule
  /// only applies to user intent.
  fn run(&mut self, target: Step, part_names: Option<&[String]>, explicit: Option<&[String]>) -> Result<(), ExecError> {
    let graph = self.graph;
    let parts: Vec<&'a Part> = match part_names {
      Some(names) => graph.expand(names)?,
      None => graph.parts().iter().collect(),
    };

    for step in STEPS.iter().copied().filter(|s| *s <= target) {
      if step == Step::Stage {
        // Barrier: no part stages until every part's recorded output has
        // been checked for cross-part path collisions.
        collision::check_for_collisions(graph.parts(), &self.store, &mut self.cache, &self.dirs)?;
      }

      for &part in &parts {
        self.process(part, step, target, explicit)?;
      }
    }

    Ok(())
  }

  /// Decide and perform the action for one (part, step) pair.
  fn process(&mut self, part: &'a Part, step: Step, target: Step, explicit: Option<&[String]>) -> Result<(), ExecError> {
    self.in_progress.insert((part.name.clone(), step));
    let result = self.process_inner(part, step, target, explicit);
    self.in_progress.remove(&(part.name.clone(), step));
    result
  }

  fn process_inner(
    &mut self,
    part: &'a Part,
    step: Step,
    target: Step,
    explicit: Option<&[String]>,
  ) -> Result<(), ExecError> {
    let dirty = self.cache.dirty_report(&self.store, part, &self.project.options, step)?;
    if let Some(report) = dirty {
      return self.handle_dirty(part, step, report.summary());
    }

    if self.cache.step_has_run(&self.store, &part.name, step)? {
      // A valid step explicitly requested as this run's final target is
      // redone anyway: the user asked for exactly this.
      let requested_again = explicit.is_some_and(|names| step == target && names.iter().any(|n| n == &part.name));
      if requested_again {
        return self.rerun_step(part, step, "(requested again)");
      }

      if let Some(report) = self.cache.outdated_report(&self.store, part, step)? {
        return self.handle_outdated(part, step, &report.summary());
      }

      info!(part = %part.name, step = %step, "skipping, already ran");
      return Ok(());
    }

    self.run_step(part, step, "")
  }

  fn handle_dirty(&mut self, part: &'a Part, step: Step, summary: String) -> Result<(), ExecError> {
    if !step.clean_if_dirty() && self.options.on_outdated == OutdatedAction::Error {
      return Err(ExecError::StepOutdated {
        part: part.name.clone(),
        step,
        summary,
      });
    }

    self.rerun_step(part, step, &format!("({})", summary))
  }

  fn handle_outdated(&mut self, part: &'a Part, step: Step, summary: &str) -> Result<(), ExecError> {
    if !step.clean_if_dirty() && self.options.on_outdated == OutdatedAction::Error {
      return Err(ExecError::StepOutdated {
        part: part.name.clone(),
        step,
        summary: summary.to_string(),
      });
    }

    if self.runner.supports_update(step) {
      // Outdated (not dirty) results are a valid base: refresh in place.
      self.prepare(part, step)?;
      let ctx = self.context(part, step)?;
      info!(part = %part.name, step = %step, hint = summary, "updating step");
      let outcome = self.runner.update(&ctx).map_err(|source| ExecError::ExternalOperation {
        part: part.name.clone(),
        step,
        source,
      })?;
      return self.commit(part, step, outcome);
    }

    self.rerun_step(part, step, &format!("({})", summary))
  }

  /// Cascade-clean a step and run it fresh.
  fn rerun_step(&mut self, part: &'a Part, step: Step, hint: &str) -> Result<(), ExecError> {
    info!(part = %part.name, step = %step, hint, "cleaning later steps and re-running");
    clean_step(&part.name, step, &self.store, &self.dirs)?;
    for cleaned in std::iter::once(step).chain(step.next_steps().iter().copied()) {
      self.cache.clear(&part.name, cleaned);
    }
    self.run_step(part, step, hint)
  }

  /// Run a step fresh: prerequisites, environment, external operation,
  /// state commit.
  fn run_step(&mut self, part: &'a Part, step: Step, hint: &str) -> Result<(), ExecError> {
    self.prepare(part, step)?;

    let ctx = self.context(part, step)?;
    info!(part = %part.name, step = %step, hint, "running step");
    let outcome = self.runner.run(&ctx).map_err(|source| ExecError::ExternalOperation {
      part: part.name.clone(),
      step,
      source,
    })?;

    self.commit(part, step, outcome)
  }

  /// Drive any unsatisfied prerequisite parts to their required step.
  fn prepare(&mut self, part: &'a Part, step: Step) -> Result<(), ExecError> {
    let graph = self.graph;
    let prerequisite_step = step.prerequisite_step();

    let pending: Vec<String> = graph
      .prerequisites_for(part, step, &self.store, &mut self.cache, &self.project.options)?
      .iter()
      .map(|p| p.name.clone())
      .collect();

    if pending.is_empty() {
      return Ok(());
    }

    for name in &pending {
      if self.in_progress.contains(&(name.clone(), prerequisite_step)) {
        return Err(ExecError::PrerequisiteLoop { part: name.clone() });
      }
    }

    info!(
      part = %part.name,
      step = %prerequisite_step,
      prerequisites = ?pending,
      "part has prerequisites that need to reach an earlier step"
    );
    self.run(prerequisite_step, Some(&pending), None)
  }

  /// Assemble the execution context for one external operation.
  fn context(&mut self, part: &'a Part, step: Step) -> Result<StepContext<'a>, ExecError> {
    let dirs = StepDirs::for_part(&self.dirs, &part.name);
    let environment = build_environment(part, self.project, &dirs);
    let source_dir = part.source().map(|s| self.project_dir.join(s));

    let (staged, dependency_staged) = if step == Step::Prime {
      let staged = self
        .cache
        .step_state(&self.store, &part.name, Step::Stage)?
        .ok_or_else(|| ExecError::MissingRecord {
          part: part.name.clone(),
          step: Step::Stage,
        })?;

      let mut dependency_staged = BTreeSet::new();
      for dependency in self.graph.dependencies_of(&part.name)? {
        if let Some(state) = self.cache.step_state(&self.store, &dependency.name, Step::Stage)? {
          dependency_staged.extend(state.artifacts.files.iter().cloned());
        }
      }

      (Some(staged.artifacts), dependency_staged)
    } else {
      (None, BTreeSet::new())
    };

    Ok(StepContext {
      part,
      step,
      project: self.project,
      dirs,
      environment,
      source_dir,
      staged,
      dependency_staged,
    })
  }

  /// Atomically replace the step's record and mark work done.
  fn commit(&mut self, part: &'a Part, step: Step, outcome: StepOutcome) -> Result<(), ExecError> {
    let now = Utc::now();
    let state = StepState {
      manifest: outcome.manifest,
      artifacts: outcome.artifacts,
      dependencies: part.after.clone(),
      part_properties: part.properties.clone(),
      project_options: self.project.options.clone(),
      source_fingerprint: outcome.source_fingerprint,
      extracted: outcome.extracted,
      scriptlet: outcome.scriptlet,
      created_at: now,
      updated_at: now,
    };

    self.store.put(&part.name, step, &state)?;
    self.cache.clear(&part.name, step);
    self.work_done = true;
    Ok(())
  }

  /// Aggregate the per-part manifests and metadata and invoke the
  /// packaging collaborator.
  fn create_package_metadata(&mut self) -> Result<std::path::PathBuf, ExecError> {
    let mut summaries = Vec::new();

    for part in self.graph.parts() {
      let prime = self
        .cache
        .step_state(&self.store, &part.name, Step::Prime)?
        .ok_or_else(|| ExecError::MissingRecord {
          part: part.name.clone(),
          step: Step::Prime,
        })?;
      let pull = self.cache.step_state(&self.store, &part.name, Step::Pull)?;

      let mut manifest = prime.manifest.clone();
      let mut metadata = Metadata::default();

      if let Some(pull) = &pull {
        for (key, value) in &pull.manifest {
          manifest.entry(key.clone()).or_insert_with(|| value.clone());
        }
        if let Some(extracted) = &pull.extracted {
          metadata.update_from(extracted);
        }
        if let Some(scriptlet) = &pull.scriptlet {
          let shadowed = metadata.overlap(scriptlet);
          if !shadowed.is_empty() {
            warn!(part = %part.name, fields = ?shadowed, "scriptlet metadata overrides extracted metadata");
          }
          metadata.update_from(scriptlet);
        }
      }
      if let Some(scriptlet) = &prime.scriptlet {
        metadata.update_from(scriptlet);
      }

      summaries.push(PartSummary {
        name: part.name.clone(),
        manifest,
        metadata: (!metadata.is_empty()).then_some(metadata),
      });
    }

    let path = self
      .packager
      .create_package(self.project, &summaries, &self.dirs.prime_dir())?;
    Ok(path)
  }
}
