//! Implementation of the lifecycle commands (`pull`, `build`, `stage`,
//! `prime`).
//!
//! Each command loads the project configuration, builds the part graph,
//! and asks the executor to reach the target step for the selected parts.

use std::path::Path;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use tracing::info;

use packforge_lib::consts::PROJECT_FILENAME;
use packforge_lib::executor::{LifecycleExecutor, OutdatedAction, RunOptions};
use packforge_lib::packaging::MetadataPackager;
use packforge_lib::paths::WorkDirs;
use packforge_lib::project::config::load_project;
use packforge_lib::resolver::PartGraph;
use packforge_lib::runner::ScriptRunner;
use packforge_lib::step::Step;

/// Run the lifecycle until `step` for the named parts (all when empty).
pub fn cmd_lifecycle(project_dir: &Path, step: Step, parts: &[String], on_outdated: OutdatedAction) -> Result<()> {
  let project_dir = dunce::canonicalize(project_dir).unwrap_or_else(|_| project_dir.to_path_buf());
  let config_path = project_dir.join(PROJECT_FILENAME);

  let (project, declared_parts) = load_project(&config_path).context("failed to load project configuration")?;
  let graph = PartGraph::new(declared_parts).context("invalid part dependencies")?;

  let dirs = WorkDirs::for_project(&project_dir);
  info!(project = %project.name, step = %step, work_dir = %dirs.root().display(), "starting run");

  let runner = ScriptRunner;
  let packager = MetadataPackager;
  let options = RunOptions { on_outdated };
  let mut executor = LifecycleExecutor::new(&project, &graph, &project_dir, dirs, &runner, &packager, options);

  let part_names = (!parts.is_empty()).then_some(parts);
  let summary = executor
    .execute(step, part_names)
    .with_context(|| format!("failed to {} project '{}'", step, project.name))?;

  if summary.work_done {
    println!("{} Reached '{}' for {}", "::".cyan().bold(), step, project.name);
  } else {
    println!(
      "{} The requested action has already been taken. Consider\n\
       specifying parts, or cleaning the steps you want to run again.",
      "::".yellow().bold()
    );
  }

  if let Some(path) = summary.package_metadata {
    println!("{} Package metadata written to {}", "::".green().bold(), path.display());
  }

  Ok(())
}
