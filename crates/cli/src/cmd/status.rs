//! Implementation of the `status` command.

use std::path::Path;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;

use packforge_lib::consts::PROJECT_FILENAME;
use packforge_lib::paths::WorkDirs;
use packforge_lib::project::config::load_project;
use packforge_lib::resolver::PartGraph;
use packforge_lib::state::StateStore;
use packforge_lib::status::StatusCache;
use packforge_lib::step::{STEPS, Step};

/// Print each part's recorded lifecycle state.
pub fn cmd_status(project_dir: &Path) -> Result<()> {
  let project_dir = dunce::canonicalize(project_dir).unwrap_or_else(|_| project_dir.to_path_buf());
  let config_path = project_dir.join(PROJECT_FILENAME);

  let (project, declared_parts) = load_project(&config_path).context("failed to load project configuration")?;
  let graph = PartGraph::new(declared_parts).context("invalid part dependencies")?;

  let dirs = WorkDirs::for_project(&project_dir);
  let store = StateStore::new(dirs.state_dir());
  let mut cache = StatusCache::new(project_dir.clone());

  println!("{} {} v{}", "::".cyan().bold(), project.name, project.version);
  println!();
  println!("  {:<20} {:<10} {:<10} {:<10} {:<10}", "part", "pull", "build", "stage", "prime");

  for part in graph.parts() {
    let mut cells = Vec::with_capacity(STEPS.len());
    for step in STEPS {
      cells.push(step_cell(&store, &mut cache, part, step, &project)?);
    }
    println!(
      "  {:<20} {:<10} {:<10} {:<10} {:<10}",
      part.name, cells[0], cells[1], cells[2], cells[3]
    );
  }

  Ok(())
}

fn step_cell(
  store: &StateStore,
  cache: &mut StatusCache,
  part: &packforge_lib::project::Part,
  step: Step,
  project: &packforge_lib::project::Project,
) -> Result<String> {
  if !cache.step_has_run(store, &part.name, step)? {
    return Ok("-".dimmed().to_string());
  }
  if cache.dirty_report(store, part, &project.options, step)?.is_some() {
    return Ok("dirty".red().to_string());
  }
  if cache.outdated_report(store, part, step)?.is_some() {
    return Ok("outdated".yellow().to_string());
  }
  Ok("ok".green().to_string())
}
