//! Implementation of the `clean` command.

use std::path::Path;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;

use packforge_lib::clean::{clean_part, clean_step};
use packforge_lib::consts::PROJECT_FILENAME;
use packforge_lib::paths::WorkDirs;
use packforge_lib::project::config::load_project;
use packforge_lib::resolver::PartGraph;
use packforge_lib::state::StateStore;
use packforge_lib::step::Step;

/// Clean parts' recorded state and artifacts.
///
/// With `--step`, the cascade starts at that step (cleaning it and every
/// later step); otherwise the whole part is removed.
pub fn cmd_clean(project_dir: &Path, parts: &[String], step: Option<Step>) -> Result<()> {
  let project_dir = dunce::canonicalize(project_dir).unwrap_or_else(|_| project_dir.to_path_buf());
  let config_path = project_dir.join(PROJECT_FILENAME);

  let (_, declared_parts) = load_project(&config_path).context("failed to load project configuration")?;
  let graph = PartGraph::new(declared_parts).context("invalid part dependencies")?;

  let dirs = WorkDirs::for_project(&project_dir);
  let store = StateStore::new(dirs.state_dir());

  let selected: Vec<String> = if parts.is_empty() {
    graph.part_names()
  } else {
    // Validate the requested names before touching anything.
    graph.expand(parts)?.iter().map(|p| p.name.clone()).collect()
  };

  for name in &selected {
    match step {
      Some(step) => {
        clean_step(name, step, &store, &dirs).with_context(|| format!("failed to clean part '{}'", name))?;
        println!("{} Cleaned '{}' from '{}'", "::".cyan().bold(), name, step);
      }
      None => {
        clean_part(name, &store, &dirs).with_context(|| format!("failed to clean part '{}'", name))?;
        println!("{} Cleaned '{}'", "::".cyan().bold(), name);
      }
    }
  }

  Ok(())
}
