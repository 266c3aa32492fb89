//! Cascading step invalidation.
//!
//! Cleaning a step removes its on-disk artifacts and its state record,
//! then does the same for every later step of the same part: later steps
//! consumed the cleaned step's output, so their records are invalid too.
//!
//! Deletion runs in strictly forward order (the invalidated step first,
//! then each later step) so a crash mid-cascade leaves "everything from
//! here on is gone" rather than a gap. Shared-area cleaning removes only
//! the paths the part's record owns; other parts' files are never
//! touched.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::paths::WorkDirs;
use crate::state::store::{StateStore, StoreError};
use crate::state::types::StepState;
use crate::step::Step;

/// Errors raised while cleaning.
#[derive(Debug, Error)]
pub enum CleanError {
  #[error(transparent)]
  Store(#[from] StoreError),

  #[error("failed to remove {path}: {source}")]
  Remove {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Clean a step and every later step for the same part.
pub fn clean_step(part: &str, step: Step, store: &StateStore, dirs: &WorkDirs) -> Result<(), CleanError> {
  for current in std::iter::once(step).chain(step.next_steps().iter().copied()) {
    let Some(state) = store.get(part, current)? else {
      // Nothing recorded for this step; the forward cascade keeps the
      // invariant that later steps have no records either.
      continue;
    };

    info!(part, step = %current, "cleaning step");
    remove_step_artifacts(part, current, &state, dirs)?;
    store.delete(part, current)?;
  }
  Ok(())
}

/// Clean every step of a part and its working directory.
pub fn clean_part(part: &str, store: &StateStore, dirs: &WorkDirs) -> Result<(), CleanError> {
  clean_step(part, Step::Pull, store, dirs)?;
  store.delete_part(part)?;
  remove_dir_if_present(&dirs.part_dir(part))
}

fn remove_step_artifacts(part: &str, step: Step, state: &StepState, dirs: &WorkDirs) -> Result<(), CleanError> {
  match step {
    Step::Pull => remove_dir_if_present(&dirs.part_src_dir(part)),
    Step::Build => {
      remove_dir_if_present(&dirs.part_build_dir(part))?;
      remove_dir_if_present(&dirs.part_install_dir(part))
    }
    Step::Stage => remove_owned_paths(state, &dirs.stage_dir()),
    Step::Prime => remove_owned_paths(state, &dirs.prime_dir()),
  }
}

/// Remove the files a part's record owns in a shared area, then prune
/// any of its recorded directories that became empty.
fn remove_owned_paths(state: &StepState, area: &Path) -> Result<(), CleanError> {
  for file in &state.artifacts.files {
    let path = area.join(file);
    match fs::remove_file(&path) {
      Ok(()) => debug!(path = %path.display(), "removed owned file"),
      Err(e) if e.kind() == io::ErrorKind::NotFound => {}
      Err(source) => return Err(CleanError::Remove { path, source }),
    }
  }

  // Reverse lexicographic order visits nested directories before their
  // parents.
  for dir in state.artifacts.directories.iter().rev() {
    let path = area.join(dir);
    // Only empty directories go; another part may still own content.
    let _ = fs::remove_dir(&path);
  }

  Ok(())
}

fn remove_dir_if_present(path: &Path) -> Result<(), CleanError> {
  match fs::remove_dir_all(path) {
    Ok(()) => Ok(()),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
    Err(source) => Err(CleanError::Remove {
      path: path.to_path_buf(),
      source,
    }),
  }
}
