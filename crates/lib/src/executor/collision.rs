//! Cross-part stage collision checking.
//!
//! The shared stage area merges every part's install output, so before
//! any part stages, the recorded Build artifact sets of *all* parts are
//! compared: two parts may only claim the same staged path when the file
//! content is identical.

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::debug;

use crate::fingerprint::{ContentHash, hash_file};
use crate::paths::WorkDirs;
use crate::project::Part;
use crate::state::store::StateStore;
use crate::status::StatusCache;
use crate::step::Step;

use super::types::ExecError;

/// Verify that no two parts stage the same path with different content.
pub fn check_for_collisions(
  parts: &[Part],
  store: &StateStore,
  cache: &mut StatusCache,
  dirs: &WorkDirs,
) -> Result<(), ExecError> {
  let mut claimed: HashMap<PathBuf, (String, Option<ContentHash>)> = HashMap::new();

  for part in parts {
    let Some(state) = cache.step_state(store, &part.name, Step::Build)? else {
      continue;
    };

    let install_dir = dirs.part_install_dir(&part.name);
    for file in &state.artifacts.files {
      let content = hash_file(&install_dir.join(file)).ok();

      match claimed.get(file) {
        Some((first_part, first_content)) => {
          if *first_content != content {
            return Err(ExecError::Collision {
              path: file.clone(),
              first_part: first_part.clone(),
              second_part: part.name.clone(),
            });
          }
          debug!(path = %file.display(), "identical content staged twice, allowed");
        }
        None => {
          claimed.insert(file.clone(), (part.name.clone(), content));
        }
      }
    }
  }

  Ok(())
}
