//! Working tree layout.
//!
//! All engine output lives under a single working tree root:
//!
//! ```text
//! <root>/
//! ├── parts/<part>/{src,build,install}/   per-part working directories
//! ├── stage/                              shared staging area
//! ├── prime/                              final packaging-ready layout
//! └── state/                              durable step state records
//! ```
//!
//! The root defaults to the project directory and can be redirected with
//! the `PACKFORGE_WORK_DIR` environment variable (used by tests and by
//! out-of-tree builds).

use std::path::{Path, PathBuf};

use crate::consts::{
  PART_BUILD_DIR, PART_INSTALL_DIR, PART_SRC_DIR, PARTS_DIR, PRIME_DIR, STAGE_DIR, STATE_DIR, WORK_DIR_ENV,
};

/// Resolved directory layout for one working tree.
#[derive(Debug, Clone)]
pub struct WorkDirs {
  root: PathBuf,
}

impl WorkDirs {
  /// Create a layout rooted at an explicit path.
  pub fn new(root: PathBuf) -> Self {
    Self { root }
  }

  /// Resolve the layout for a project directory, honoring the
  /// `PACKFORGE_WORK_DIR` override.
  pub fn for_project(project_dir: &Path) -> Self {
    match std::env::var(WORK_DIR_ENV) {
      Ok(path) if !path.is_empty() => Self::new(PathBuf::from(path)),
      _ => Self::new(project_dir.to_path_buf()),
    }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn parts_dir(&self) -> PathBuf {
    self.root.join(PARTS_DIR)
  }

  /// A part's working directory.
  pub fn part_dir(&self, part: &str) -> PathBuf {
    self.parts_dir().join(part)
  }

  /// Where a part's source is checked out by Pull.
  pub fn part_src_dir(&self, part: &str) -> PathBuf {
    self.part_dir(part).join(PART_SRC_DIR)
  }

  /// A part's build scratch directory.
  pub fn part_build_dir(&self, part: &str) -> PathBuf {
    self.part_dir(part).join(PART_BUILD_DIR)
  }

  /// A part's install output directory (the input to staging).
  pub fn part_install_dir(&self, part: &str) -> PathBuf {
    self.part_dir(part).join(PART_INSTALL_DIR)
  }

  /// The shared staging area.
  pub fn stage_dir(&self) -> PathBuf {
    self.root.join(STAGE_DIR)
  }

  /// The final packaging-ready layout.
  pub fn prime_dir(&self) -> PathBuf {
    self.root.join(PRIME_DIR)
  }

  /// The durable state database root.
  pub fn state_dir(&self) -> PathBuf {
    self.root.join(STATE_DIR)
  }
}
