//! Durable step-state persistence.
//!
//! Every record is a pretty-printed JSON file, written atomically (temp
//! file + rename) so a crash never leaves a torn record behind.
//!
//! # Storage Layout
//!
//! ```text
//! state/
//! ├── project.json                 ProjectRecord
//! └── parts/<part>/<step>.json     one StepState per completed step
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use crate::consts::PROJECT_STATE_FILENAME;
use crate::state::types::{ProjectRecord, StepState};
use crate::step::Step;

/// Errors raised by the state store.
#[derive(Debug, Error)]
pub enum StoreError {
  #[error("failed to create state directory: {0}")]
  CreateDir(#[source] io::Error),

  #[error("failed to read state record: {0}")]
  Read(#[source] io::Error),

  #[error("failed to write state record: {0}")]
  Write(#[source] io::Error),

  #[error("failed to parse state record {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("failed to serialize state record: {0}")]
  Serialize(#[source] serde_json::Error),

  #[error("failed to remove state record: {0}")]
  Remove(#[source] io::Error),
}

/// Keyed, durable storage of per-part, per-step records.
#[derive(Debug, Clone)]
pub struct StateStore {
  base_path: PathBuf,
}

impl StateStore {
  /// Create a store rooted at the given state directory.
  pub fn new(base_path: PathBuf) -> Self {
    Self { base_path }
  }

  pub fn base_path(&self) -> &Path {
    &self.base_path
  }

  fn project_path(&self) -> PathBuf {
    self.base_path.join(PROJECT_STATE_FILENAME)
  }

  fn part_dir(&self, part: &str) -> PathBuf {
    self.base_path.join("parts").join(part)
  }

  fn step_path(&self, part: &str, step: Step) -> PathBuf {
    self.part_dir(part).join(format!("{}.json", step.name()))
  }

  /// Load the record for a part's step, if one exists.
  pub fn get(&self, part: &str, step: Step) -> Result<Option<StepState>, StoreError> {
    read_json(&self.step_path(part, step))
  }

  /// True when a record exists for the part's step.
  pub fn has(&self, part: &str, step: Step) -> bool {
    self.step_path(part, step).exists()
  }

  /// Store a record, replacing any prior record for that part + step.
  ///
  /// The write is durably committed before this returns; on failure the
  /// prior record is retained unchanged.
  pub fn put(&self, part: &str, step: Step, state: &StepState) -> Result<(), StoreError> {
    let dir = self.part_dir(part);
    fs::create_dir_all(&dir).map_err(StoreError::CreateDir)?;
    write_json_atomic(&self.step_path(part, step), state)?;
    debug!(part, step = %step, "step state committed");
    Ok(())
  }

  /// Delete the record for a part's step. Absent records are a no-op.
  pub fn delete(&self, part: &str, step: Step) -> Result<(), StoreError> {
    let path = self.step_path(part, step);
    match fs::remove_file(&path) {
      Ok(()) => {
        debug!(part, step = %step, "step state removed");
        Ok(())
      }
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
      Err(e) => Err(StoreError::Remove(e)),
    }
  }

  /// Remove every record for a part, including its state directory.
  pub fn delete_part(&self, part: &str) -> Result<(), StoreError> {
    match fs::remove_dir_all(self.part_dir(part)) {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
      Err(e) => Err(StoreError::Remove(e)),
    }
  }

  /// Load the project option snapshot, if one has been recorded.
  pub fn get_project(&self) -> Result<Option<ProjectRecord>, StoreError> {
    read_json(&self.project_path())
  }

  /// Store the project option snapshot, replacing any prior one.
  pub fn put_project(&self, record: &ProjectRecord) -> Result<(), StoreError> {
    fs::create_dir_all(&self.base_path).map_err(StoreError::CreateDir)?;
    write_json_atomic(&self.project_path(), record)
  }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
  let content = match fs::read_to_string(path) {
    Ok(content) => content,
    Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
    Err(e) => return Err(StoreError::Read(e)),
  };

  let value = serde_json::from_str(&content).map_err(|source| StoreError::Parse {
    path: path.to_path_buf(),
    source,
  })?;
  Ok(Some(value))
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
  let content = serde_json::to_string_pretty(value).map_err(StoreError::Serialize)?;

  let mut temp_path = path.as_os_str().to_owned();
  temp_path.push(".tmp");
  let temp_path = PathBuf::from(temp_path);

  fs::write(&temp_path, &content).map_err(StoreError::Write)?;
  fs::rename(&temp_path, path).map_err(StoreError::Write)?;
  Ok(())
}
