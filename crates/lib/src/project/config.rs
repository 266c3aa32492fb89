//! Project configuration loading.
//!
//! The configuration provider parses `packforge.yaml` into the project
//! model. The engine core never parses configuration anywhere else.
//!
//! ```yaml
//! name: hello
//! version: "1.0"
//! options:
//!   target_arch: amd64
//!   parallel_build_count: 4
//! parts:
//!   libgreet:
//!     source: ./libgreet
//!   hello:
//!     source: ./hello
//!     after: [libgreet]
//! ```

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::project::{Part, Project};

/// Errors raised while loading project configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("project file not found: {0}")]
  NotFound(PathBuf),

  #[error("failed to read project file {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse project file {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_yaml::Error,
  },

  #[error("part name '{0}' is not valid (letters, digits, and dashes only)")]
  InvalidPartName(String),

  #[error("project declares no parts")]
  NoParts,
}

#[derive(Debug, Deserialize)]
struct RawProject {
  name: String,
  #[serde(default)]
  version: String,
  #[serde(default)]
  options: BTreeMap<String, serde_yaml::Value>,
  parts: BTreeMap<String, RawPart>,
}

#[derive(Debug, Deserialize)]
struct RawPart {
  #[serde(default)]
  after: Vec<String>,
  #[serde(flatten)]
  properties: BTreeMap<String, serde_yaml::Value>,
}

/// Load a project and its parts from a `packforge.yaml` file.
///
/// Part names are sorted; dependency validation and ordering belong to
/// the resolver.
pub fn load_project(path: &Path) -> Result<(Project, Vec<Part>), ConfigError> {
  if !path.exists() {
    return Err(ConfigError::NotFound(path.to_path_buf()));
  }

  let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
    path: path.to_path_buf(),
    source,
  })?;

  let raw: RawProject = serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
    path: path.to_path_buf(),
    source,
  })?;

  if raw.parts.is_empty() {
    return Err(ConfigError::NoParts);
  }

  let project = Project {
    name: raw.name,
    version: raw.version,
    options: to_json_map(raw.options),
  };

  let mut parts = Vec::with_capacity(raw.parts.len());
  for (name, raw_part) in raw.parts {
    if !is_valid_part_name(&name) {
      return Err(ConfigError::InvalidPartName(name));
    }

    let mut properties = to_json_map(raw_part.properties);
    // Mirror `after` into the property map so dependency edits show up
    // in the Build step's dirty diff.
    properties.insert(
      "after".to_string(),
      Value::Array(raw_part.after.iter().cloned().map(Value::String).collect()),
    );

    parts.push(Part {
      name,
      after: raw_part.after,
      properties,
    });
  }

  debug!(project = %project.name, parts = parts.len(), "project configuration loaded");
  Ok((project, parts))
}

fn to_json_map(map: BTreeMap<String, serde_yaml::Value>) -> BTreeMap<String, Value> {
  map
    .into_iter()
    .filter_map(|(k, v)| serde_json::to_value(v).ok().map(|v| (k, v)))
    .collect()
}

fn is_valid_part_name(name: &str) -> bool {
  !name.is_empty()
    && name
      .chars()
      .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    && !name.starts_with('-')
    && !name.ends_with('-')
}
