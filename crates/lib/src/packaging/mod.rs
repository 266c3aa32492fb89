//! Final package metadata assembly.
//!
//! After a full Prime run, the executor hands the aggregated per-part
//! manifests and merged metadata to a [`Packager`]. The default
//! implementation writes `meta/package.yaml` into the prime area; real
//! packaging formats are external collaborators behind the same trait.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::consts::{META_DIR, PACKAGE_METADATA_FILENAME};
use crate::project::Project;
use crate::state::metadata::Metadata;

/// One part's contribution to the final package.
#[derive(Debug, Clone)]
pub struct PartSummary {
  pub name: String,
  /// The part's aggregated step manifests.
  pub manifest: BTreeMap<String, Value>,
  /// The part's merged metadata (extracted, then scriptlet on top).
  pub metadata: Option<Metadata>,
}

/// Errors raised while producing the package metadata.
#[derive(Debug, Error)]
pub enum PackagingError {
  #[error("failed to create metadata directory {path}: {source}")]
  CreateDir {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to write package metadata {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to serialize package metadata: {0}")]
  Serialize(#[source] serde_yaml::Error),
}

/// The packaging collaborator, invoked once at the end of a full Prime run.
pub trait Packager {
  fn create_package(
    &self,
    project: &Project,
    parts: &[PartSummary],
    prime_dir: &Path,
  ) -> Result<PathBuf, PackagingError>;
}

#[derive(Debug, Serialize)]
struct PackageMetadata {
  name: String,
  version: String,
  #[serde(skip_serializing_if = "String::is_empty")]
  summary: String,
  #[serde(skip_serializing_if = "String::is_empty")]
  description: String,
  #[serde(skip_serializing_if = "String::is_empty")]
  grade: String,
  parts: BTreeMap<String, BTreeMap<String, Value>>,
}

/// Writes `meta/package.yaml` from the merged part metadata.
#[derive(Debug, Default)]
pub struct MetadataPackager;

impl Packager for MetadataPackager {
  fn create_package(
    &self,
    project: &Project,
    parts: &[PartSummary],
    prime_dir: &Path,
  ) -> Result<PathBuf, PackagingError> {
    // Parts are given in canonical order; later parts' metadata wins.
    let mut merged = Metadata::default();
    for part in parts {
      if let Some(metadata) = &part.metadata {
        merged.update_from(metadata);
      }
    }

    let package = PackageMetadata {
      name: project.name.clone(),
      version: if merged.version.is_empty() {
        project.version.clone()
      } else {
        merged.version.clone()
      },
      summary: merged.summary,
      description: merged.description,
      grade: merged.grade,
      parts: parts.iter().map(|p| (p.name.clone(), p.manifest.clone())).collect(),
    };

    let meta_dir = prime_dir.join(META_DIR);
    std::fs::create_dir_all(&meta_dir).map_err(|source| PackagingError::CreateDir {
      path: meta_dir.clone(),
      source,
    })?;

    let path = meta_dir.join(PACKAGE_METADATA_FILENAME);
    let content = serde_yaml::to_string(&package).map_err(PackagingError::Serialize)?;
    std::fs::write(&path, content).map_err(|source| PackagingError::Write {
      path: path.clone(),
      source,
    })?;

    info!(path = %path.display(), parts = parts.len(), "package metadata written");
    Ok(path)
  }
}
