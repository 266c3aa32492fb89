//! Source content fingerprints.
//!
//! The outdated analyzer needs a stable token that changes iff a part's
//! declared source content would change. The fingerprint is a SHA-256 over
//! the sorted relative paths, file contents, and symlink targets of the
//! source tree (file metadata such as timestamps is deliberately ignored).

use std::fs;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

/// A full 64-character SHA-256 content fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl std::fmt::Display for ContentHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Error while fingerprinting a source tree.
#[derive(Debug, thiserror::Error)]
pub enum DirHashError {
  #[error("failed to walk {path}: {message}")]
  Walk { path: String, message: String },

  #[error("failed to read file {path}: {message}")]
  ReadFile { path: String, message: String },

  #[error("failed to read symlink {path}: {message}")]
  ReadSymlink { path: String, message: String },
}

/// Fingerprint a declared source location.
///
/// A file source hashes the file alone; a directory source hashes the
/// whole tree. Special files (sockets, devices) are skipped.
pub fn fingerprint_source(path: &Path) -> Result<ContentHash, DirHashError> {
  if path.is_file() {
    return hash_file(path);
  }

  let mut hasher = Sha256::new();

  // WalkDir's sorted traversal yields a deterministic entry order, so
  // entries can be fed straight into the hasher.
  let walker = WalkDir::new(path).sort_by_file_name();
  for entry in walker {
    let entry = entry.map_err(|e| DirHashError::Walk {
      path: path.display().to_string(),
      message: e.to_string(),
    })?;
    let entry_path = entry.path();

    let rel = entry_path.strip_prefix(path).unwrap_or(entry_path);
    if rel.as_os_str().is_empty() {
      continue;
    }
    let rel = rel.to_string_lossy();

    let file_type = entry.file_type();
    if file_type.is_file() {
      let content = hash_file(entry_path)?;
      hasher.update(format!("F:{}:{}\n", rel, content.0).as_bytes());
    } else if file_type.is_dir() {
      hasher.update(format!("D:{}\n", rel).as_bytes());
    } else if file_type.is_symlink() {
      let target = fs::read_link(entry_path).map_err(|e| DirHashError::ReadSymlink {
        path: entry_path.display().to_string(),
        message: e.to_string(),
      })?;
      hasher.update(format!("L:{}:{}\n", rel, target.to_string_lossy()).as_bytes());
    }
  }

  Ok(ContentHash(format!("{:x}", hasher.finalize())))
}

/// Hash a single file's contents.
pub fn hash_file(path: &Path) -> Result<ContentHash, DirHashError> {
  let mut file = fs::File::open(path).map_err(|e| DirHashError::ReadFile {
    path: path.display().to_string(),
    message: e.to_string(),
  })?;

  let mut hasher = Sha256::new();
  let mut buffer = [0u8; 8192];
  loop {
    let read = file.read(&mut buffer).map_err(|e| DirHashError::ReadFile {
      path: path.display().to_string(),
      message: e.to_string(),
    })?;
    if read == 0 {
      break;
    }
    hasher.update(&buffer[..read]);
  }

  Ok(ContentHash(format!("{:x}", hasher.finalize())))
}
