//! Package metadata recorded on Pull and Prime steps.
//!
//! Metadata arrives from two provenances: *extracted* (derived by
//! inspecting build artifacts, e.g. parsed from a declared `parse-info`
//! file) and *scriptlet* (explicitly set by an override scriptlet). When
//! two instances are combined, non-empty fields of the more authoritative
//! instance win; empty fields never overwrite.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Metadata describing the final package, contributed by one part.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
  /// Identifier common across packaging formats.
  pub common_id: String,
  pub summary: String,
  pub description: String,
  pub version: String,
  pub grade: String,
  pub icon: String,
  pub desktop_file_paths: Vec<String>,
  /// Files this metadata was derived from.
  pub files: Vec<String>,
}

impl Metadata {
  /// Update this metadata from `other`, which takes precedence.
  ///
  /// Each non-empty field of `other` overwrites the corresponding field
  /// here; empty fields leave the existing value alone.
  pub fn update_from(&mut self, other: &Metadata) {
    if !other.common_id.is_empty() {
      self.common_id = other.common_id.clone();
    }
    if !other.summary.is_empty() {
      self.summary = other.summary.clone();
    }
    if !other.description.is_empty() {
      self.description = other.description.clone();
    }
    if !other.version.is_empty() {
      self.version = other.version.clone();
    }
    if !other.grade.is_empty() {
      self.grade = other.grade.clone();
    }
    if !other.icon.is_empty() {
      self.icon = other.icon.clone();
    }
    if !other.desktop_file_paths.is_empty() {
      self.desktop_file_paths = other.desktop_file_paths.clone();
    }
    if !other.files.is_empty() {
      self.files = other.files.clone();
    }
  }

  /// All non-empty fields, keyed by field name.
  pub fn to_map(&self) -> BTreeMap<String, Value> {
    let mut map = BTreeMap::new();
    for (key, value) in self.entries() {
      if !value_is_empty(&value) {
        map.insert(key.to_string(), value);
      }
    }
    map
  }

  /// Field names set in both this metadata and `other`.
  ///
  /// Used to warn when scriptlet metadata shadows extracted metadata.
  pub fn overlap(&self, other: &Metadata) -> BTreeSet<String> {
    let ours = self.to_map();
    other.to_map().into_keys().filter(|k| ours.contains_key(k)).collect()
  }

  /// True when no field is set.
  pub fn is_empty(&self) -> bool {
    self.to_map().is_empty()
  }

  // Explicit field schema; any new field must be added here too.
  fn entries(&self) -> [(&'static str, Value); 8] {
    [
      ("common_id", Value::String(self.common_id.clone())),
      ("summary", Value::String(self.summary.clone())),
      ("description", Value::String(self.description.clone())),
      ("version", Value::String(self.version.clone())),
      ("grade", Value::String(self.grade.clone())),
      ("icon", Value::String(self.icon.clone())),
      (
        "desktop_file_paths",
        Value::Array(self.desktop_file_paths.iter().cloned().map(Value::String).collect()),
      ),
      (
        "files",
        Value::Array(self.files.iter().cloned().map(Value::String).collect()),
      ),
    ]
  }
}

fn value_is_empty(value: &Value) -> bool {
  match value {
    Value::String(s) => s.is_empty(),
    Value::Array(a) => a.is_empty(),
    _ => false,
  }
}
