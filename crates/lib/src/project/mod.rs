//! Project and part models.
//!
//! A `Project` is an immutable snapshot of the global build options; a
//! `Part` is one named build unit with its currently declared property
//! map. Both are produced by the configuration provider in
//! [`config`](crate::project::config) and are read, never mutated, by
//! the engine.

pub mod config;

use std::collections::BTreeMap;

use serde_json::Value;

/// Global build options, snapshotted once per build tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
  pub name: String,
  pub version: String,
  /// Option map: `target_arch`, `parallel_build_count`, `cross_compile`, …
  pub options: BTreeMap<String, Value>,
}

impl Project {
  pub fn option(&self, key: &str) -> Option<&Value> {
    self.options.get(key)
  }

  pub fn option_str(&self, key: &str) -> Option<&str> {
    self.option(key).and_then(Value::as_str)
  }

  /// Parallel job count for build commands (defaults to 1).
  pub fn parallel_build_count(&self) -> u64 {
    self.option("parallel_build_count").and_then(Value::as_u64).unwrap_or(1)
  }
}

/// One named build unit.
///
/// The property map holds the part's declaration exactly as configured
/// (`plugin`, `source`, `after`, overrides, plugin-specific keys). It is
/// replaced wholesale whenever configuration is reloaded.
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
  pub name: String,
  /// Parts that must reach their prerequisite step before this one runs.
  pub after: Vec<String>,
  pub properties: BTreeMap<String, Value>,
}

impl Part {
  pub fn property(&self, key: &str) -> Option<&Value> {
    self.properties.get(key)
  }

  pub fn property_str(&self, key: &str) -> Option<&str> {
    self.property(key).and_then(Value::as_str)
  }

  /// The declared source location, if any.
  pub fn source(&self) -> Option<&str> {
    self.property_str("source")
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn project_option_accessors() {
    let project = Project {
      name: "demo".to_string(),
      version: "1.0".to_string(),
      options: BTreeMap::from([
        ("target_arch".to_string(), serde_json::json!("arm64")),
        ("parallel_build_count".to_string(), serde_json::json!(8)),
      ]),
    };

    assert_eq!(project.option_str("target_arch"), Some("arm64"));
    assert_eq!(project.parallel_build_count(), 8);
    assert!(project.option("missing").is_none());
  }

  #[test]
  fn parallel_build_count_defaults_to_one() {
    let project = Project {
      name: "demo".to_string(),
      version: "1.0".to_string(),
      options: BTreeMap::new(),
    };
    assert_eq!(project.parallel_build_count(), 1);
  }

  #[test]
  fn part_property_accessors() {
    let part = Part {
      name: "app".to_string(),
      after: vec![],
      properties: BTreeMap::from([("source".to_string(), serde_json::json!("./app-src"))]),
    };

    assert_eq!(part.source(), Some("./app-src"));
    assert!(part.property("plugin").is_none());
  }
}
