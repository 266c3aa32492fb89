//! Lifecycle steps.
//!
//! A part moves through the totally ordered steps Pull → Build → Stage →
//! Prime. Each step knows, as a pure function of its kind, which declared
//! part properties and project options govern it; the dirty analyzer
//! ignores changes to everything else.

use serde::{Deserialize, Serialize};

/// One phase of a part's lifecycle.
///
/// The derived `Ord` follows lifecycle order: `Pull < Build < Stage < Prime`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
  Pull,
  Build,
  Stage,
  Prime,
}

/// All steps in lifecycle order.
pub const STEPS: [Step; 4] = [Step::Pull, Step::Build, Step::Stage, Step::Prime];

impl Step {
  /// Lowercase step name, matching the on-disk state file names.
  pub fn name(self) -> &'static str {
    match self {
      Step::Pull => "pull",
      Step::Build => "build",
      Step::Stage => "stage",
      Step::Prime => "prime",
    }
  }

  /// Steps strictly before this one, in lifecycle order.
  pub fn previous_steps(self) -> &'static [Step] {
    match self {
      Step::Pull => &[],
      Step::Build => &[Step::Pull],
      Step::Stage => &[Step::Pull, Step::Build],
      Step::Prime => &[Step::Pull, Step::Build, Step::Stage],
    }
  }

  /// Steps strictly after this one, in lifecycle order.
  pub fn next_steps(self) -> &'static [Step] {
    match self {
      Step::Pull => &[Step::Build, Step::Stage, Step::Prime],
      Step::Build => &[Step::Stage, Step::Prime],
      Step::Stage => &[Step::Prime],
      Step::Prime => &[],
    }
  }

  /// Whether a dirty record for this step is cleaned silently.
  ///
  /// Stage and Prime are cheap to redo from recorded artifacts, so they
  /// never consult the outdated policy. Pull and Build defer to it.
  pub fn clean_if_dirty(self) -> bool {
    matches!(self, Step::Stage | Step::Prime)
  }

  /// The minimum step a dependency must have reached before a part may
  /// run this step.
  ///
  /// Builds consume dependency artifacts from the shared stage area, so
  /// everything up to Stage requires dependencies to be staged. Priming a
  /// part requires its dependencies to be primed.
  pub fn prerequisite_step(self) -> Step {
    match self {
      Step::Pull | Step::Build | Step::Stage => Step::Stage,
      Step::Prime => Step::Prime,
    }
  }

  /// Declared part property names that govern this step.
  pub fn part_property_names(self) -> &'static [&'static str] {
    match self {
      Step::Pull => &[
        "plugin",
        "source",
        "source-type",
        "source-subdir",
        "source-branch",
        "source-tag",
        "source-commit",
        "source-depth",
        "override-pull",
        "parse-info",
        "stage-packages",
      ],
      Step::Build => &[
        "plugin",
        "after",
        "build-packages",
        "disable-parallel",
        "organize",
        "override-build",
      ],
      Step::Stage => &["stage", "filesets", "override-stage"],
      Step::Prime => &["prime", "override-prime"],
    }
  }

  /// Project option names that govern this step.
  pub fn project_option_names(self) -> &'static [&'static str] {
    match self {
      Step::Pull => &["target_arch"],
      Step::Build => &["target_arch", "parallel_build_count", "cross_compile"],
      Step::Stage | Step::Prime => &[],
    }
  }
}

impl std::fmt::Display for Step {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.name())
  }
}

impl std::str::FromStr for Step {
  type Err = UnknownStep;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "pull" => Ok(Step::Pull),
      "build" => Ok(Step::Build),
      "stage" => Ok(Step::Stage),
      "prime" => Ok(Step::Prime),
      other => Err(UnknownStep(other.to_string())),
    }
  }
}

/// Error parsing a step name.
#[derive(Debug, thiserror::Error)]
#[error("unknown step '{0}', expected one of: pull, build, stage, prime")]
pub struct UnknownStep(pub String);

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn steps_are_totally_ordered() {
    assert!(Step::Pull < Step::Build);
    assert!(Step::Build < Step::Stage);
    assert!(Step::Stage < Step::Prime);
  }

  #[test]
  fn previous_and_next_partition_the_order() {
    for step in STEPS {
      let mut all: Vec<Step> = step.previous_steps().to_vec();
      all.push(step);
      all.extend_from_slice(step.next_steps());
      assert_eq!(all, STEPS.to_vec());
    }
  }

  #[test]
  fn stage_and_prime_clean_silently() {
    assert!(!Step::Pull.clean_if_dirty());
    assert!(!Step::Build.clean_if_dirty());
    assert!(Step::Stage.clean_if_dirty());
    assert!(Step::Prime.clean_if_dirty());
  }

  #[test]
  fn build_requires_staged_dependencies() {
    assert_eq!(Step::Build.prerequisite_step(), Step::Stage);
    assert_eq!(Step::Prime.prerequisite_step(), Step::Prime);
  }

  #[test]
  fn source_governs_pull_only() {
    assert!(Step::Pull.part_property_names().contains(&"source"));
    assert!(!Step::Build.part_property_names().contains(&"source"));
    assert!(!Step::Stage.part_property_names().contains(&"source"));
    assert!(!Step::Prime.part_property_names().contains(&"source"));
  }

  #[test]
  fn parses_from_str() {
    assert_eq!("pull".parse::<Step>().unwrap(), Step::Pull);
    assert_eq!("prime".parse::<Step>().unwrap(), Step::Prime);
    assert!("snap".parse::<Step>().is_err());
  }

  #[test]
  fn serializes_lowercase() {
    assert_eq!(serde_json::to_string(&Step::Build).unwrap(), "\"build\"");
    let step: Step = serde_json::from_str("\"stage\"").unwrap();
    assert_eq!(step, Step::Stage);
  }
}
