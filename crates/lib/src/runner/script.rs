//! The default scriptlet-driven step runner.
//!
//! `ScriptRunner` executes a part's lifecycle from its declared
//! properties alone, with no external plugin:
//!
//! - **Pull** syncs the declared `source` directory into the part's
//!   `src/` dir (recording its fingerprint), or runs `override-pull`.
//!   `parse-info` files found in the source become extracted metadata.
//! - **Build** copies `src/` to `build/`, runs `override-build` (default:
//!   copy the build tree into `install/`), then applies `organize`
//!   renames to the install tree.
//! - **Stage** copies the install tree into the shared stage area.
//! - **Prime** copies the part's recorded staged files into the prime
//!   area and records its dependencies' staged paths as inherited.
//!
//! Scriptlets run through `sh -c` with the context environment, and may
//! write YAML metadata to the file named by `PACKFORGE_METADATA`.

use std::fs;
use std::path::Path;
use std::process::Command;

use serde_json::Value;
use tracing::{debug, info};

use crate::fingerprint::fingerprint_source;
use crate::state::metadata::Metadata;
use crate::state::types::ArtifactSet;
use crate::step::Step;

use super::{RunnerError, StepContext, StepOutcome, StepRunner};

/// Step runner driven entirely by part properties and scriptlets.
#[derive(Debug, Default)]
pub struct ScriptRunner;

impl StepRunner for ScriptRunner {
  fn run(&self, ctx: &StepContext<'_>) -> Result<StepOutcome, RunnerError> {
    match ctx.step {
      Step::Pull => self.pull(ctx),
      Step::Build => self.build(ctx),
      Step::Stage => self.stage(ctx),
      Step::Prime => self.prime(ctx),
    }
  }

  fn supports_update(&self, step: Step) -> bool {
    // An outdated pull is just a re-sync of the source tree.
    step == Step::Pull
  }

  fn update(&self, ctx: &StepContext<'_>) -> Result<StepOutcome, RunnerError> {
    debug!(part = %ctx.part.name, "updating pull in place");
    self.pull(ctx)
  }
}

impl ScriptRunner {
  fn pull(&self, ctx: &StepContext<'_>) -> Result<StepOutcome, RunnerError> {
    let mut outcome = StepOutcome::default();

    ensure_clean_dir(&ctx.dirs.src)?;

    if let Some(source_dir) = &ctx.source_dir {
      if !source_dir.exists() {
        return Err(RunnerError::MissingSource {
          part: ctx.part.name.clone(),
          path: source_dir.clone(),
        });
      }
      copy_tree(source_dir, &ctx.dirs.src, &mut ArtifactSet::default())?;
      outcome.source_fingerprint = Some(fingerprint_source(source_dir)?);
      outcome
        .manifest
        .insert("source".to_string(), Value::String(source_dir.display().to_string()));
    }

    if let Some(script) = ctx.part.property_str("override-pull") {
      run_scriptlet(script, &ctx.dirs.src, ctx)?;
    }

    outcome.extracted = self.extract_parse_info(ctx)?;
    outcome.scriptlet = take_scriptlet_metadata(ctx)?;
    Ok(outcome)
  }

  fn build(&self, ctx: &StepContext<'_>) -> Result<StepOutcome, RunnerError> {
    let mut outcome = StepOutcome::default();

    ensure_clean_dir(&ctx.dirs.build)?;
    copy_tree(&ctx.dirs.src, &ctx.dirs.build, &mut ArtifactSet::default())?;
    ensure_clean_dir(&ctx.dirs.install)?;

    match ctx.part.property_str("override-build") {
      Some(script) => run_scriptlet(script, &ctx.dirs.build, ctx)?,
      // No build scriptlet: the build tree is the install tree.
      None => copy_tree(&ctx.dirs.build, &ctx.dirs.install, &mut ArtifactSet::default())?,
    }

    if let Some(Value::Object(renames)) = ctx.part.property("organize") {
      for (from, to) in renames {
        if let Value::String(to) = to {
          organize_rename(&ctx.dirs.install, from, to)?;
        }
      }
    }

    outcome.artifacts = scan_artifacts(&ctx.dirs.install)?;
    Ok(outcome)
  }

  fn stage(&self, ctx: &StepContext<'_>) -> Result<StepOutcome, RunnerError> {
    let mut outcome = StepOutcome::default();

    fs::create_dir_all(&ctx.dirs.stage).map_err(|source| RunnerError::Io {
      path: ctx.dirs.stage.clone(),
      source,
    })?;

    copy_tree(&ctx.dirs.install, &ctx.dirs.stage, &mut outcome.artifacts)?;

    if let Some(script) = ctx.part.property_str("override-stage") {
      run_scriptlet(script, &ctx.dirs.stage, ctx)?;
    }

    Ok(outcome)
  }

  fn prime(&self, ctx: &StepContext<'_>) -> Result<StepOutcome, RunnerError> {
    let mut outcome = StepOutcome::default();

    fs::create_dir_all(&ctx.dirs.prime).map_err(|source| RunnerError::Io {
      path: ctx.dirs.prime.clone(),
      source,
    })?;

    // Copy this part's own staged artifacts; dependencies prime theirs.
    if let Some(staged) = &ctx.staged {
      for dir in &staged.directories {
        let target = ctx.dirs.prime.join(dir);
        fs::create_dir_all(&target).map_err(|source| RunnerError::Io { path: target, source })?;
        outcome.artifacts.directories.insert(dir.clone());
      }
      for file in &staged.files {
        let from = ctx.dirs.stage.join(file);
        let to = ctx.dirs.prime.join(file);
        if let Some(parent) = to.parent() {
          fs::create_dir_all(parent).map_err(|source| RunnerError::Io {
            path: parent.to_path_buf(),
            source,
          })?;
        }
        fs::copy(&from, &to).map_err(|source| RunnerError::Io { path: from, source })?;
        outcome.artifacts.files.insert(file.clone());
      }
    }

    outcome.artifacts.dependency_artifacts = ctx.dependency_staged.clone();

    if let Some(script) = ctx.part.property_str("override-prime") {
      run_scriptlet(script, &ctx.dirs.prime, ctx)?;
    }

    outcome.scriptlet = take_scriptlet_metadata(ctx)?;
    Ok(outcome)
  }

  /// Parse declared `parse-info` files (relative to the source checkout)
  /// into extracted metadata.
  fn extract_parse_info(&self, ctx: &StepContext<'_>) -> Result<Option<Metadata>, RunnerError> {
    let Some(Value::Array(entries)) = ctx.part.property("parse-info") else {
      return Ok(None);
    };

    let mut merged = Metadata::default();
    for entry in entries {
      let Value::String(rel) = entry else { continue };
      let path = ctx.dirs.src.join(rel);
      let content = fs::read_to_string(&path).map_err(|source| RunnerError::Io {
        path: path.clone(),
        source,
      })?;
      let mut parsed: Metadata =
        serde_yaml::from_str(&content).map_err(|source| RunnerError::MetadataParse { path, source })?;
      parsed.files.push(rel.clone());
      merged.update_from(&parsed);
    }

    Ok((!merged.is_empty()).then_some(merged))
  }
}

/// Run one scriptlet through `sh -c` with the context environment.
fn run_scriptlet(script: &str, cwd: &Path, ctx: &StepContext<'_>) -> Result<(), RunnerError> {
  fs::create_dir_all(cwd).map_err(|source| RunnerError::Io {
    path: cwd.to_path_buf(),
    source,
  })?;

  info!(part = %ctx.part.name, step = %ctx.step, "running scriptlet");
  let status = Command::new("sh")
    .arg("-c")
    .arg(script)
    .current_dir(cwd)
    .envs(ctx.environment.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    .status()
    .map_err(|source| RunnerError::Spawn {
      script: script.to_string(),
      source,
    })?;

  if !status.success() {
    return Err(RunnerError::ScriptFailed {
      script: script.to_string(),
      code: status.code(),
    });
  }
  Ok(())
}

/// Read and consume the scriptlet metadata file, if a scriptlet wrote one.
fn take_scriptlet_metadata(ctx: &StepContext<'_>) -> Result<Option<Metadata>, RunnerError> {
  let path = ctx.dirs.scriptlet_metadata_path();
  if !path.exists() {
    return Ok(None);
  }

  let content = fs::read_to_string(&path).map_err(|source| RunnerError::Io {
    path: path.clone(),
    source,
  })?;
  let metadata: Metadata = serde_yaml::from_str(&content).map_err(|source| RunnerError::MetadataParse {
    path: path.clone(),
    source,
  })?;
  fs::remove_file(&path).map_err(|source| RunnerError::Io { path, source })?;
  Ok(Some(metadata))
}

/// Remove and recreate a directory.
fn ensure_clean_dir(path: &Path) -> Result<(), RunnerError> {
  if path.exists() {
    fs::remove_dir_all(path).map_err(|source| RunnerError::Io {
      path: path.to_path_buf(),
      source,
    })?;
  }
  fs::create_dir_all(path).map_err(|source| RunnerError::Io {
    path: path.to_path_buf(),
    source,
  })
}

/// Copy a tree, recording the relative paths copied.
fn copy_tree(from: &Path, to: &Path, artifacts: &mut ArtifactSet) -> Result<(), RunnerError> {
  let io_err = |path: &Path| {
    let path = path.to_path_buf();
    move |source| RunnerError::Io { path, source }
  };

  if !from.exists() {
    return Ok(());
  }

  for entry in walkdir::WalkDir::new(from).sort_by_file_name() {
    let entry = entry.map_err(|e| RunnerError::Io {
      path: from.to_path_buf(),
      source: e.into(),
    })?;
    let rel = entry.path().strip_prefix(from).unwrap_or(entry.path());
    if rel.as_os_str().is_empty() {
      continue;
    }
    let target = to.join(rel);

    let file_type = entry.file_type();
    if file_type.is_dir() {
      fs::create_dir_all(&target).map_err(io_err(&target))?;
      artifacts.directories.insert(rel.to_path_buf());
    } else if file_type.is_file() {
      if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(io_err(parent))?;
      }
      fs::copy(entry.path(), &target).map_err(io_err(entry.path()))?;
      artifacts.files.insert(rel.to_path_buf());
    } else if file_type.is_symlink() {
      let link_target = fs::read_link(entry.path()).map_err(io_err(entry.path()))?;
      let _ = fs::remove_file(&target);
      #[cfg(unix)]
      std::os::unix::fs::symlink(&link_target, &target).map_err(io_err(&target))?;
      #[cfg(windows)]
      {
        let _ = link_target;
        fs::copy(entry.path(), &target).map_err(io_err(entry.path()))?;
      }
      artifacts.files.insert(rel.to_path_buf());
    }
  }
  Ok(())
}

/// Collect the relative files and directories under an output tree.
fn scan_artifacts(root: &Path) -> Result<ArtifactSet, RunnerError> {
  let mut artifacts = ArtifactSet::default();
  if !root.exists() {
    return Ok(artifacts);
  }

  for entry in walkdir::WalkDir::new(root).sort_by_file_name() {
    let entry = entry.map_err(|e| RunnerError::Io {
      path: root.to_path_buf(),
      source: e.into(),
    })?;
    let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
    if rel.as_os_str().is_empty() {
      continue;
    }
    if entry.file_type().is_dir() {
      artifacts.directories.insert(rel.to_path_buf());
    } else {
      artifacts.files.insert(rel.to_path_buf());
    }
  }
  Ok(artifacts)
}

/// Apply one `organize` rename within the install tree.
fn organize_rename(install: &Path, from: &str, to: &str) -> Result<(), RunnerError> {
  let source = install.join(from);
  if !source.exists() {
    debug!(from, "organize source missing, skipping");
    return Ok(());
  }
  let target = install.join(to);
  if let Some(parent) = target.parent() {
    fs::create_dir_all(parent).map_err(|source| RunnerError::Io {
      path: parent.to_path_buf(),
      source,
    })?;
  }
  fs::rename(&source, &target).map_err(|source_err| RunnerError::Io {
    path: source,
    source: source_err,
  })
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeSet;
  use std::path::PathBuf;

  use super::*;
  use tempfile::TempDir;

  use crate::paths::WorkDirs;
  use crate::project::{Part, Project};
  use crate::runner::{StepDirs, build_environment};

  struct Fixture {
    _temp: TempDir,
    work: WorkDirs,
    project_dir: PathBuf,
    project: Project,
  }

  fn fixture() -> Fixture {
    let temp = TempDir::new().unwrap();
    let project_dir = temp.path().join("project");
    fs::create_dir_all(&project_dir).unwrap();
    let work = WorkDirs::new(temp.path().join("work"));
    Fixture {
      _temp: temp,
      work,
      project_dir,
      project: Project {
        name: "demo".to_string(),
        version: "1.0".to_string(),
        options: std::collections::BTreeMap::new(),
      },
    }
  }

  fn context<'a>(fx: &'a Fixture, part: &'a Part, step: Step) -> StepContext<'a> {
    let dirs = StepDirs::for_part(&fx.work, &part.name);
    let environment = build_environment(part, &fx.project, &dirs);
    let source_dir = part.source().map(|s| fx.project_dir.join(s));
    StepContext {
      part,
      step,
      project: &fx.project,
      dirs,
      environment,
      source_dir,
      staged: None,
      dependency_staged: BTreeSet::new(),
    }
  }

  fn part_with(name: &str, properties: &[(&str, serde_json::Value)]) -> Part {
    Part {
      name: name.to_string(),
      after: vec![],
      properties: properties.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
    }
  }

  #[test]
  fn pull_copies_source_and_fingerprints() {
    let fx = fixture();
    fs::create_dir_all(fx.project_dir.join("app-src")).unwrap();
    fs::write(fx.project_dir.join("app-src/main.c"), "int main() {}").unwrap();

    let part = part_with("app", &[("source", serde_json::json!("./app-src"))]);
    let ctx = context(&fx, &part, Step::Pull);

    let outcome = ScriptRunner.run(&ctx).unwrap();
    assert!(fx.work.part_src_dir("app").join("main.c").exists());
    assert!(outcome.source_fingerprint.is_some());
    assert!(outcome.manifest.contains_key("source"));
  }

  #[test]
  fn pull_fails_on_missing_source() {
    let fx = fixture();
    let part = part_with("app", &[("source", serde_json::json!("./nope"))]);
    let ctx = context(&fx, &part, Step::Pull);

    assert!(matches!(
      ScriptRunner.run(&ctx),
      Err(RunnerError::MissingSource { .. })
    ));
  }

  #[test]
  fn pull_extracts_parse_info_metadata() {
    let fx = fixture();
    let src = fx.project_dir.join("app-src");
    fs::create_dir_all(&src).unwrap();
    fs::write(src.join("appinfo.yaml"), "summary: a demo app\nversion: '3.2'\n").unwrap();

    let part = part_with(
      "app",
      &[
        ("source", serde_json::json!("./app-src")),
        ("parse-info", serde_json::json!(["appinfo.yaml"])),
      ],
    );
    let ctx = context(&fx, &part, Step::Pull);

    let outcome = ScriptRunner.run(&ctx).unwrap();
    let extracted = outcome.extracted.unwrap();
    assert_eq!(extracted.summary, "a demo app");
    assert_eq!(extracted.version, "3.2");
    assert_eq!(extracted.files, vec!["appinfo.yaml".to_string()]);
  }

  #[test]
  #[cfg(unix)]
  fn override_pull_runs_in_src_dir() {
    let fx = fixture();
    let part = part_with("app", &[("override-pull", serde_json::json!("echo pulled > marker"))]);
    let ctx = context(&fx, &part, Step::Pull);

    ScriptRunner.run(&ctx).unwrap();
    let marker = fx.work.part_src_dir("app").join("marker");
    assert!(marker.exists());
  }

  #[test]
  #[cfg(unix)]
  fn failing_scriptlet_reports_exit_code() {
    let fx = fixture();
    let part = part_with("app", &[("override-pull", serde_json::json!("exit 3"))]);
    let ctx = context(&fx, &part, Step::Pull);

    match ScriptRunner.run(&ctx) {
      Err(RunnerError::ScriptFailed { code, .. }) => assert_eq!(code, Some(3)),
      other => panic!("expected ScriptFailed, got {:?}", other),
    }
  }

  #[test]
  fn default_build_installs_the_build_tree() {
    let fx = fixture();
    let src = fx.work.part_src_dir("app");
    fs::create_dir_all(src.join("bin")).unwrap();
    fs::write(src.join("bin/app"), "binary").unwrap();

    let part = part_with("app", &[]);
    let ctx = context(&fx, &part, Step::Build);

    let outcome = ScriptRunner.run(&ctx).unwrap();
    assert!(fx.work.part_install_dir("app").join("bin/app").exists());
    assert!(outcome.artifacts.files.contains(&PathBuf::from("bin/app")));
    assert!(outcome.artifacts.directories.contains(&PathBuf::from("bin")));
  }

  #[test]
  fn organize_renames_install_paths() {
    let fx = fixture();
    let src = fx.work.part_src_dir("app");
    fs::create_dir_all(&src).unwrap();
    fs::write(src.join("app.bin"), "binary").unwrap();

    let part = part_with("app", &[("organize", serde_json::json!({"app.bin": "bin/app"}))]);
    let ctx = context(&fx, &part, Step::Build);

    let outcome = ScriptRunner.run(&ctx).unwrap();
    let install = fx.work.part_install_dir("app");
    assert!(install.join("bin/app").exists());
    assert!(!install.join("app.bin").exists());
    assert!(outcome.artifacts.files.contains(&PathBuf::from("bin/app")));
  }

  #[test]
  fn stage_copies_install_into_shared_area() {
    let fx = fixture();
    let install = fx.work.part_install_dir("app");
    fs::create_dir_all(install.join("usr/bin")).unwrap();
    fs::write(install.join("usr/bin/app"), "binary").unwrap();

    let part = part_with("app", &[]);
    let ctx = context(&fx, &part, Step::Stage);

    let outcome = ScriptRunner.run(&ctx).unwrap();
    assert!(fx.work.stage_dir().join("usr/bin/app").exists());
    assert!(outcome.artifacts.files.contains(&PathBuf::from("usr/bin/app")));
    assert!(outcome.artifacts.dependency_artifacts.is_empty());
  }

  #[test]
  fn prime_copies_own_staged_files_and_tags_inherited() {
    let fx = fixture();
    let stage = fx.work.stage_dir();
    fs::create_dir_all(stage.join("bin")).unwrap();
    fs::write(stage.join("bin/app"), "binary").unwrap();

    let part = part_with("app", &[]);
    let mut ctx = context(&fx, &part, Step::Prime);
    ctx.staged = Some(ArtifactSet {
      files: BTreeSet::from([PathBuf::from("bin/app")]),
      directories: BTreeSet::from([PathBuf::from("bin")]),
      dependency_artifacts: BTreeSet::new(),
    });
    ctx.dependency_staged = BTreeSet::from([PathBuf::from("lib/libdep.so")]);

    let outcome = ScriptRunner.run(&ctx).unwrap();
    assert!(fx.work.prime_dir().join("bin/app").exists());
    assert!(outcome.artifacts.files.contains(&PathBuf::from("bin/app")));
    assert_eq!(
      outcome.artifacts.dependency_artifacts,
      BTreeSet::from([PathBuf::from("lib/libdep.so")])
    );
  }

  #[test]
  #[cfg(unix)]
  fn scriptlet_metadata_is_consumed() {
    let fx = fixture();
    let part = part_with(
      "app",
      &[(
        "override-pull",
        serde_json::json!("printf 'version: \"9.9\"\\n' > \"$PACKFORGE_METADATA\""),
      )],
    );
    let ctx = context(&fx, &part, Step::Pull);

    let outcome = ScriptRunner.run(&ctx).unwrap();
    let scriptlet = outcome.scriptlet.unwrap();
    assert_eq!(scriptlet.version, "9.9");
    // The metadata file is consumed, not left behind.
    assert!(!ctx.dirs.scriptlet_metadata_path().exists());
  }

  #[test]
  fn runner_updates_pull_only() {
    assert!(ScriptRunner.supports_update(Step::Pull));
    assert!(!ScriptRunner.supports_update(Step::Build));
    assert!(!ScriptRunner.supports_update(Step::Stage));
    assert!(!ScriptRunner.supports_update(Step::Prime));
  }
}
