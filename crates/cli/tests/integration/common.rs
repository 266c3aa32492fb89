//! Shared test helpers for CLI integration tests.

use std::path::PathBuf;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Isolated test environment.
///
/// Each test gets its own temporary project directory plus a separate
/// working tree, wired up through `PACKFORGE_WORK_DIR`.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  /// Create an empty project directory.
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir_all(temp.path().join("project")).unwrap();
    Self { temp }
  }

  /// Create a project directory seeded with a `packforge.yaml`.
  pub fn with_config(config: &str) -> Self {
    let env = Self::new();
    env.write_file("project/packforge.yaml", config);
    env
  }

  /// Write a file relative to the temp directory.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  pub fn project_path(&self) -> PathBuf {
    let p = self.temp.path().join("project");
    dunce::canonicalize(&p).unwrap_or(p)
  }

  /// Working tree path (isolated from the project directory).
  pub fn work_path(&self) -> PathBuf {
    let p = self.temp.path().join("work");
    std::fs::create_dir_all(&p).unwrap();
    dunce::canonicalize(&p).unwrap_or(p)
  }

  pub fn state_file(&self, part: &str, step: &str) -> PathBuf {
    self
      .work_path()
      .join("state/parts")
      .join(part)
      .join(format!("{}.json", step))
  }

  /// Get a pre-configured Command for the packforge binary.
  pub fn packforge_cmd(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("packforge");
    cmd.arg("--project-dir").arg(self.project_path());
    cmd.env("PACKFORGE_WORK_DIR", self.work_path());
    cmd
  }
}
