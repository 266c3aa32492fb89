//! Clean command integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

const CONFIG: &str = r#"
name: hello
version: "1.0"
parts:
  app:
    source: ./app
  base:
    source: ./base
"#;

fn built_env() -> TestEnv {
  let env = TestEnv::with_config(CONFIG);
  env.write_file("project/app/app.bin", "app binary");
  env.write_file("project/base/base.txt", "base data");
  env.packforge_cmd().arg("prime").assert().success();
  env
}

#[test]
fn clean_step_cascades_forward() {
  let env = built_env();

  env
    .packforge_cmd()
    .arg("clean")
    .arg("app")
    .arg("--step")
    .arg("build")
    .assert()
    .success()
    .stdout(predicate::str::contains("Cleaned 'app' from 'build'"));

  // Pull survives; build and everything after it is gone.
  assert!(env.state_file("app", "pull").exists());
  assert!(!env.state_file("app", "build").exists());
  assert!(!env.state_file("app", "stage").exists());
  assert!(!env.state_file("app", "prime").exists());

  // The other part is untouched.
  for step in ["pull", "build", "stage", "prime"] {
    assert!(env.state_file("base", step).exists());
  }
}

#[test]
fn clean_part_removes_all_state() {
  let env = built_env();

  env.packforge_cmd().arg("clean").arg("app").assert().success();

  for step in ["pull", "build", "stage", "prime"] {
    assert!(!env.state_file("app", step).exists());
  }
  assert!(!env.work_path().join("parts/app").exists());

  // app's staged file is gone, base's remains.
  assert!(!env.work_path().join("stage/app.bin").exists());
  assert!(env.work_path().join("stage/base.txt").exists());
}

#[test]
fn clean_everything_then_rebuild() {
  let env = built_env();

  env.packforge_cmd().arg("clean").assert().success();
  for part in ["app", "base"] {
    for step in ["pull", "build", "stage", "prime"] {
      assert!(!env.state_file(part, step).exists());
    }
  }

  // The tree rebuilds from scratch afterwards.
  env
    .packforge_cmd()
    .arg("prime")
    .assert()
    .success()
    .stdout(predicate::str::contains("Reached 'prime'"));
}

#[test]
fn clean_unknown_part_fails() {
  let env = built_env();

  env
    .packforge_cmd()
    .arg("clean")
    .arg("ghost")
    .assert()
    .failure()
    .stderr(predicate::str::contains("no such part"));
}

#[test]
fn clean_is_idempotent() {
  let env = built_env();

  env.packforge_cmd().arg("clean").arg("app").assert().success();
  env.packforge_cmd().arg("clean").arg("app").assert().success();
}
