//! Lifecycle command integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

const TWO_PART_CONFIG: &str = r#"
name: hello
version: "1.0"
options:
  target_arch: amd64
parts:
  libgreet:
    source: ./libgreet
  hello:
    source: ./hello
    after: [libgreet]
"#;

fn two_part_env() -> TestEnv {
  let env = TestEnv::with_config(TWO_PART_CONFIG);
  env.write_file("project/libgreet/libgreet.so", "greeting library");
  env.write_file("project/hello/hello.bin", "hello binary");
  env
}

#[test]
fn prime_builds_the_whole_project() {
  let env = two_part_env();

  env
    .packforge_cmd()
    .arg("prime")
    .assert()
    .success()
    .stdout(predicate::str::contains("Reached 'prime'"))
    .stdout(predicate::str::contains("Package metadata written"));

  // Both parts' files made it to the prime area.
  let prime = env.work_path().join("prime");
  assert!(prime.join("libgreet.so").exists());
  assert!(prime.join("hello.bin").exists());
  assert!(prime.join("meta/package.yaml").exists());

  // Every step of every part is recorded.
  for part in ["libgreet", "hello"] {
    for step in ["pull", "build", "stage", "prime"] {
      assert!(env.state_file(part, step).exists(), "{}/{} missing", part, step);
    }
  }
}

#[test]
fn second_prime_reports_nothing_to_do() {
  let env = two_part_env();

  env.packforge_cmd().arg("prime").assert().success();

  env
    .packforge_cmd()
    .arg("prime")
    .assert()
    .success()
    .stdout(predicate::str::contains("already been taken"));
}

#[test]
fn pull_unknown_part_fails() {
  let env = two_part_env();

  env
    .packforge_cmd()
    .arg("pull")
    .arg("ghost")
    .assert()
    .failure()
    .stderr(predicate::str::contains("no such part"));
}

#[test]
fn changed_source_reruns_only_that_part() {
  let env = two_part_env();
  env.packforge_cmd().arg("prime").assert().success();

  let libgreet_prime_before = std::fs::read(env.state_file("libgreet", "prime")).unwrap();

  // Change hello's source content; its pull is outdated on the next run.
  env.write_file("project/hello/hello.bin", "hello binary v2");
  env.packforge_cmd().arg("build").arg("hello").assert().success();

  // hello's stage/prime records were cascaded away by the re-run.
  assert!(env.state_file("hello", "build").exists());
  assert!(!env.state_file("hello", "stage").exists());
  assert!(!env.state_file("hello", "prime").exists());

  // libgreet was untouched.
  let libgreet_prime_after = std::fs::read(env.state_file("libgreet", "prime")).unwrap();
  assert_eq!(libgreet_prime_before, libgreet_prime_after);
}

#[test]
fn on_outdated_error_refuses_silent_rerun() {
  let env = two_part_env();
  env.packforge_cmd().arg("build").assert().success();

  env.write_file("project/hello/hello.bin", "hello binary v2");

  env
    .packforge_cmd()
    .arg("build")
    .arg("--on-outdated")
    .arg("error")
    .assert()
    .failure()
    .stderr(predicate::str::contains("out of date"));
}

#[test]
#[cfg(unix)]
fn stage_collision_names_both_parts() {
  let env = TestEnv::with_config(
    r#"
name: colliding
version: "1.0"
parts:
  partc:
    override-build: mkdir -p "$PACKFORGE_PART_INSTALL/usr/lib" && printf 'from c' > "$PACKFORGE_PART_INSTALL/usr/lib/libx.so"
  partd:
    override-build: mkdir -p "$PACKFORGE_PART_INSTALL/usr/lib" && printf 'from d' > "$PACKFORGE_PART_INSTALL/usr/lib/libx.so"
"#,
  );

  env
    .packforge_cmd()
    .arg("stage")
    .assert()
    .failure()
    .stderr(predicate::str::contains("partc"))
    .stderr(predicate::str::contains("partd"))
    .stderr(predicate::str::contains("different content"));

  assert!(!env.state_file("partc", "stage").exists());
  assert!(!env.state_file("partd", "stage").exists());
}

#[test]
fn parse_info_metadata_reaches_the_package() {
  let env = TestEnv::with_config(
    r#"
name: hello
version: "1.0"
parts:
  hello:
    source: ./hello
    parse-info: [appinfo.yaml]
"#,
  );
  env.write_file("project/hello/hello.bin", "hello binary");
  env.write_file("project/hello/appinfo.yaml", "summary: greets you\nversion: \"4.2\"\n");

  env.packforge_cmd().arg("prime").assert().success();

  let package = std::fs::read_to_string(env.work_path().join("prime/meta/package.yaml")).unwrap();
  assert!(package.contains("greets you"));
  assert!(package.contains("4.2"));
}

#[test]
fn status_shows_recorded_steps() {
  let env = two_part_env();
  env.packforge_cmd().arg("build").arg("libgreet").assert().success();

  env
    .packforge_cmd()
    .arg("status")
    .assert()
    .success()
    .stdout(predicate::str::contains("libgreet"))
    .stdout(predicate::str::contains("hello"))
    .stdout(predicate::str::contains("ok"));
}
