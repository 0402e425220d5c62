// ABOUTME: Integration tests for the hoist CLI commands.
// ABOUTME: Validates help output, init, validate, and dry-run pipeline runs.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;

fn hoist_cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("hoist"))
}

/// A project directory whose pipeline needs no network: verify is dropped.
fn project(dir: &Path, extra: &str) {
    fs::write(dir.join("Dockerfile"), "FROM scratch\n").unwrap();
    fs::write(
        dir.join("hoist.yml"),
        format!(
            "service: web\nimage: registry.example.com/acme/web\nports: ['80:80']\n\
             jobs:\n  build: {{ uses: build }}\n  publish: {{ uses: publish, needs: [build] }}\n  \
             deploy: {{ uses: deploy, needs: [publish] }}\n{extra}"
        ),
    )
    .unwrap();
}

#[test]
fn help_shows_commands() {
    hoist_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("stop"));
}

#[test]
fn init_creates_config_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("hoist.yml");

    hoist_cmd()
        .current_dir(temp_dir.path())
        .args(["init", "--service", "blog"])
        .assert()
        .success();

    let content = fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("service: blog"));
    assert!(content.contains("image:"));
}

#[test]
fn init_refuses_to_overwrite_existing_config() {
    let temp_dir = tempfile::tempdir().unwrap();
    fs::write(temp_dir.path().join("hoist.yml"), "existing: config").unwrap();

    hoist_cmd()
        .current_dir(temp_dir.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn validate_prints_jobs_in_order() {
    let temp_dir = tempfile::tempdir().unwrap();
    project(temp_dir.path(), "");

    hoist_cmd()
        .current_dir(temp_dir.path())
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"(?s)build \[build\].*publish \[publish\] needs build.*deploy \[deploy\] needs publish").unwrap());
}

#[test]
fn validate_rejects_cycles() {
    let temp_dir = tempfile::tempdir().unwrap();
    fs::write(
        temp_dir.path().join("hoist.yml"),
        "service: web\nimage: web\njobs:\n  a: { uses: build, needs: [b] }\n  b: { uses: build, needs: [a] }\n",
    )
    .unwrap();

    hoist_cmd()
        .current_dir(temp_dir.path())
        .arg("validate")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("cycle"));
}

#[test]
fn dry_run_reports_json() {
    let temp_dir = tempfile::tempdir().unwrap();
    project(temp_dir.path(), "");

    let output = hoist_cmd()
        .current_dir(temp_dir.path())
        .env_remove("REGISTRY_USER")
        .args(["run", "--dry-run", "--json", "--tag", "20240101"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let report: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(report["pipeline"], "web");
    assert_eq!(report["outcome"], "succeeded");
    let states: Vec<&str> = report["jobs"]
        .as_array()
        .unwrap()
        .iter()
        .map(|j| j["state"].as_str().unwrap())
        .collect();
    assert_eq!(states, ["succeeded", "succeeded", "succeeded"]);
}

#[test]
fn dry_run_with_unset_secret_warns_and_continues() {
    let temp_dir = tempfile::tempdir().unwrap();
    project(
        temp_dir.path(),
        "registry:\n  username: { env: HOIST_CLI_TEST_USER }\n  password: { env: HOIST_CLI_TEST_TOKEN }\n",
    );

    hoist_cmd()
        .current_dir(temp_dir.path())
        .env_remove("HOIST_CLI_TEST_USER")
        .env_remove("HOIST_CLI_TEST_TOKEN")
        .args(["run", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("HOIST_CLI_TEST_USER is not set"))
        .stdout(predicate::str::contains("succeeded"));
}

#[test]
fn non_matching_branch_does_nothing() {
    let temp_dir = tempfile::tempdir().unwrap();
    project(temp_dir.path(), "trigger:\n  branches: [main]\n");

    hoist_cmd()
        .current_dir(temp_dir.path())
        .args(["run", "--dry-run", "--branch", "feature/x"])
        .assert()
        .success()
        .stdout(predicate::str::contains("does not trigger"));
}

#[test]
fn missing_build_context_fails_the_run() {
    let temp_dir = tempfile::tempdir().unwrap();
    project(temp_dir.path(), "");
    fs::remove_file(temp_dir.path().join("Dockerfile")).unwrap();

    hoist_cmd()
        .current_dir(temp_dir.path())
        .args(["run", "--dry-run", "--quiet"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("web failed"))
        .stdout(predicate::str::contains("build failed"));
}
