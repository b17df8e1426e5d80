use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn opticrep(config_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("opticrep").unwrap();
    cmd.env("OPTICREP_CONFIG", config_dir.path().join("config.toml"));
    cmd
}

#[test]
fn test_help_command() {
    let mut cmd = Command::cargo_bin("opticrep").unwrap();
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Camera-based rep counting"))
        .stdout(predicate::str::contains("simulate"))
        .stdout(predicate::str::contains("exercises"));
}

#[test]
fn test_version_command() {
    let mut cmd = Command::cargo_bin("opticrep").unwrap();
    cmd.arg("--version");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("0.1.0"));
}

#[test]
fn test_completions_command() {
    let mut cmd = Command::cargo_bin("opticrep").unwrap();
    cmd.arg("completions").arg("bash");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("_opticrep"));
}

#[test]
fn test_exercises_lists_profiles() {
    let dir = TempDir::new().unwrap();
    opticrep(&dir)
        .arg("exercises")
        .assert()
        .success()
        .stdout(predicate::str::contains("Bicep Curl"))
        .stdout(predicate::str::contains("Pec Deck"))
        .stdout(predicate::str::contains("wrist spread"));
}

#[test]
fn test_exercises_resolves_unknown_name_to_generic() {
    let dir = TempDir::new().unwrap();
    opticrep(&dir)
        .args(["exercises", "--resolve", "bulgarian split squat"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Generic"));
}

#[test]
fn test_config_init_then_show() {
    let dir = TempDir::new().unwrap();
    opticrep(&dir)
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("✓ Configuration initialized"));

    assert!(dir.path().join("config.toml").exists());

    opticrep(&dir)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("debounce_ms = 300"));
}

#[test]
fn test_simulate_offline_json_report() {
    let dir = TempDir::new().unwrap();
    let output = opticrep(&dir)
        .args(["simulate", "--offline", "--json", "-e", "squat", "-r", "4", "-s", "2", "-w", "60"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["localSession"], true);
    assert_eq!(report["sets"].as_array().unwrap().len(), 2);
    assert_eq!(report["sets"][0]["completedReps"], 4);
    assert_eq!(report["sets"][0]["localOnly"], true);
    assert_eq!(report["stats"]["totalReps"], 8);
}

#[test]
fn test_simulate_with_storage_prints_summary() {
    let dir = TempDir::new().unwrap();
    opticrep(&dir)
        .args(["simulate", "-r", "3", "--occlusion", "--flaky-storage"])
        .assert()
        .success()
        .stdout(predicate::str::contains("move into frame"))
        .stdout(predicate::str::contains("Set 1: 3 reps"))
        .stdout(predicate::str::contains("Session Summary"));
}
