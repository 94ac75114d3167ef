//! CLI integration tests using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn fluenta() -> Command {
    #[allow(deprecated)]
    Command::cargo_bin("fluenta").unwrap()
}

#[test]
fn init_creates_files() {
    let dir = TempDir::new().unwrap();

    fluenta()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created fluenta.toml"))
        .stdout(predicate::str::contains("Created banks/example.toml"));

    assert!(dir.path().join("fluenta.toml").exists());
    assert!(dir.path().join("banks/example.toml").exists());
}

#[test]
fn init_skips_existing() {
    let dir = TempDir::new().unwrap();

    fluenta()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success();

    fluenta()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn validate_example_bank() {
    let dir = TempDir::new().unwrap();
    fluenta()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success();

    fluenta()
        .current_dir(dir.path())
        .arg("validate")
        .arg("--bank")
        .arg("banks/example.toml")
        .assert()
        .success()
        .stdout(predicate::str::contains("Example Item Bank"))
        .stdout(predicate::str::contains("All item banks valid"));
}

#[test]
fn validate_flags_bad_parameters() {
    let dir = TempDir::new().unwrap();
    let bank = r#"[bank]
id = "broken"
name = "Broken Bank"

[[items]]
id = "dup-001"
skill = "reading"
difficulty = 0.0

[[items]]
id = "dup-001"
skill = "reading"
difficulty = 9.5
discrimination = -1.0
"#;
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, bank).unwrap();

    fluenta()
        .arg("validate")
        .arg("--bank")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("WARNING"))
        .stdout(predicate::str::contains("warning(s) found"));
}

#[test]
fn validate_nonexistent_file() {
    fluenta()
        .arg("validate")
        .arg("--bank")
        .arg("nonexistent.toml")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn simulate_runs_full_session() {
    let dir = TempDir::new().unwrap();
    fluenta()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success();

    fluenta()
        .current_dir(dir.path())
        .arg("simulate")
        .arg("--bank")
        .arg("banks/example.toml")
        .arg("--theta")
        .arg("0.5")
        .arg("--level")
        .arg("B1")
        .assert()
        .success()
        .stdout(predicate::str::contains("ENGLISH PROFICIENCY CERTIFICATE"))
        .stderr(predicate::str::contains("Report saved to"));

    assert!(dir.path().join("fluenta-results").exists());
}

#[test]
fn simulate_rejects_out_of_range_theta() {
    fluenta()
        .arg("simulate")
        .arg("--bank")
        .arg("banks/example.toml")
        .arg("--theta")
        .arg("7.5")
        .assert()
        .failure()
        .stderr(predicate::str::contains("theta must be between"));
}

#[test]
fn report_unknown_session_fails() {
    let dir = TempDir::new().unwrap();
    fluenta()
        .current_dir(dir.path())
        .arg("report")
        .arg("--session")
        .arg("00000000-0000-0000-0000-000000000000")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no persisted session"));
}

#[test]
fn help_output() {
    fluenta()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Adaptive English proficiency testing engine",
        ));
}

#[test]
fn version_output() {
    fluenta()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("fluenta"));
}
