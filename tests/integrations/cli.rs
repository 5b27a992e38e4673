use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

fn pgmon() -> Command {
    let mut cmd = Command::cargo_bin("pgmon").unwrap();
    for var in ["VAULT_TOKEN", "ENVIRONMENT", "REVIEW_API_URL", "RUST_LOG"] {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn test_help_lists_commands() {
    pgmon()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("csi"))
        .stdout(predicate::str::contains("pglogs"))
        .stdout(predicate::str::contains("serve"));
}

#[test]
fn test_csi_without_vault_path_fails() {
    pgmon()
        .arg("csi")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--vp"));
}

#[test]
fn test_missing_config_file_fails() {
    pgmon()
        .args(["--config", "/no/such/pgmon.toml", "csf", "--no-review"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("configuration file not found"));
}

#[test]
fn test_csf_writes_report_without_review() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("queries")).unwrap();
    fs::write(dir.path().join("queries/users.sql"), "SELECT * FROM users;").unwrap();
    let report = dir.path().join("report.txt");

    pgmon()
        .arg("csf")
        .arg("--dir")
        .arg(dir.path())
        .arg("--output")
        .arg(&report)
        .arg("--no-review")
        .assert()
        .success();

    let text = fs::read_to_string(&report).unwrap();
    assert!(text.contains("----- users.sql -----"));
    assert!(text.contains("SELECT * FROM users;"));
}
