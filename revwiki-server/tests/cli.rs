use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn help_lists_options() {
    Command::cargo_bin("revwiki-server")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--listen-addr"))
        .stdout(predicate::str::contains("--data-dir"))
        .stdout(predicate::str::contains("--config"));
}

#[test]
fn missing_explicit_config_fails() {
    Command::cargo_bin("revwiki-server")
        .unwrap()
        .args(["--config", "/nonexistent/revwiki.yml"])
        .env_remove("REVWIKI_ADDR")
        .env_remove("REVWIKI_DATA_DIR")
        .assert()
        .failure()
        .stderr(predicate::str::contains("config file not found"));
}

#[test]
fn invalid_config_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("revwiki.yml");
    std::fs::write(&path, "render:\n  cache_capacity: 0\n").unwrap();

    Command::cargo_bin("revwiki-server")
        .unwrap()
        .arg("--config")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("cache_capacity"));
}
