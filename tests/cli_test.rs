//! CLI smoke tests

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn cli() -> Command {
    Command::cargo_bin("tracker-assistant-rs").unwrap()
}

#[test]
fn test_help_lists_commands() {
    cli()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("devices"))
        .stdout(predicate::str::contains("credentials"));
}

#[test]
fn test_missing_tracking_url_fails() {
    cli()
        .env_remove("TRACCAR_URL")
        .args(["reset-password", "bob@example.com"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("TRACCAR_URL"));
}

#[test]
fn test_credentials_list_and_forget() {
    let temp_dir = TempDir::new().unwrap();
    let creds = temp_dir.path().join("creds.json");
    std::fs::write(
        &creds,
        r#"{"558499998888@c.us": {"username": "bob", "password": "secret"}}"#,
    )
    .unwrap();

    cli()
        .env_remove("TRACCAR_URL")
        .env("TRACKER_CREDENTIALS_FILE", &creds)
        .args(["credentials", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("558499998888@c.us  bob"))
        .stdout(predicate::str::contains("secret").not());

    cli()
        .env_remove("TRACCAR_URL")
        .env("TRACKER_CREDENTIALS_FILE", &creds)
        .args(["credentials", "forget", "5584999998888"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Forgot 558499998888@c.us (bob)"));

    let remaining = std::fs::read_to_string(&creds).unwrap();
    assert!(!remaining.contains("bob"));
}

#[test]
fn test_send_normalizes_phone() {
    cli()
        .env_remove("TRACCAR_URL")
        .args(["send", "+55 84 99999-8888", "Olá"])
        .assert()
        .success()
        .stdout(predicate::str::contains("-> 558499998888@c.us: Olá"));
}

#[test]
fn test_send_rejects_bad_phone() {
    cli()
        .args(["send", "abc", "Olá"])
        .assert()
        .failure();
}
