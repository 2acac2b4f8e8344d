//! Integration tests for the `chatbridge` binary.
//!
//! Argument parsing, config resolution and error reporting, without a
//! backend or a long-running listener.
#![allow(clippy::unwrap_used)]

use std::io::Write;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a command for the binary with env isolation, so tests never read
/// the user's real configuration.
fn chatbridge_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("chatbridge");
    cmd.env("HOME", "/tmp/chatbridge-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/chatbridge-cli-test-nonexistent")
        .env_remove("CHATBRIDGE_CONFIG")
        .env_remove("CHATBRIDGE_API_KEY")
        .env_remove("CHATBRIDGE_PORT")
        .env_remove("CHATBRIDGE_LISTEN")
        .env_remove("RUST_LOG");
    cmd
}

fn config_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_help_flag() {
    chatbridge_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("IRC gateway")
            .and(predicate::str::contains("--port"))
            .and(predicate::str::contains("--backlog"))
            .and(predicate::str::contains("--no-reconnect")),
    );
}

#[test]
fn test_version_flag() {
    chatbridge_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("chatbridge"));
}

#[test]
fn test_print_config_defaults() {
    chatbridge_cmd()
        .arg("--print-config")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("port = 26667")
                .and(predicate::str::contains("backlog_depth = 30"))
                .and(predicate::str::contains("server_name = \"lingr\"")),
        );
}

#[test]
fn test_file_and_flags_layer() {
    let file = config_file("port = 6667\nbacklog_depth = 50\nhost = \"example.org\"\n");
    chatbridge_cmd()
        .arg("--config")
        .arg(file.path())
        .args(["--port", "7000", "--no-reconnect", "--print-config"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("port = 7000")
                .and(predicate::str::contains("backlog_depth = 50"))
                .and(predicate::str::contains("host = \"example.org\""))
                .and(predicate::str::contains("auto_reconnect = false")),
        );
}

#[test]
fn test_api_key_is_masked() {
    chatbridge_cmd()
        .env("CHATBRIDGE_API_KEY", "hunter2")
        .arg("--print-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("hunter2").not());
}

// ── Error cases ─────────────────────────────────────────────────────

#[test]
fn test_missing_explicit_config() {
    chatbridge_cmd()
        .args(["--config", "/tmp/chatbridge-cli-test-nonexistent/none.toml"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Config file not found"));
}

#[test]
fn test_malformed_config() {
    let file = config_file("port = \"not a number\"\n");
    chatbridge_cmd()
        .arg("--config")
        .arg(file.path())
        .assert()
        .code(3);
}

#[test]
fn test_invalid_listen_address() {
    chatbridge_cmd()
        .args(["--listen", "not-an-ip"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("listen"));
}

#[test]
fn test_unknown_flag() {
    chatbridge_cmd()
        .arg("--frobnicate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--frobnicate"));
}
