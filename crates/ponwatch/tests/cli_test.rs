//! Integration tests for the `ponwatch` CLI binary.
//!
//! These tests validate argument parsing, help output, shell completions,
//! configuration handling and pre-connection validation, all without
//! reaching a live OLT.
#![allow(clippy::unwrap_used)]

use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `ponwatch` binary with env isolation.
///
/// Clears all `PONWATCH_*` env vars and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn ponwatch_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("ponwatch");
    cmd.env("HOME", "/tmp/ponwatch-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/ponwatch-cli-test-nonexistent")
        .env_remove("PONWATCH_CONFIG")
        .env_remove("PONWATCH_OUTPUT")
        .env_remove("PONWATCH_TIMEOUT")
        .env_remove("RUST_LOG");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

/// One telemetry-only OLT whose community comes from an env var.
const ONE_OLT: &str = r#"
[olts.east]
host = "192.0.2.10"
community_env = "PONWATCH_TEST_COMMUNITY"
"#;

fn write_config(dir: &Path, contents: &str) -> PathBuf {
    let path = dir.join("config.toml");
    std::fs::write(&path, contents).unwrap();
    path
}

/// `ponwatch --config <path>` with the test community exported.
fn with_config(path: &Path) -> assert_cmd::Command {
    let mut cmd = ponwatch_cmd();
    cmd.arg("--config")
        .arg(path)
        .env("PONWATCH_TEST_COMMUNITY", "test-community");
    cmd
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = ponwatch_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    ponwatch_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("OLT")
            .and(predicate::str::contains("poll"))
            .and(predicate::str::contains("onus"))
            .and(predicate::str::contains("live")),
    );
}

#[test]
fn test_version_flag() {
    ponwatch_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("ponwatch"));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    ponwatch_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_completions_zsh() {
    ponwatch_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

// ── Argument errors ─────────────────────────────────────────────────

#[test]
fn test_invalid_subcommand() {
    let output = ponwatch_cmd().arg("foobar").output().unwrap();
    assert!(!output.status.success());
    let text = combined_output(&output);
    assert!(
        text.contains("unrecognized") || text.contains("foobar"),
        "Expected error mentioning invalid subcommand:\n{text}"
    );
}

#[test]
fn test_slot_requires_port_and_onu() {
    let output = ponwatch_cmd()
        .args(["onu", "reboot", "east", "12"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("PORT:ONU"));
}

#[test]
fn test_manual_poll_requires_olt() {
    let output = ponwatch_cmd().args(["poll", "--manual"]).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_onus_help_lists_watch() {
    ponwatch_cmd()
        .args(["onus", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--watch"));
}

// ── Configuration ───────────────────────────────────────────────────

#[test]
fn test_config_path_honours_flag() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("custom.toml");
    ponwatch_cmd()
        .arg("--config")
        .arg(&path)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("custom.toml"));
}

#[test]
fn test_config_show_masks_secrets() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        dir.path(),
        r#"
[olts.east]
host = "192.0.2.10"
community = "very-secret"
"#,
    );
    ponwatch_cmd()
        .arg("--config")
        .arg(&path)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("[olts.east]")
                .and(predicate::str::contains("very-secret").not()),
        );
}

#[test]
fn test_poll_without_config() {
    let dir = tempfile::tempdir().unwrap();
    ponwatch_cmd()
        .arg("--config")
        .arg(dir.path().join("missing.toml"))
        .arg("poll")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No OLTs configured"));
}

#[test]
fn test_unknown_olt_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), ONE_OLT);
    let output = with_config(&path).args(["poll", "west"]).output().unwrap();
    assert_eq!(output.status.code(), Some(4));
    assert!(combined_output(&output).contains("west"));
}

// ── Pre-connection validation ───────────────────────────────────────

#[test]
fn test_exec_rejects_write_commands() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), ONE_OLT);
    let output = with_config(&path)
        .args(["exec", "east", "reload"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("Command refused"));
}

#[test]
fn test_exec_requires_session_credentials() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), ONE_OLT);
    let output = with_config(&path)
        .args(["exec", "east", "show", "version"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(5));
}

#[test]
fn test_reboot_needs_confirmation_when_not_interactive() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), ONE_OLT);
    let output = with_config(&path)
        .args(["onu", "reboot", "east", "1:2"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("--yes"));
}
