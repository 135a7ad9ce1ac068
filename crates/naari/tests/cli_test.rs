//! Integration tests for the `naari` CLI binary.
//!
//! Argument parsing, config handling and one end-to-end status run against
//! a wiremock device. Config dirs point at temp paths so tests never touch
//! the user's real configuration.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

fn naari_cmd(home: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("naari");
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home)
        .env_remove("NAARI_CONFIG")
        .env_remove("RUST_LOG");
    cmd
}

fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

fn write_config(dir: &Path, body: &str) -> std::path::PathBuf {
    let path = dir.join("config.toml");
    std::fs::write(&path, body).unwrap();
    path
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let home = tempfile::tempdir().unwrap();
    let output = naari_cmd(home.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("Usage"));
}

#[test]
fn test_help_lists_commands() {
    let home = tempfile::tempdir().unwrap();
    naari_cmd(home.path()).arg("--help").assert().success().stdout(
        predicate::str::contains("status")
            .and(predicate::str::contains("master-power"))
            .and(predicate::str::contains("theme")),
    );
}

#[test]
fn test_version_flag() {
    let home = tempfile::tempdir().unwrap();
    naari_cmd(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("naari"));
}

#[test]
fn test_invalid_power_action_is_usage_error() {
    let home = tempfile::tempdir().unwrap();
    naari_cmd(home.path())
        .args(["power", "1", "sideways"])
        .assert()
        .code(2);
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_missing_config_exits_not_found() {
    let home = tempfile::tempdir().unwrap();
    let missing = home.path().join("nope.toml");
    let output = naari_cmd(home.path())
        .arg("--config")
        .arg(&missing)
        .arg("status")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(4));
    assert!(combined_output(&output).contains("naari config init"));
}

#[test]
fn test_config_init_then_show() {
    let home = tempfile::tempdir().unwrap();
    let config = home.path().join("conf").join("config.toml");

    naari_cmd(home.path())
        .arg("--config")
        .arg(&config)
        .args(["config", "init"])
        .assert()
        .success();
    assert!(config.exists());

    naari_cmd(home.path())
        .arg("--config")
        .arg(&config)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("WLED Controller").and(predicate::str::contains("retry_backoff")));

    // A second init without --force refuses to overwrite.
    naari_cmd(home.path())
        .arg("--config")
        .arg(&config)
        .args(["config", "init"])
        .assert()
        .code(6);
}

#[test]
fn test_config_path_honours_env() {
    let home = tempfile::tempdir().unwrap();
    let config = home.path().join("custom.toml");
    naari_cmd(home.path())
        .env("NAARI_CONFIG", &config)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("custom.toml"));
}

#[test]
fn test_second_master_is_rejected() {
    let home = tempfile::tempdir().unwrap();
    let config = write_config(
        home.path(),
        "[[devices]]\nid = 1\naddress = \"a\"\nmaster_sync = true\n\n\
         [[devices]]\nid = 2\naddress = \"b\"\nmaster_sync = true\n",
    );
    naari_cmd(home.path())
        .arg("--config")
        .arg(&config)
        .arg("status")
        .assert()
        .code(2);
}

// ── Against a device ────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_status_json_against_device() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "state": { "on": true, "bri": 77, "udpn": { "send": false } }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/presets.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"1": {"n": "Glow"}})))
        .mount(&server)
        .await;

    let home = tempfile::tempdir().unwrap();
    let config = write_config(
        home.path(),
        &format!(
            "[[devices]]\nid = 1\naddress = \"{}\"\ninstance_name = \"Desk\"\n",
            server.address()
        ),
    );

    let output = naari_cmd(home.path())
        .arg("--config")
        .arg(&config)
        .args(["-o", "json-compact", "status"])
        .output()
        .unwrap();

    assert!(output.status.success(), "{}", combined_output(&output));
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed[0]["id"], 1);
    assert_eq!(parsed[0]["data"]["state"]["bri"], 77);
}
