//! CLI Integration Tests
//!
//! These tests run the `sensorlink` binary. None of them need a telemetry
//! backend; the one network test points at a closed local port.
//!
//! ```
//! cargo test --package sensorlink-cli --test cli_integration
//! ```

use std::path::Path;
use std::process::{Command, Output};

/// Run sensorlink with an isolated config file and no inherited SENSORLINK_* variables.
fn run_sensorlink(config: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_sensorlink"))
        .arg("--config")
        .arg(config)
        .args(args)
        .env_remove("SENSORLINK_ENDPOINT")
        .env_remove("SENSORLINK_DEVICE")
        .env_remove("SENSORLINK_BACKEND_URL")
        .env_remove("SENSORLINK_CONFIG")
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1")
        .output()
        .expect("Failed to run sensorlink binary")
}

fn temp_config() -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    (dir, path)
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_command() {
    let (_dir, config) = temp_config();
    let output = run_sensorlink(&config, &["--help"]);

    assert!(output.status.success(), "Help should succeed");

    let stdout = String::from_utf8_lossy(&output.stdout);
    for cmd in ["watch", "power", "devices", "configure", "config", "completions"] {
        assert!(stdout.contains(cmd), "Help should list {} command", cmd);
    }
}

#[test]
fn test_version_command() {
    let (_dir, config) = temp_config();
    let output = run_sensorlink(&config, &["--version"]);

    assert!(output.status.success(), "Version should succeed");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("sensorlink"), "Version should contain sensorlink");
}

#[test]
fn test_subcommand_help() {
    let (_dir, config) = temp_config();
    for cmd in ["watch", "power", "devices", "configure", "config"] {
        let output = run_sensorlink(&config, &[cmd, "--help"]);
        assert!(output.status.success(), "{} --help should succeed", cmd);
        assert!(!output.stdout.is_empty(), "{} --help should produce output", cmd);
    }
}

#[test]
fn test_completions() {
    let (_dir, config) = temp_config();
    let output = run_sensorlink(&config, &["completions", "bash"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("sensorlink"));
}

#[test]
fn test_no_color_env_accepts_common_values() {
    let (_dir, config) = temp_config();
    for value in ["1", "yes", "true", "0", ""] {
        let output = Command::new(env!("CARGO_BIN_EXE_sensorlink"))
            .arg("--config")
            .arg(&config)
            .args(["config", "path"])
            .env_remove("SENSORLINK_CONFIG")
            .env("NO_COLOR", value)
            .output()
            .expect("Failed to run sensorlink binary");

        assert!(
            output.status.success(),
            "NO_COLOR={:?}: {}",
            value,
            String::from_utf8_lossy(&output.stderr)
        );
    }
}

// =============================================================================
// Config Command
// =============================================================================

#[test]
fn test_config_path_uses_override() {
    let (_dir, config) = temp_config();
    let output = run_sensorlink(&config, &["config", "path"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), config.display().to_string());
}

#[test]
fn test_config_set_get_unset() {
    let (_dir, config) = temp_config();

    let output = run_sensorlink(&config, &["config", "set", "device", "ESP32-A"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let output = run_sensorlink(&config, &["config", "get", "device"]);
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "ESP32-A");

    let output = run_sensorlink(&config, &["config", "set", "tariff", "Commercial"]);
    assert!(output.status.success());
    let content = std::fs::read_to_string(&config).unwrap();
    assert!(content.contains("tariff = \"commercial\""));

    let output = run_sensorlink(&config, &["config", "unset", "device"]);
    assert!(output.status.success());
    let output = run_sensorlink(&config, &["config", "get", "device"]);
    assert!(output.stdout.is_empty());
}

#[test]
fn test_config_set_rejects_invalid_endpoint() {
    let (_dir, config) = temp_config();
    let output = run_sensorlink(&config, &["config", "set", "endpoint", "http://example.com"]);

    assert!(!output.status.success());
    assert!(!config.exists());
}

#[test]
fn test_config_show_json() {
    let (_dir, config) = temp_config();
    run_sensorlink(&config, &["config", "init"]);

    let output = run_sensorlink(&config, &["--json", "config", "show"]);
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["endpoint"], "ws://localhost:8080/ws/devices");
    assert_eq!(value["tariff"], "residential");
}

// =============================================================================
// Stream Commands (fail fast on bad input)
// =============================================================================

#[test]
fn test_watch_requires_device() {
    let (_dir, config) = temp_config();
    let output = run_sensorlink(&config, &["watch"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("No device specified"), "stderr: {}", stderr);
}

#[test]
fn test_watch_rejects_non_websocket_endpoint() {
    let (_dir, config) = temp_config();
    let output = run_sensorlink(
        &config,
        &["watch", "--device", "ESP32-A", "--endpoint", "http://localhost:8080"],
    );

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to start stream"), "stderr: {}", stderr);
}

#[test]
fn test_watch_rejects_zero_capacity() {
    let (_dir, config) = temp_config();
    let output = run_sensorlink(&config, &["watch", "--device", "ESP32-A", "--capacity", "0"]);
    assert!(!output.status.success());
}

#[test]
fn test_configure_rejects_bad_resolution() {
    let (_dir, config) = temp_config();
    let output = run_sensorlink(
        &config,
        &["configure", "--device", "cam-1", "--resolution", "huge"],
    );
    assert!(!output.status.success());
}

#[test]
fn test_configure_times_out_when_device_never_registers() {
    let (_dir, config) = temp_config();
    let output = run_sensorlink(
        &config,
        &[
            "--quiet",
            "configure",
            "--device",
            "ESP32-CAM-1",
            "--endpoint",
            "ws://127.0.0.1:1/ws/devices",
            "--backend-url",
            "http://127.0.0.1:1",
            "--wait",
            "1",
            "--dry-run",
        ],
    );

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("did not register within 1s"), "stderr: {}", stderr);
}

#[test]
fn test_devices_unreachable_endpoint_prints_empty_list() {
    let (_dir, config) = temp_config();
    let output = run_sensorlink(
        &config,
        &[
            "--quiet",
            "devices",
            "--endpoint",
            "ws://127.0.0.1:1/ws/devices",
            "--wait",
            "1",
        ],
    );

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout, "No devices registered.\n");
}
