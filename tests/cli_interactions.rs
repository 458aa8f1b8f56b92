//! CLI options interaction tests
//!
//! These run the real binary. Runs that need a measurement tool use
//! `/bin/sh` as the binary: the client arguments start with `-c <address>`,
//! so the address becomes the script the shell executes.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::TempDir;

const REPORT: &str = r#"{"start":{"connecting_to":{"host":"10.0.0.2","port":5201}},"intervals":[],"end":{"sum_sent":{"seconds":10.0,"bytes":1250000000,"bits_per_second":1000000000.0},"sum_received":{"seconds":10.0,"bytes":1250000000,"bits_per_second":998000000.0}}}"#;

/// Helper function to create a test command isolated from the caller's environment
fn create_test_cmd(workdir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("iperf3r").unwrap();
    cmd.current_dir(workdir.path());
    for var in [
        "IPERF3_BINARY", "IPERF3_OUTPUT_DIR", "CLIENT_ADDRESS", "CLIENT_PORT", "CLIENT_PROTOCOL",
        "CLIENT_DURATION", "CLIENT_STREAMS", "REPEAT_COUNT", "REPEAT_INTERVAL", "SERVER_PORT", "ENABLE_COLOR",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

fn script_printing_report() -> String {
    format!("printf '%s' '{}'", REPORT)
}

#[test]
fn test_help_lists_run_options() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--repeat"))
        .stdout(predicate::str::contains("--output-dir"))
        .stdout(predicate::str::contains("--mode"));
}

#[test]
fn test_version() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_conflicting_color_flags() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .args(["--color", "--no-color"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Cannot specify both --color and --no-color"));
}

#[test]
fn test_client_flag_in_server_mode() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .args(["--mode", "server", "--udp"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("only valid in client mode"));
}

#[test]
fn test_unknown_mode_rejected() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .args(["--mode", "relay"])
        .assert()
        .failure();
}

#[test]
fn test_show_config_reflects_overrides() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .args(["--show-config", "-c", "10.0.0.9", "-n", "4", "--no-color"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Server: 10.0.0.9:5201"))
        .stdout(predicate::str::contains("Repeat: 4 x every 0s"));
}

#[test]
fn test_env_file_is_applied() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(".env"), "CLIENT_ADDRESS=192.168.7.7\nCLIENT_STREAMS=3\n").unwrap();

    create_test_cmd(&dir)
        .args(["--show-config", "--no-color"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Server: 192.168.7.7:5201"))
        .stdout(predicate::str::contains("Streams: 3"));
}

#[test]
fn test_config_file_is_created() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("conf").join("iperf3r.json");

    create_test_cmd(&dir)
        .arg("--config")
        .arg(&config_path)
        .args(["--show-config", "--no-color"])
        .assert()
        .success();

    let written = fs::read_to_string(&config_path).unwrap();
    assert!(written.contains("\"repeat_count\": 1"));
}

#[test]
fn test_missing_output_dir_is_config_error() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .arg("-o")
        .arg(dir.path().join("does-not-exist"))
        .arg("--no-color")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Output directory does not exist"));
}

#[test]
fn test_missing_binary_is_spawn_error() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .arg("--binary")
        .arg(dir.path().join("no-such-iperf3"))
        .arg("--no-color")
        .assert()
        .code(2)
        .stdout(predicate::str::contains("Repeat Times: 1/1"))
        .stderr(predicate::str::contains("Suggestion: Install iperf3 or point --binary"))
        .stderr(predicate::str::contains("Launch troubleshooting"));
}

#[test]
fn test_status_interval_option() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .args(["--show-config", "--no-color", "--status-interval", "0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Status Interval: 0s"));
}

#[cfg(unix)]
#[test]
fn test_repeated_client_runs_save_reports() {
    let dir = TempDir::new().unwrap();
    let results = TempDir::new().unwrap();

    create_test_cmd(&dir)
        .args(["--binary", "/bin/sh", "--no-color", "-n", "2"])
        .arg("-c")
        .arg(script_printing_report())
        .arg("-o")
        .arg(results.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Repeat Times: 1/2"))
        .stdout(predicate::str::contains("Repeat Times: 2/2"))
        .stdout(predicate::str::contains("1.0 Gbits/sec"));

    let artifacts: Vec<_> = fs::read_dir(results.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .collect();
    assert!(!artifacts.is_empty());
    assert!(artifacts.iter().all(|name| name.starts_with("iperf3_") && name.ends_with(".json")));

    let saved = fs::read_to_string(results.path().join(&artifacts[0])).unwrap();
    assert!(saved.contains("\n    \"end\": {"));
}

#[cfg(unix)]
#[test]
fn test_failing_client_run_sets_exit_code() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .args(["--binary", "/bin/sh", "--no-color", "-c", "echo 'iperf3: error - unable to connect' >&2; exit 1"])
        .assert()
        .code(3)
        .stdout(predicate::str::contains("exit code 1"));
}

#[cfg(unix)]
#[test]
fn test_non_json_output_is_reported() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .args(["--binary", "/bin/sh", "--no-color", "-c", "echo plain text report"])
        .assert()
        .code(3)
        .stdout(predicate::str::contains("Report could not be decoded"));
}

#[cfg(unix)]
#[test]
fn test_status_line_printed_during_run() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .args(["--binary", "/bin/sh", "--no-color", "--status-interval", "1"])
        .arg("-c")
        .arg(format!("sleep 1.6; {}", script_printing_report()))
        .assert()
        .success()
        .stdout(predicate::str::contains("[client] CPU: "))
        .stdout(predicate::str::contains("% MEM: "));
}
