//! Demo binary integration tests.
//!
//! Tests:
//! - --help lists the telemetry options
//! - A short run exits cleanly and flushes on exit
//! - Request logs carry the server span's trace context
//! - Invalid configuration is reported with a failing exit code

use std::io::Write;
use std::process::{Command, Output};

const TOKEN: &str = "00-0af7651916cd43dd8448eb211c80319c-b9c7c989f97918e1-01";

/// Run the demo binary with a clean telemetry environment.
fn run_demo(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_telemetry-demo"))
        .args(args)
        .env_remove("RESOURCE_COMPONENT")
        .env_remove("TELEMETRY_CONFIG_FILE")
        .env_remove("OTEL_EXPORTER_OTLP_ENDPOINT")
        .env_remove("RUST_LOG")
        .env("LOG_LEVEL", "warn")
        .output()
        .expect("failed to run telemetry-demo")
}

#[test]
fn test_cli_help_output() {
    let output = run_demo(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    for option in [
        "--component",
        "--component-version",
        "--iterations",
        "--link",
        "--config-file",
        "--log-format",
    ] {
        assert!(stdout.contains(option), "help should mention {option}");
    }
}

#[test]
fn test_short_run_exits_cleanly() {
    let output = run_demo(&[
        "--component",
        "cli-test",
        "--iterations",
        "2",
        "--interval-ms",
        "0",
        "--link",
        TOKEN,
        "--link",
        "not-a-token",
    ]);

    assert!(
        output.status.success(),
        "demo failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(String::from_utf8_lossy(&output.stderr).contains("telemetry-demo finished"));
}

#[test]
fn test_request_logs_carry_trace_context() {
    let output = run_demo(&[
        "--component",
        "cli-test",
        "--iterations",
        "1",
        "--interval-ms",
        "0",
        "--log-level",
        "info",
        "--log-format",
        "json",
        "--link",
        TOKEN,
    ]);
    assert!(
        output.status.success(),
        "demo failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    let events: Vec<serde_json::Value> = stdout
        .lines()
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect();

    let installed = events
        .iter()
        .find(|e| e["fields"]["message"] == "Telemetry providers installed")
        .expect("providers line should be logged");
    assert_eq!(installed["fields"]["otlp"], false);

    let request = events
        .iter()
        .find(|e| e["fields"]["message"] == "Handling request")
        .expect("request line should be logged");
    let trace_id = request["trace_id"].as_str().expect("trace_id field");
    assert_eq!(trace_id.len(), 32);
    let traceparent = request["traceparent"].as_str().expect("traceparent field");
    assert!(traceparent.starts_with(&format!("00-{trace_id}-")));
}

#[test]
fn test_missing_component_fails() {
    let output = run_demo(&["--iterations", "1"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("component"));
}

#[test]
fn test_config_file_run() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"component": "file-test", "environment": "ci", "logLevel": "warn"}}"#
    )
    .unwrap();

    let path = file.path().to_str().unwrap();
    let output = run_demo(&["--config-file", path, "--iterations", "1", "--interval-ms", "0"]);

    assert!(
        output.status.success(),
        "demo failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn test_missing_config_file_fails() {
    let output = run_demo(&["--config-file", "/nonexistent/telemetry.json"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed to load"));
}
