/*!
 * Integration tests for the pfact binary: output, exit codes and config
 */

use predicates::prelude::*;
use std::process::{Command, Output};
use tempfile::TempDir;

fn pfact(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_pfact"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run pfact")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

#[test]
fn test_semiprime_output() {
    let output = pfact(&["15"]);
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout(&output), "15 3 5\nNumber of filters = 2\n");
}

#[test]
fn test_prime_output() {
    let output = pfact(&["13"]);
    assert_eq!(output.status.code(), Some(0));
    assert!(predicate::str::starts_with("13 is prime\n").eval(&stdout(&output)));
}

#[test]
fn test_not_semiprime_output() {
    let output = pfact(&["12"]);
    assert_eq!(output.status.code(), Some(0));
    assert!(predicate::str::contains("12 is not the product of two primes").eval(&stdout(&output)));
}

#[test]
fn test_two_is_prime_with_one_stage() {
    let output = pfact(&["2"]);
    assert_eq!(stdout(&output), "2 is prime\nNumber of filters = 1\n");
}

#[test]
fn test_usage_errors_exit_one() {
    let cases: &[&[&str]] = &[&[], &["abc"], &["-5"], &["0"], &["1"], &["15", "21"], &["99999999999999999999999"]];

    for args in cases {
        let output = pfact(args);
        assert_eq!(output.status.code(), Some(1), "args {:?}", args);
        assert!(
            predicate::str::contains("Usage:").eval(&stderr(&output)),
            "args {:?}: {}",
            args,
            stderr(&output)
        );
        assert!(output.stdout.is_empty(), "args {:?}", args);
    }
}

#[test]
fn test_help_exits_zero() {
    let output = pfact(&["--help"]);
    assert_eq!(output.status.code(), Some(0));
    assert!(predicate::str::contains("--schedule").eval(&stdout(&output)));
}

#[test]
fn test_json_report() {
    let output = pfact(&["--json", "35"]);
    assert_eq!(output.status.code(), Some(0));

    let report: serde_json::Value = serde_json::from_str(stdout(&output).trim()).unwrap();
    assert_eq!(report["n"], 35);
    assert_eq!(report["verdict"]["kind"], "semiprime");
    assert_eq!(report["verdict"]["p"], 5);
    assert_eq!(report["verdict"]["q"], 7);
    assert_eq!(report["stage_count"], 3);
    assert_eq!(report["stages"].as_array().unwrap().len(), 3);
}

#[test]
fn test_schedule_flag() {
    let output = pfact(&["--schedule", "sequential", "35"]);
    assert_eq!(stdout(&output), "35 5 7\nNumber of filters = 4\n");
}

#[test]
fn test_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pfact.toml");
    std::fs::write(&path, "schedule = \"sequential\"\nchannel_capacity = 2\n").unwrap();

    let output = pfact(&["--config", path.to_str().unwrap(), "35"]);
    assert_eq!(output.status.code(), Some(0));
    assert!(predicate::str::ends_with("Number of filters = 4\n").eval(&stdout(&output)));
}

#[test]
fn test_invalid_capacity_is_fatal() {
    let output = pfact(&["--channel-capacity", "0", "15"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(predicate::str::contains("channel_capacity").eval(&stderr(&output)));
}

#[test]
fn test_log_file_written() {
    let dir = TempDir::new().unwrap();
    let log_path = dir.path().join("pfact.log");

    let output = pfact(&["--log", log_path.to_str().unwrap(), "--log-level", "debug", "221"]);
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout(&output), "221 13 17\nNumber of filters = 6\n");

    let log = std::fs::read_to_string(&log_path).unwrap();
    assert!(predicate::str::contains("spawned stage").eval(&log));
}

#[test]
fn test_unknown_flag_is_named() {
    let output = pfact(&["--bogus", "15"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(predicate::str::contains("'--bogus'").eval(&stderr(&output)));
}

#[test]
fn test_invalid_config_file_is_fatal() {
    let dir = TempDir::new().unwrap();
    let cases = [
        ("zero_capacity.toml", "channel_capacity = 0\n", "channel_capacity"),
        ("bad_schedule.toml", "schedule = \"primes\"\n", "TOML"),
        ("not_toml.toml", "schedule = [\n", "TOML"),
    ];

    for (name, contents, expected) in cases {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();

        let output = pfact(&["--config", path.to_str().unwrap(), "15"]);
        assert_eq!(output.status.code(), Some(2), "{}", name);
        assert!(output.stdout.is_empty(), "{}", name);
        assert!(
            predicate::str::contains(expected).eval(&stderr(&output)),
            "{}: {}",
            name,
            stderr(&output)
        );
    }
}

#[test]
fn test_missing_config_file_is_fatal() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.toml");

    let output = pfact(&["--config", path.to_str().unwrap(), "15"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(output.stdout.is_empty());
    assert!(predicate::str::contains("Failed to read").eval(&stderr(&output)));
}

#[test]
fn test_unwritable_log_file_is_fatal() {
    let dir = TempDir::new().unwrap();
    let log_path = dir.path().join("missing-dir").join("pfact.log");

    let output = pfact(&["--log", log_path.to_str().unwrap(), "15"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(output.stdout.is_empty());
}

#[test]
fn test_config_output_json_formats_errors() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pfact.toml");
    std::fs::write(&path, "output = \"json\"\n").unwrap();

    let output = pfact(&["--config", path.to_str().unwrap(), "1"]);
    assert_eq!(output.status.code(), Some(1));

    let err = stderr(&output);
    let last = err.lines().last().unwrap();
    let line: serde_json::Value = serde_json::from_str(last).unwrap();
    assert_eq!(line["category"], "usage");
}
