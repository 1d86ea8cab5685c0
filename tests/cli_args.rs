//! Integration tests for CLI argument handling
//!
//! Tests store selection, header parsing and subcommand flags from the command line.

use std::process::Command;

/// Helper to run the CLI with given args and capture output
fn run_cli(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_fetchcache"))
        .args(args)
        .env_remove("REDIS_URL")
        .output()
        .expect("Failed to execute fetchcache")
}

#[test]
fn test_help_flag_exits_successfully() {
    let output = run_cli(&["--help"]);
    assert!(
        output.status.success(),
        "Expected --help to exit successfully"
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("fetchcache"), "Help should mention fetchcache");
    assert!(stdout.contains("get"), "Help should list the get command");
    assert!(stdout.contains("batch"), "Help should list the batch command");
}

#[test]
fn test_invalid_store_prints_error_and_exits() {
    let output = run_cli(&["--store", "postgres", "get", "--namespace", "ns", "http://x/{ids}"]);
    assert!(!output.status.success(), "Expected unknown store to fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("invalid") || stderr.contains("possible values"),
        "Should print error message about invalid store: {}",
        stderr
    );
}

#[test]
fn test_invalid_header_prints_error_and_exits() {
    let output = run_cli(&[
        "--store",
        "memory",
        "--header",
        "no-colon",
        "get",
        "--namespace",
        "ns",
        "http://x/{ids}",
    ]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Invalid header"), "stderr: {}", stderr);
}

#[test]
fn test_redis_store_without_url_fails() {
    let output = run_cli(&["--store", "redis", "get", "--namespace", "ns", "http://x/{ids}", "a"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("REDIS_URL"), "stderr: {}", stderr);
}

#[test]
fn test_get_with_no_ids_prints_null_value() {
    let output = run_cli(&["--store", "memory", "get", "--namespace", "ns", "http://127.0.0.1:9/{ids}"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let value: serde_json::Value = serde_json::from_str(&stdout).expect("stdout should be JSON");
    assert_eq!(value["key"], "ns:");
    assert!(value["value"].is_null());
}

#[test]
fn test_batch_with_unreachable_upstream_returns_empty_results() {
    let output = run_cli(&[
        "--store",
        "memory",
        "--timeout-secs",
        "1",
        "batch",
        "--throttle-ms",
        "0",
        "--namespace",
        "military:aircraft:v1",
        "http://127.0.0.1:9/details/{id}",
        "abc123",
    ]);
    assert!(output.status.success());
    let value: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(value["requested"], 1);
    assert_eq!(value["fetched"], 0);
    assert!(value["results"].as_object().unwrap().is_empty());
}

#[cfg(test)]
mod unit_tests {
    //! Unit tests for CLI parsing that don't require running the binary

    use clap::Parser;
    use fetchcache::cli::{parse_header_arg, Cli, Command};
    use fetchcache::config::{Settings, StoreKind};

    #[test]
    fn test_cli_defaults_to_file_store() {
        let cli = Cli::parse_from(["fetchcache", "get", "--namespace", "ns", "http://x/{ids}"]);
        assert_eq!(cli.store, StoreKind::File);
        assert!(cli.headers.is_empty());
    }

    #[test]
    fn test_cli_batch_flags() {
        let cli = Cli::parse_from([
            "fetchcache",
            "batch",
            "--namespace",
            "ns",
            "--throttle-ms",
            "250",
            "--limit",
            "3",
            "http://x/{id}",
            "a",
            "b",
        ]);
        match cli.command {
            Command::Batch(args) => {
                assert_eq!(args.throttle_ms, 250);
                assert_eq!(args.options().limit, 3);
                assert_eq!(args.ids, vec!["a", "b"]);
            }
            Command::Get(_) => panic!("expected batch"),
        }
    }

    #[test]
    fn test_parse_header_arg_returns_pair() {
        let (name, value) = parse_header_arg("x-api-key: abc").unwrap();
        assert_eq!(name, "x-api-key");
        assert_eq!(value, "abc");
    }

    #[test]
    fn test_settings_from_cli_redis() {
        let cli = Cli::parse_from([
            "fetchcache",
            "--store",
            "redis",
            "--redis-url",
            "redis://localhost:6379",
            "get",
            "--namespace",
            "ns",
            "http://x/{ids}",
        ]);
        let settings = Settings::from_cli(&cli).unwrap();
        assert_eq!(settings.store, StoreKind::Redis);
        assert_eq!(settings.redis_url.as_deref(), Some("redis://localhost:6379"));
    }
}
