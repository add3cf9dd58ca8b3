//! CLI smoke tests for the pairing-admin binary
//!
//! These run the real binary against temporary home directories and
//! SQLite files, covering configuration checks, migrations and the purge
//! resume command.

use std::path::Path;
use std::process::{Command, Stdio};
use tempfile::TempDir;

/// Helper to run the pairing-admin binary with given arguments
fn run_pairing_admin(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_pairing-admin"))
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .expect("Failed to execute pairing-admin")
}

/// Config rooted at `home` with a file database and console logging off.
fn write_config(home: &Path, modules: &str) -> std::path::PathBuf {
    let home_dir = home.to_string_lossy().replace('\\', "/");
    let yaml = format!(
        r#"
home_dir: "{home_dir}"
database:
  url: "sqlite://db/pairing.db"
  max_conns: 2
  busy_timeout_ms: 2000
logging:
  default:
    console_level: "off"
    file: ""
modules:
{modules}
"#
    );
    let path = home.join("config.yaml");
    std::fs::write(&path, yaml).expect("Failed to write config");
    path
}

#[test]
fn test_cli_help_command() {
    let output = run_pairing_admin(&["--help"]);

    assert!(output.status.success(), "Help command should succeed");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("pairing-admin"), "Should contain binary name");
    assert!(
        stdout.contains("Usage:") || stdout.contains("USAGE:"),
        "Should contain usage information"
    );
    assert!(stdout.contains("migrate"), "Should contain 'migrate' subcommand");
    assert!(stdout.contains("check"), "Should contain 'check' subcommand");
    assert!(
        stdout.contains("resume-purges"),
        "Should contain 'resume-purges' subcommand"
    );
    assert!(stdout.contains("--config"), "Should mention config option");
}

#[test]
fn test_cli_version_command() {
    let output = run_pairing_admin(&["--version"]);

    assert!(output.status.success(), "Version command should succeed");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("pairing-admin"));
    assert!(stdout.contains("0.1.0"));
}

#[test]
fn test_cli_invalid_command() {
    let output = run_pairing_admin(&["invalid-command"]);

    assert!(!output.status.success(), "Invalid command should fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("error:") || stderr.contains("unrecognized subcommand"),
        "Should report the unknown subcommand"
    );
}

#[test]
fn test_cli_missing_config_file() {
    let output = run_pairing_admin(&["--config", "/definitely/not/here.yaml", "check"]);

    assert!(!output.status.success(), "Missing config file should fail");
}

#[test]
fn test_cli_invalid_yaml() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("broken.yaml");
    std::fs::write(&path, "database: [unclosed\n  url: : :").unwrap();

    let output = run_pairing_admin(&["--config", path.to_str().unwrap(), "check"]);

    assert!(!output.status.success(), "Invalid YAML should fail");
}

#[test]
fn test_cli_check_valid_config() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = write_config(
        temp_dir.path(),
        "  pairing:\n    max_page_size: 50\n    lock_backend: local",
    );

    let output = run_pairing_admin(&["--config", config.to_str().unwrap(), "check"]);

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "check failed: {stderr}");
    assert!(stdout.contains("Configuration check passed"));
    assert!(stdout.contains("max_page_size: 50"));
}

#[test]
fn test_cli_check_rejects_bad_module_config() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = write_config(temp_dir.path(), "  pairing:\n    page_sise: 5");

    let output = run_pairing_admin(&["--config", config.to_str().unwrap(), "check"]);

    assert!(!output.status.success(), "Unknown pairing key should fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("pairing"), "Should name the module: {stderr}");
}

#[test]
fn test_cli_print_config() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = write_config(temp_dir.path(), "  pairing: {}");

    let output = run_pairing_admin(&["--config", config.to_str().unwrap(), "--print-config"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("sqlite://db/pairing.db"));
    assert!(stdout.contains("home_dir"));
}

#[test]
fn test_cli_migrate_then_resume_on_file_database() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = write_config(temp_dir.path(), "  pairing:\n    op_timeout_ms: 10000");
    let config = config.to_str().unwrap();

    let output = run_pairing_admin(&["--config", config, "migrate"]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "migrate failed: {stderr}");
    assert!(temp_dir.path().join("db").join("pairing.db").exists());

    // migrations are idempotent
    let output = run_pairing_admin(&["--config", config, "migrate"]);
    assert!(output.status.success());

    let output = run_pairing_admin(&["--config", config, "resume-purges"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "resume-purges failed: {stderr}");
    assert!(stdout.contains("Resumed 0 purge(s), 0 still incomplete"));
}

#[test]
fn test_cli_mock_resume_purges() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = write_config(temp_dir.path(), "  pairing: {}");

    let output = run_pairing_admin(&[
        "--config",
        config.to_str().unwrap(),
        "--mock",
        "resume-purges",
    ]);

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "mock resume failed: {stderr}");
    assert!(stdout.contains("Resumed 0 purge(s)"));
}
