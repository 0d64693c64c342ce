//! CLI integration tests

use std::process::{Command, Output};
use tempfile::TempDir;

fn ocean(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_ocean"))
        .args(args)
        .env_remove("OCEAN_CONFIG")
        .output()
        .expect("Failed to execute command")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = ocean(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(
        stdout.contains("Ocean Observation Pipeline"),
        "Should show app name"
    );
    for command in ["regions", "analyze", "predict", "cache", "models"] {
        assert!(stdout.contains(command), "Should show {} command", command);
    }
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = ocean(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("ocean"), "Should show binary name");
}

#[test]
fn test_predict_help() {
    let output = ocean(&["predict", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Predict help should succeed");
    for flag in ["--lat", "--lon", "--depth", "--month"] {
        assert!(stdout.contains(flag), "Should show {} option", flag);
    }
}

#[test]
fn test_predict_rejects_month_out_of_range() {
    let output = ocean(&[
        "predict", "--lat", "15", "--lon", "65", "--depth", "50", "--month", "13",
    ]);
    assert!(!output.status.success(), "Month 13 should be rejected");
}

#[test]
fn test_cache_subcommands_help() {
    let output = ocean(&["cache", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("info"), "Should show info subcommand");
    assert!(stdout.contains("clear"), "Should show clear subcommand");
}

#[test]
fn test_models_importance_help() {
    let output = ocean(&["models", "importance", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("--parameter"), "Should show parameter option");
}

#[test]
fn test_regions_lists_defaults_as_json() {
    let output = ocean(&["regions", "--format", "json"]);
    assert!(output.status.success(), "Regions should succeed");

    let regions: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let keys: Vec<&str> = regions
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["key"].as_str().unwrap())
        .collect();
    assert_eq!(keys, vec!["arabian_sea", "bay_of_bengal", "north_indian_ocean"]);
}

#[test]
fn test_cache_info_for_unknown_region_fails() {
    let output = ocean(&["cache", "info", "--region", "atlantis"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success());
    assert!(stderr.contains("atlantis"));
}

#[test]
fn test_cache_info_reports_nothing_cached() {
    let temp_dir = TempDir::new().unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_ocean"))
        .args(["cache", "info", "--region", "bay_of_bengal", "--format", "json"])
        .env("OCEAN__STORAGE__CACHE_DIR", temp_dir.path().join("data_cache"))
        .env_remove("OCEAN_CONFIG")
        .output()
        .expect("Failed to execute command");
    assert!(output.status.success());

    let info: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(info["cached"], false);
    assert_eq!(info["valid"], false);
}
