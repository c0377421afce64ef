//! Integration tests for CLI commands.
use std::fs;
use tempfile::tempdir;

mod common;
use common::{assert_nexus_water_fails, assert_nexus_water_runs, get_nexus_water_stdout};

const DEMO_NAME: &str = "simple";

/// Test the `build` command, including that repeated builds give identical results
#[test]
fn check_build_command() {
    let tmp = tempdir().unwrap();
    let root = tmp.path();
    let model_dir = root.join(DEMO_NAME);
    let model_dir_str = model_dir.to_string_lossy();
    assert_nexus_water_runs(root, &["demo", "extract", DEMO_NAME, &model_dir_str]);

    let out1 = root.join("out1");
    assert_nexus_water_runs(
        root,
        &["build", &model_dir_str, "--output-dir", &out1.to_string_lossy()],
    );
    assert!(out1.join("summary.toml").is_file());
    assert!(out1.join("skipped.csv").is_file());

    // The scenario defaults to the model directory name
    let scenario_dir = root.join("nexus_water_scenarios").join(DEMO_NAME).join("baseline");
    assert!(scenario_dir.join("commits.csv").is_file());
    assert!(scenario_dir.join("technical_lifetime.csv").is_file());

    // The scenario already exists
    let out2 = root.join("out2");
    assert_nexus_water_fails(
        root,
        &["build", &model_dir_str, "--output-dir", &out2.to_string_lossy()],
    );

    let out3 = root.join("out3");
    assert_nexus_water_runs(
        root,
        &[
            "build",
            &model_dir_str,
            "--output-dir",
            &out3.to_string_lossy(),
            "--overwrite",
        ],
    );
    assert_eq!(
        fs::read_to_string(out1.join("parameters.csv")).unwrap(),
        fs::read_to_string(out3.join("parameters.csv")).unwrap()
    );
}

/// Test the `build` command with an explicit scenario URL
#[test]
fn check_build_command_with_scenario() {
    let tmp = tempdir().unwrap();
    let root = tmp.path();
    let scenario_dir = root.join("custom");
    let url = format!("file://{}", scenario_dir.display());
    assert_nexus_water_runs(root, &["demo", "build", DEMO_NAME, "--scenario", &url]);

    assert!(scenario_dir.join("commits.csv").is_file());
    assert!(root.join("nexus_water_results").join(DEMO_NAME).is_dir());
}

/// Test the `validate` command
#[test]
fn check_validate_command() {
    let tmp = tempdir().unwrap();
    let model_dir = tmp.path().join(DEMO_NAME);
    let model_dir_str = model_dir.to_string_lossy();
    assert_nexus_water_runs(tmp.path(), &["demo", "extract", DEMO_NAME, &model_dir_str]);
    assert_nexus_water_runs(tmp.path(), &["validate", &model_dir_str]);

    // Nothing is written
    assert!(!tmp.path().join("nexus_water_scenarios").exists());
}

/// Test the `validate` command on a directory which is not a model
#[test]
fn check_validate_command_fails() {
    let tmp = tempdir().unwrap();
    assert_nexus_water_fails(tmp.path(), &["validate", &tmp.path().to_string_lossy()]);
}

/// Test the `demo list` and `demo info` commands
#[test]
fn check_demo_list_and_info_commands() {
    let tmp = tempdir().unwrap();
    let stdout = get_nexus_water_stdout(tmp.path(), &["demo", "list"]);
    assert!(stdout.lines().any(|line| line == DEMO_NAME));

    let readme = get_nexus_water_stdout(tmp.path(), &["demo", "info", DEMO_NAME]);
    assert!(readme.contains("R11_AFR"));

    assert_nexus_water_fails(tmp.path(), &["demo", "info", "missing"]);
}

/// Test the `settings show-default` command
#[test]
fn check_settings_show_default_command() {
    let tmp = tempdir().unwrap();
    let stdout = get_nexus_water_stdout(tmp.path(), &["settings", "show-default"]);
    assert!(stdout.contains("# store_retries = 2"));
}
