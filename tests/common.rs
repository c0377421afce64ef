use assert_cmd::cargo_bin_cmd;
use std::path::Path;

/// Get a command for the program binary which ignores the user's settings file.
///
/// Default results and scenario folders are relative paths, so they end up in `working_dir`.
fn nexus_water_command(working_dir: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("nexus-water");
    cmd.env("NEXUS_WATER_USE_DEFAULT_SETTINGS", "1")
        .env("NEXUS_WATER_LOG_LEVEL", "warn")
        .current_dir(working_dir);
    cmd
}

/// Run the program with the given arguments and check that it succeeds
#[allow(dead_code)]
pub fn assert_nexus_water_runs(working_dir: &Path, args: &[&str]) {
    nexus_water_command(working_dir).args(args).assert().success();
}

/// Run the program with the given arguments and check that it fails
#[allow(dead_code)]
pub fn assert_nexus_water_fails(working_dir: &Path, args: &[&str]) {
    nexus_water_command(working_dir).args(args).assert().failure();
}

/// Run the program and return what it prints to stdout
#[allow(dead_code)]
pub fn get_nexus_water_stdout(working_dir: &Path, args: &[&str]) -> String {
    let output = nexus_water_command(working_dir)
        .args(args)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    String::from_utf8(output).unwrap()
}
