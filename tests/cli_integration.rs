//! Integration tests for the command line.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

#[test]
fn test_region_point_inside() {
    let mut cmd = cargo_bin_cmd!("scenewatch");
    cmd.args(["region", "--area", "(0,0),(10,0),(10,10),(0,10)", "--point", "5,5"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("1 polygon(s)"))
        .stdout(predicate::str::contains("is inside"));
}

#[test]
fn test_region_point_outside() {
    let mut cmd = cargo_bin_cmd!("scenewatch");
    cmd.args(["region", "--area", "(0,0),(10,0),(10,10),(0,10)", "--point", "50,50"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("is outside"));
}

#[test]
fn test_region_multiple_polygons() {
    let mut cmd = cargo_bin_cmd!("scenewatch");
    cmd.args([
        "region",
        "--area",
        "(0,0),(10,0),(10,10);(100,100),(110,100),(110,110),(100,110)",
        "--point",
        "105,105",
    ]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("2 polygon(s)"))
        .stdout(predicate::str::contains("is inside"));
}

#[test]
fn test_empty_region_passes_everything() {
    let mut cmd = cargo_bin_cmd!("scenewatch");
    cmd.args(["region", "--area", "", "--point", "-3,7"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("every point passes"))
        .stdout(predicate::str::contains("is inside"));
}

#[test]
fn test_malformed_region_fails() {
    let mut cmd = cargo_bin_cmd!("scenewatch");
    cmd.args(["region", "--area", "(0,0),(10,x),(10,10)", "--point", "1,1"]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("invalid region"));
}

#[test]
fn test_bad_point_is_usage_error() {
    let mut cmd = cargo_bin_cmd!("scenewatch");
    cmd.args(["region", "--area", "(0,0),(10,0),(10,10)", "--point", "1"]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("expected X,Y"));
}

#[test]
fn test_config_path_honours_override() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("site.toml");

    let mut cmd = cargo_bin_cmd!("scenewatch");
    cmd.arg("--config").arg(&path).args(["config", "path"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("site.toml"));
}

#[test]
fn test_config_init_then_show() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let mut init = cargo_bin_cmd!("scenewatch");
    init.args(["config", "init", "--config"]).arg(&path);
    init.assert()
        .success()
        .stdout(predicate::str::contains("Created configuration file"));
    assert!(path.exists());

    let mut again = cargo_bin_cmd!("scenewatch");
    again.args(["config", "init", "--config"]).arg(&path);
    again
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));

    let mut show = cargo_bin_cmd!("scenewatch");
    show.args(["config", "show", "--config"]).arg(&path);
    show.assert()
        .success()
        .stdout(predicate::str::contains("max_failed_ticks"))
        .stdout(predicate::str::contains("cooldown_secs"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[alarm]\nconsecutive_frames = 0\n").unwrap();

    let mut cmd = cargo_bin_cmd!("scenewatch");
    cmd.args(["config", "show", "--config"]).arg(&path);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("configuration validation failed"));
}

#[test]
fn test_help_lists_commands() {
    let mut cmd = cargo_bin_cmd!("scenewatch");
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("region"))
        .stdout(predicate::str::contains("config"));
}
