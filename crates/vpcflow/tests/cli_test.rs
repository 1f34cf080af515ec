#![allow(deprecated)] // TODO: cargo_bin → cargo_bin_cmd! once assert_cmd 2.1 is the floor

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;

const TWO_VPCS: &str = r#"
- Region: us-east-1
  vpc_name: core
  Template: vpc.yaml
  Parameters:
    VPCCIDRBlock: 10.0.0.0/16
- Region: eu-west-1
  vpc_name: edge
  Template: vpc.yaml
  Parameters:
    VPCCIDRBlock: 10.1.0.0/16
"#;

fn vpcflow(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("vpcflow").unwrap();
    cmd.current_dir(dir)
        .env_remove("VPCFLOW_SETTINGS")
        .env_remove("RUST_LOG");
    cmd
}

fn write_project(dir: &Path, config: &str) {
    fs::write(dir.join("vpcs.yaml"), config).unwrap();
    fs::create_dir(dir.join("templates")).unwrap();
    fs::write(
        dir.join("templates/vpc.yaml"),
        "AWSTemplateFormatVersion: '2010-09-09'\nResources: {}\n",
    )
    .unwrap();
}

#[test]
fn test_cli_help() {
    let dir = tempfile::tempdir().unwrap();
    vpcflow(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("up"))
        .stdout(predicate::str::contains("deploy"))
        .stdout(predicate::str::contains("peer"))
        .stdout(predicate::str::contains("route"))
        .stdout(predicate::str::contains("validate"));
}

#[test]
fn test_up_help() {
    let dir = tempfile::tempdir().unwrap();
    vpcflow(dir.path())
        .args(["up", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("<CONFIG>"))
        .stdout(predicate::str::contains("<TEMPLATE_DIR>"))
        .stdout(predicate::str::contains("--max-in-flight"))
        .stdout(predicate::str::contains("--topology"));
}

#[test]
fn test_invalid_command() {
    let dir = tempfile::tempdir().unwrap();
    vpcflow(dir.path()).arg("invalid-command").assert().failure();
}

#[test]
fn test_up_requires_arguments() {
    let dir = tempfile::tempdir().unwrap();
    vpcflow(dir.path()).arg("up").assert().failure();
}

#[test]
fn test_validate_project() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path(), TWO_VPCS);

    vpcflow(dir.path())
        .args(["validate", "vpcs.yaml", "templates"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"))
        .stdout(predicate::str::contains("us-east-1-core"))
        .stdout(predicate::str::contains("eu-west-1-edge"))
        .stdout(predicate::str::contains("Peering: 1 connections (mesh)"));
}

#[test]
fn test_validate_reads_settings_file() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path(), TWO_VPCS);
    fs::write(dir.path().join("custom.yaml"), "mesh:\n  topology: hub\n").unwrap();

    vpcflow(dir.path())
        .args(["validate", "vpcs.yaml", "templates", "--settings", "custom.yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(hub)"));
}

#[test]
fn test_validate_missing_config() {
    let dir = tempfile::tempdir().unwrap();
    vpcflow(dir.path())
        .args(["validate", "missing.yaml", "templates"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load VPC list"));
}

#[test]
fn test_validate_duplicate_vpc() {
    let dir = tempfile::tempdir().unwrap();
    let duplicated = format!(
        "{TWO_VPCS}- Region: us-east-1\n  vpc_name: core\n  Template: vpc.yaml\n"
    );
    write_project(dir.path(), &duplicated);

    vpcflow(dir.path())
        .args(["validate", "vpcs.yaml", "templates"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("defined more than once"));
}

#[test]
fn test_validate_missing_template() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path(), TWO_VPCS);
    fs::remove_file(dir.path().join("templates/vpc.yaml")).unwrap();

    vpcflow(dir.path())
        .args(["validate", "vpcs.yaml", "templates"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("vpc.yaml"));
}

#[test]
fn test_invalid_topology_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path(), TWO_VPCS);

    vpcflow(dir.path())
        .args(["up", "vpcs.yaml", "templates", "--topology", "ring"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown topology"));
}
