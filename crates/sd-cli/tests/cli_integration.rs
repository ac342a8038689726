//! CLI integration tests
//!
//! Tests the syno-deploy CLI using assert_cmd. Nothing here needs a reachable
//! host: remote commands are exercised through dry runs.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn syno_deploy() -> Command {
    let mut cmd = Command::cargo_bin("syno-deploy")
        .expect("Failed to locate syno-deploy binary - ensure it's built before running tests");
    cmd.env_remove("SYNO_DEPLOY_HOST")
        .env_remove("SYNO_DEPLOY_USER")
        .env_remove("RUST_LOG");
    cmd
}

/// Write a config file and return its path
fn write_config(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("config.toml");
    std::fs::write(&path, body).unwrap();
    path
}

fn project_dir() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("docker-compose.yml"),
        r#"
services:
  web:
    image: nginx:${TAG}
    ports:
      - "8080:80"
    volumes:
      - ./html:/usr/share/nginx/html
  cache:
    image: redis:7
"#,
    )
    .unwrap();
    std::fs::write(dir.path().join(".env"), "TAG=1.25\n").unwrap();
    dir
}

#[test]
fn test_cli_help() {
    syno_deploy()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("syno-deploy"))
        .stdout(predicate::str::contains("Synology"));
}

#[test]
fn test_cli_version() {
    syno_deploy()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("syno-deploy"));
}

#[test]
fn test_cli_deploy_help() {
    syno_deploy()
        .args(["deploy", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("--env-file"));
}

#[test]
fn test_cli_run_help() {
    syno_deploy()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--publish"))
        .stdout(predicate::str::contains("--volume"));
}

#[test]
fn test_cli_invalid_subcommand() {
    syno_deploy()
        .arg("invalid-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_cli_config_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("custom.toml");
    syno_deploy()
        .args(["config", "path", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("custom.toml"));
}

#[test]
fn test_cli_config_show() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), "[remote]\nhost = \"nas.local\"\n");
    syno_deploy()
        .args(["config", "show", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("nas.local"))
        .stdout(predicate::str::contains("unless-stopped"));
}

#[test]
fn test_cli_missing_explicit_config() {
    let dir = tempfile::tempdir().unwrap();
    syno_deploy()
        .args(["config", "show", "--config"])
        .arg(dir.path().join("missing.toml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_cli_deploy_dry_run() {
    let project = project_dir();
    let config = write_config(project.path(), "[defaults]\nvolume_path = \"/volume2/apps\"\n");

    syno_deploy()
        .current_dir(project.path())
        .args(["deploy", "--dry-run", "-p", "myapp", "--env-file", ".env", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "/usr/local/bin/docker pull nginx:1.25",
        ))
        .stdout(predicate::str::contains(
            "--name myapp_web_1 -p 8080:80 -v /volume2/apps/html:/usr/share/nginx/html",
        ))
        .stdout(predicate::str::contains("--name myapp_cache_1"));
}

#[test]
fn test_cli_deploy_dry_run_json() {
    let project = project_dir();
    let config = write_config(project.path(), "");

    syno_deploy()
        .current_dir(project.path())
        .args(["deploy", "--dry-run", "--json", "--pull", "never", "-p", "myapp", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"dry_run\": true"))
        .stdout(predicate::str::contains("\"container\": \"myapp_web_1\""))
        .stdout(predicate::str::contains("docker pull").not());
}

#[test]
fn test_cli_deploy_fails_fast() {
    let dir = tempfile::tempdir().unwrap();
    let compose = dir.path().join("docker-compose.yml");
    std::fs::write(
        &compose,
        "services:\n  web:\n    image: nginx\n  db:\n    image: postgres:16\n    volumes:\n      - ./data:data\n",
    )
    .unwrap();
    let config = write_config(dir.path(), "");

    syno_deploy()
        .args(["deploy", "--dry-run", "--config"])
        .arg(&config)
        .arg(&compose)
        .assert()
        .failure()
        .stderr(predicate::str::contains("service 'db'"))
        .stderr(predicate::str::contains("container path must be absolute"));
}

#[test]
fn test_cli_deploy_derives_project_from_directory() {
    let dir = tempfile::tempdir().unwrap();
    let app = dir.path().join(".My.App");
    std::fs::create_dir(&app).unwrap();
    std::fs::write(app.join("docker-compose.yml"), "services:\n  web:\n    image: nginx\n")
        .unwrap();
    let config = write_config(dir.path(), "");

    syno_deploy()
        .current_dir(&app)
        .args(["deploy", "--dry-run", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("--name myapp_web_1"));
}

#[test]
fn test_cli_failure_reported_as_error_line() {
    let dir = tempfile::tempdir().unwrap();
    syno_deploy()
        .args(["config", "show", "--config"])
        .arg(dir.path().join("missing.toml"))
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("✗ "))
        .stderr(predicate::str::contains("Failed to load configuration: "))
        .stderr(predicate::str::contains("Error:").not());
}

#[test]
fn test_cli_deploy_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "");
    syno_deploy()
        .current_dir(dir.path())
        .args(["deploy", "--dry-run", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("docker-compose.yml"));
}

#[test]
fn test_cli_run_rejects_bad_port() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "");
    syno_deploy()
        .args(["run", "nginx", "-p", "80", "--dry-run", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid port mapping"));
}

#[test]
fn test_cli_run_dry_run_names_container() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "");
    syno_deploy()
        .args(["run", "linuxserver/plex:latest", "--dry-run", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("'plex'"));
}

#[test]
fn test_cli_ps_requires_host() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "[remote]\nuse_agent = true\n");
    syno_deploy()
        .args(["ps", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("remote.host"));
}
