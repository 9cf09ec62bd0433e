//! Runs the `corral` binary end to end against a scripted `docker`.

#![cfg(unix)]
#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use serde_json::Value;

// Every call succeeds; `inspect` reports containers as running.
const FAKE_DOCKER: &str = r#"#!/bin/sh
case "$1" in
  run) echo 9b1c7e2d ;;
  inspect) echo true ;;
esac
exit 0
"#;

struct Env {
    _dir: tempfile::TempDir,
    config: PathBuf,
}

fn setup() -> Env {
    let dir = tempfile::tempdir().expect("tempdir");
    let docker = dir.path().join("docker");
    std::fs::write(&docker, FAKE_DOCKER).expect("write fake docker");
    let mut perms = std::fs::metadata(&docker).expect("stat").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&docker, perms).expect("chmod");

    let config = dir.path().join("corral.json");
    let body = serde_json::json!({
        "state_file": dir.path().join("instances.json"),
        "runtime": { "binary": docker, "timeout_secs": 10 },
    });
    std::fs::write(&config, body.to_string()).expect("write config");
    Env { _dir: dir, config }
}

fn corral(config: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_corral"))
        .arg("--config")
        .arg(config)
        .arg("--json")
        .args(args)
        .env_remove("CORRAL_STATE_FILE")
        .env_remove("RUST_LOG")
        .output()
        .expect("run corral")
}

fn json(output: &Output) -> Value {
    assert!(
        output.status.success(),
        "corral failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("json output")
}

#[test]
fn instance_lifecycle_through_cli() {
    let env = setup();
    let cfg = env.config.as_path();

    let created = json(&corral(cfg, &["create", "web1", "--memory", "256", "--cpus", "1"]));
    assert_eq!(created["id"], 1);
    assert_eq!(created["name"], "web1");
    assert_eq!(created["status"], "running");

    let dup = corral(cfg, &["create", "web1"]);
    assert!(!dup.status.success());
    assert!(String::from_utf8_lossy(&dup.stderr).contains("status 409"));

    let toggled = json(&corral(cfg, &["toggle", "1"]));
    assert_eq!(toggled["is_active"], false);
    assert_eq!(toggled["status"], "stopped");

    let renamed = json(&corral(cfg, &["update", "1", "--name", "web2", "--memory", "512"]));
    assert_eq!(renamed["name"], "web2");
    assert_eq!(renamed["memory_limit_mb"], 512);
    assert_eq!(renamed["is_active"], false);

    let listed = json(&corral(cfg, &["list"]));
    assert_eq!(listed.as_array().map(Vec::len), Some(1));

    let report = json(&corral(cfg, &["reconcile", "--dry-run"]));
    assert_eq!(report["checked"], 1);
    // The scripted runtime reports every container running.
    assert_eq!(report["drifted"][0]["drift"], "should_be_stopped");

    let deleted = json(&corral(cfg, &["delete", "1"]));
    assert_eq!(deleted["name"], "web2");

    let missing = corral(cfg, &["get", "1"]);
    assert!(!missing.status.success());
    assert!(String::from_utf8_lossy(&missing.stderr).contains("status 404"));
}

#[test]
fn concurrent_processes_keep_every_record() {
    let env = setup();
    let children: Vec<_> = (0..4)
        .map(|i| {
            Command::new(env!("CARGO_BIN_EXE_corral"))
                .arg("--config")
                .arg(&env.config)
                .args(["--json", "create", &format!("web{i}")])
                .env_remove("CORRAL_STATE_FILE")
                .env_remove("RUST_LOG")
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .spawn()
                .expect("spawn corral")
        })
        .collect();
    for child in children {
        let _ = json(&child.wait_with_output().expect("wait for corral"));
    }

    let listed = json(&corral(&env.config, &["list"]));
    let mut ids: Vec<u64> = listed
        .as_array()
        .expect("array")
        .iter()
        .map(|r| r["id"].as_u64().expect("id"))
        .collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 2, 3, 4]);
}
