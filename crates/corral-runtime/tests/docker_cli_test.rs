//! Drives the Docker backend against a scripted stand-in for the `docker`
//! binary, checking that CLI failures land on the right error variants.

#![cfg(unix)]
#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::time::Duration;

use corral_common::error::CorralError;
use corral_common::types::ResourceLimits;
use corral_runtime::backend::docker::DockerCli;
use corral_runtime::{ContainerSpec, RuntimeAdapter, RuntimeState};

const FAKE_DOCKER: &str = r#"#!/bin/sh
echo "$*" >> "$(dirname "$0")/calls.log"
case "$1" in
  run)
    case "$*" in
      *"--name slowpoke"*) sleep 5; echo 77aa01f0; exit 0 ;;
      *"--name tiny"*) echo 'docker: Error response from daemon: Minimum memory limit allowed is 6MB.' >&2; exit 125 ;;
      *"--name taken"*) echo 'docker: Error response from daemon: Conflict. The container name "/taken" is already in use by container "0f3a".' >&2; exit 125 ;;
    esac
    echo 4f2c9d1e; exit 0 ;;
  rename)
    [ "$3" = taken ] && { echo 'Error response from daemon: Conflict. The container name "/taken" is already in use by container "0f3a".' >&2; exit 1; }
    [ "$2" = ghost ] && { echo "Error response from daemon: No such container: $2" >&2; exit 1; }
    exit 0 ;;
  start)
    [ "$2" = sluggish ] && sleep 5
    [ "$2" = ghost ] && { echo "Error response from daemon: No such container: $2" >&2; exit 1; }
    echo "$2"; exit 0 ;;
  stop)
    echo "$2"; exit 0 ;;
  rm)
    [ "$3" = ghost ] && { echo "Error response from daemon: No such container: $3" >&2; exit 1; }
    echo "$3"; exit 0 ;;
  inspect)
    name="$6"
    case "$name" in
      ghost) echo "Error: No such object: $name" >&2; exit 1 ;;
      idle) echo false ;;
      *) echo true ;;
    esac
    exit 0 ;;
  update)
    echo 'Cannot connect to the Docker daemon at unix:///var/run/docker.sock. Is the docker daemon running?' >&2; exit 1 ;;
  *)
    exit 2 ;;
esac
"#;

fn install_fake(dir: &std::path::Path) -> PathBuf {
    let path = dir.join("docker");
    std::fs::write(&path, FAKE_DOCKER).expect("write fake docker");
    let mut perms = std::fs::metadata(&path).expect("stat").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).expect("chmod");
    path
}

fn spec(name: &str) -> ContainerSpec {
    ContainerSpec {
        name: name.into(),
        image: "alpine".into(),
        command: vec!["sleep".into(), "infinity".into()],
        limits: ResourceLimits {
            memory_limit_mb: 256,
            cpu_count: 1,
        },
    }
}

// Kept as one test so the script is never executed while another test
// thread holds a writable handle to it.
#[test]
fn docker_cli_maps_cli_outcomes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let docker = DockerCli::new(install_fake(dir.path()), Duration::from_secs(5), 100_000);

    let handle = docker.create(&spec("web1")).expect("create");
    assert_eq!(handle.container_id, "4f2c9d1e");
    assert_eq!(handle.name, "web1");

    assert!(matches!(
        docker.create(&spec("taken")),
        Err(CorralError::RuntimeConflict { .. })
    ));

    docker.rename("web1", "web2").expect("rename");
    assert!(matches!(
        docker.rename("web1", "taken"),
        Err(CorralError::RuntimeConflict { name, .. }) if name == "taken"
    ));
    assert!(matches!(
        docker.rename("ghost", "web3"),
        Err(CorralError::RuntimeNotFound { .. })
    ));

    docker.start("web1").expect("start");
    docker.stop("web1").expect("stop");
    assert!(matches!(
        docker.start("ghost"),
        Err(CorralError::RuntimeNotFound { .. })
    ));

    docker.remove("web1").expect("remove");
    docker.remove("ghost").expect("removing an absent container succeeds");

    assert_eq!(docker.inspect("web1").expect("inspect"), RuntimeState::Running);
    assert_eq!(docker.inspect("idle").expect("inspect"), RuntimeState::Stopped);
    assert_eq!(docker.inspect("ghost").expect("inspect"), RuntimeState::Absent);

    let limits = ResourceLimits {
        memory_limit_mb: 512,
        cpu_count: 2,
    };
    assert!(matches!(
        docker.update_limits("web1", &limits),
        Err(CorralError::RuntimeUnavailable { .. })
    ));

    let slow = DockerCli::new(docker.binary().to_path_buf(), Duration::from_millis(200), 100_000);
    assert_eq!(slow.kind(), "docker");
    assert!(matches!(
        slow.start("sluggish"),
        Err(CorralError::RuntimeUnavailable { .. })
    ));

    let calls = std::fs::read_to_string(dir.path().join("calls.log")).expect("call log");
    assert!(!calls.contains("rm -f taken"), "a name conflict must not remove the other container");

    assert!(matches!(
        docker.create(&spec("tiny")),
        Err(CorralError::RuntimeRejected { .. })
    ));
    assert!(matches!(
        slow.create(&spec("slowpoke")),
        Err(CorralError::RuntimeUnavailable { .. })
    ));
    let calls = std::fs::read_to_string(dir.path().join("calls.log")).expect("call log");
    let removals: Vec<&str> = calls.lines().filter(|l| l.starts_with("rm -f")).collect();
    assert!(removals.contains(&"rm -f tiny"), "{calls}");
    assert!(removals.contains(&"rm -f slowpoke"), "{calls}");
}
