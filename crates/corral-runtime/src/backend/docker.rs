//! Docker backend driven through the `docker` command-line client.

use std::path::{Path, PathBuf};
use std::time::Duration;

use corral_common::config::RuntimeConfig;
use corral_common::error::{CorralError, Result};
use corral_common::types::ResourceLimits;

use super::{ContainerSpec, RuntimeAdapter, RuntimeHandle, RuntimeState};
use crate::exec::{self, ExecOutput};

/// Backend that shells out to the Docker CLI.
///
/// Holds no connection state: each call is an independent, time-bounded
/// invocation, so one instance can be shared by all worker threads.
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: PathBuf,
    timeout: Duration,
    cpu_period_us: u64,
}

impl DockerCli {
    /// Creates a backend for an explicit binary path.
    #[must_use]
    pub const fn new(binary: PathBuf, timeout: Duration, cpu_period_us: u64) -> Self {
        Self {
            binary,
            timeout,
            cpu_period_us,
        }
    }

    /// Creates a backend from configuration, resolving the binary on `PATH`.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeUnavailable` if the binary cannot be found.
    pub fn from_config(config: &RuntimeConfig) -> Result<Self> {
        let binary = which::which(&config.binary).map_err(|e| CorralError::RuntimeUnavailable {
            message: format!("{} not found: {e}", config.binary),
        })?;
        Ok(Self::new(binary, config.timeout(), config.cpu_period_us))
    }

    /// Resolved path of the runtime binary.
    #[must_use]
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn run(&self, args: Vec<String>) -> Result<ExecOutput> {
        exec::run_with_timeout(&self.binary, &args, self.timeout)
    }

    /// Runs a command that must succeed, classifying its failure otherwise.
    fn run_checked(&self, name: &str, args: Vec<String>) -> Result<ExecOutput> {
        let output = self.run(args)?;
        if output.success() {
            Ok(output)
        } else {
            Err(classify(name, &output.stderr))
        }
    }
}

impl RuntimeAdapter for DockerCli {
    fn create(&self, spec: &ContainerSpec) -> Result<RuntimeHandle> {
        tracing::info!(name = %spec.name, image = %spec.image, "creating container");
        let err = match self.run(run_args(spec, self.cpu_period_us)) {
            Ok(output) if output.success() => {
                return Ok(RuntimeHandle {
                    container_id: output.stdout,
                    name: spec.name.clone(),
                });
            }
            Ok(output) => classify(&spec.name, &output.stderr),
            Err(e) => e,
        };
        // `run` can fail or time out after the daemon created the container.
        // The name was free beforehand, so whatever holds it now is ours.
        if matches!(
            err,
            CorralError::RuntimeRejected { .. } | CorralError::RuntimeUnavailable { .. }
        ) {
            tracing::warn!(name = %spec.name, error = %err, "removing possibly half-created container");
            if let Err(e) = self.remove(&spec.name) {
                tracing::warn!(name = %spec.name, error = %e, "cleanup after failed create failed");
            }
        }
        Err(err)
    }

    fn rename(&self, old_name: &str, new_name: &str) -> Result<()> {
        tracing::info!(old_name, new_name, "renaming container");
        let output = self.run(vec!["rename".into(), old_name.into(), new_name.into()])?;
        if output.success() {
            return Ok(());
        }
        match classify(old_name, &output.stderr) {
            CorralError::RuntimeConflict { message, .. } => Err(CorralError::RuntimeConflict {
                name: new_name.to_string(),
                message,
            }),
            other => Err(other),
        }
    }

    fn start(&self, name: &str) -> Result<()> {
        tracing::info!(name, "starting container");
        let _ = self.run_checked(name, vec!["start".into(), name.into()])?;
        Ok(())
    }

    fn stop(&self, name: &str) -> Result<()> {
        tracing::info!(name, "stopping container");
        let _ = self.run_checked(name, vec!["stop".into(), name.into()])?;
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<()> {
        tracing::info!(name, "removing container");
        match self.run_checked(name, vec!["rm".into(), "-f".into(), name.into()]) {
            Ok(_) => Ok(()),
            Err(CorralError::RuntimeNotFound { .. }) => {
                tracing::debug!(name, "container already absent");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn inspect(&self, name: &str) -> Result<RuntimeState> {
        let args = vec![
            "inspect".into(),
            "--type".into(),
            "container".into(),
            "--format".into(),
            "{{.State.Running}}".into(),
            name.into(),
        ];
        match self.run_checked(name, args) {
            Ok(out) => match out.stdout.as_str() {
                "true" => Ok(RuntimeState::Running),
                "false" => Ok(RuntimeState::Stopped),
                other => Err(CorralError::RuntimeRejected {
                    message: format!("unexpected inspect output for {name}: {other}"),
                }),
            },
            Err(CorralError::RuntimeNotFound { .. }) => Ok(RuntimeState::Absent),
            Err(e) => Err(e),
        }
    }

    fn update_limits(&self, name: &str, limits: &ResourceLimits) -> Result<()> {
        tracing::info!(
            name,
            memory_limit_mb = limits.memory_limit_mb,
            cpu_count = limits.cpu_count,
            "updating container limits"
        );
        let _ = self.run_checked(name, update_args(name, limits, self.cpu_period_us))?;
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "docker"
    }
}

/// Arguments for `docker run` creating a detached, resource-capped container.
pub(crate) fn run_args(spec: &ContainerSpec, cpu_period_us: u64) -> Vec<String> {
    let mut args = vec![
        "run".to_string(),
        "--detach".into(),
        "--tty".into(),
        "--name".into(),
        spec.name.clone(),
        "--memory".into(),
        format!("{}m", spec.limits.memory_limit_mb),
        "--cpu-period".into(),
        cpu_period_us.to_string(),
        "--cpu-quota".into(),
        spec.limits.cpu_quota(cpu_period_us).to_string(),
        spec.image.clone(),
    ];
    args.extend(spec.command.iter().cloned());
    args
}

/// Arguments for `docker update`. Swap is kept at twice the memory cap,
/// matching what `docker run --memory` sets implicitly.
pub(crate) fn update_args(name: &str, limits: &ResourceLimits, cpu_period_us: u64) -> Vec<String> {
    vec![
        "update".into(),
        "--memory".into(),
        format!("{}m", limits.memory_limit_mb),
        "--memory-swap".into(),
        format!("{}m", u64::from(limits.memory_limit_mb) * 2),
        "--cpu-period".into(),
        cpu_period_us.to_string(),
        "--cpu-quota".into(),
        limits.cpu_quota(cpu_period_us).to_string(),
        name.into(),
    ]
}

/// Maps Docker CLI error output onto the runtime error taxonomy.
pub(crate) fn classify(name: &str, stderr: &str) -> CorralError {
    let lower = stderr.to_ascii_lowercase();
    let message = stderr.trim().to_string();
    if lower.contains("no such container") || lower.contains("no such object") {
        CorralError::RuntimeNotFound {
            name: name.to_string(),
        }
    } else if lower.contains("is already in use") || lower.contains("conflict") {
        CorralError::RuntimeConflict {
            name: name.to_string(),
            message,
        }
    } else if lower.contains("cannot connect to the docker daemon")
        || lower.contains("error during connect")
        || lower.contains("is the docker daemon running")
        || lower.contains("connection refused")
    {
        CorralError::RuntimeUnavailable { message }
    } else {
        CorralError::RuntimeRejected { message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> ContainerSpec {
        ContainerSpec {
            name: "web1".into(),
            image: "alpine".into(),
            command: vec!["sleep".into(), "infinity".into()],
            limits: ResourceLimits {
                memory_limit_mb: 256,
                cpu_count: 2,
            },
        }
    }

    #[test]
    fn run_args_cap_memory_and_cpu() {
        let args = run_args(&spec(), 100_000);
        let joined = args.join(" ");
        assert!(joined.starts_with("run --detach --tty --name web1"));
        assert!(joined.contains("--memory 256m"));
        assert!(joined.contains("--cpu-period 100000 --cpu-quota 200000"));
        assert!(joined.ends_with("alpine sleep infinity"));
    }

    #[test]
    fn update_args_target_named_container() {
        let limits = ResourceLimits {
            memory_limit_mb: 512,
            cpu_count: 1,
        };
        let args = update_args("web1", &limits, 100_000);
        assert_eq!(args.first().map(String::as_str), Some("update"));
        assert_eq!(args.last().map(String::as_str), Some("web1"));
        assert!(args.join(" ").contains("--memory 512m --memory-swap 1024m"));
    }

    #[test]
    fn classify_not_found() {
        let err = classify("web1", "Error response from daemon: No such container: web1");
        assert!(matches!(err, CorralError::RuntimeNotFound { name } if name == "web1"));
    }

    #[test]
    fn classify_conflict() {
        let err = classify(
            "web1",
            "docker: Error response from daemon: Conflict. The container name \"/web1\" is already in use by container \"ab12\".",
        );
        assert!(matches!(err, CorralError::RuntimeConflict { .. }));
    }

    #[test]
    fn classify_daemon_down() {
        let err = classify(
            "web1",
            "Cannot connect to the Docker daemon at unix:///var/run/docker.sock. Is the docker daemon running?",
        );
        assert!(matches!(err, CorralError::RuntimeUnavailable { .. }));
    }

    #[test]
    fn classify_other_refusal() {
        let err = classify("web1", "Minimum memory limit allowed is 6MB");
        assert!(matches!(err, CorralError::RuntimeRejected { .. }));
    }
}
