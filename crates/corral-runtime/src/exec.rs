//! Bounded invocation of the container runtime's command-line client.
//!
//! Every runtime call is a child process that must finish within the
//! configured timeout. A call that overruns is killed and reported as
//! [`CorralError::RuntimeUnavailable`].

use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use corral_common::error::{CorralError, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Output from a runtime CLI invocation.
#[derive(Debug, Clone)]
pub struct ExecOutput {
    /// Standard output from the command.
    pub stdout: String,
    /// Standard error from the command.
    pub stderr: String,
    /// Exit code returned by the command.
    pub exit_code: i32,
}

impl ExecOutput {
    /// Returns whether the command exited with status zero.
    #[must_use]
    pub const fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs `program` with `args`, waiting at most `timeout` for it to exit.
///
/// # Errors
///
/// Returns [`CorralError::RuntimeUnavailable`] if the program cannot be
/// spawned or does not exit before the deadline.
pub fn run_with_timeout(program: &Path, args: &[String], timeout: Duration) -> Result<ExecOutput> {
    tracing::debug!(program = %program.display(), ?args, "invoking runtime");

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| CorralError::RuntimeUnavailable {
            message: format!("cannot spawn {}: {e}", program.display()),
        })?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                kill(&mut child);
                return Err(CorralError::RuntimeUnavailable {
                    message: format!(
                        "{} {} timed out after {}s",
                        program.display(),
                        args.first().map_or("", String::as_str),
                        timeout.as_secs_f32()
                    ),
                });
            }
            Ok(None) => std::thread::sleep(POLL_INTERVAL),
            Err(e) => {
                kill(&mut child);
                return Err(CorralError::RuntimeUnavailable {
                    message: format!("waiting for {}: {e}", program.display()),
                });
            }
        }
    };

    Ok(ExecOutput {
        stdout: collect(stdout),
        stderr: collect(stderr),
        exit_code: status.code().unwrap_or(-1),
    })
}

/// Reads a child pipe to completion on a helper thread so a chatty child
/// cannot block on a full pipe while we poll it.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<String>> {
    pipe.map(|mut pipe| {
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).into_owned()
        })
    })
}

fn collect(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
        .trim()
        .to_string()
}

fn kill(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}
