//! Runtime backend that spawns the container runtime CLI.

use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use containdb_common::error::{ContainDbError, Result};

use super::ContainerRuntime;
use crate::cancel::CancellationToken;
use crate::command::Invocation;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Spawns one runtime process per invocation and blocks until it exits.
///
/// The foreground instance carries the session's [`CancellationToken`];
/// the rollback instance carries a per-command deadline instead.
#[derive(Debug, Clone, Default)]
pub struct ProcessRuntime {
    token: Option<CancellationToken>,
    deadline: Option<Duration>,
}

impl ProcessRuntime {
    /// Creates a runtime with no cancellation token and no deadline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuses to start commands once `token` is cancelled and kills the
    /// one in flight when it is.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = Some(token);
        self
    }

    /// Kills any command still running after `deadline`.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    fn ensure_not_cancelled(&self) -> Result<()> {
        self.token.as_ref().map_or(Ok(()), CancellationToken::check)
    }

    fn command(invocation: &Invocation) -> Command {
        let mut cmd = Command::new(invocation.program());
        let _ = cmd.args(invocation.args()).stdin(Stdio::null());
        cmd
    }

    fn spawn(invocation: &Invocation, mut cmd: Command) -> Result<Child> {
        cmd.spawn().map_err(|e| ContainDbError::Io {
            path: invocation.program().into(),
            source: e,
        })
    }

    /// Waits for `child`. The child is killed once the deadline passes or
    /// the session token is cancelled.
    fn wait(&self, invocation: &Invocation, child: &mut Child) -> Result<ExitStatus> {
        let io_err = |e: std::io::Error| ContainDbError::Io {
            path: invocation.program().into(),
            source: e,
        };
        if self.token.is_none() && self.deadline.is_none() {
            return child.wait().map_err(io_err);
        }
        let started = Instant::now();
        loop {
            if let Some(status) = child.try_wait().map_err(io_err)? {
                return Ok(status);
            }
            if self.token.as_ref().is_some_and(CancellationToken::is_cancelled) {
                tracing::warn!(command = %invocation, "session cancelled, killing runtime command");
                let _ = child.kill();
                let _ = child.wait();
                return Err(ContainDbError::Cancelled);
            }
            if self.deadline.is_some_and(|deadline| started.elapsed() >= deadline) {
                tracing::warn!(command = %invocation, deadline = ?self.deadline, "deadline exceeded, killing runtime command");
                let _ = child.kill();
                return child.wait().map_err(io_err);
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

/// Reads a captured pipe to the end on its own thread.
fn drain<P: Read + Send + 'static>(pipe: Option<P>) -> JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn failure(invocation: &Invocation, status: ExitStatus, stderr: String) -> ContainDbError {
    ContainDbError::CommandFailed {
        command: invocation.redacted(),
        code: status.code(),
        stderr,
    }
}

impl ContainerRuntime for ProcessRuntime {
    fn query(&self, invocation: &Invocation) -> Result<String> {
        self.ensure_not_cancelled()?;
        tracing::debug!(command = %invocation, "query");

        let mut cmd = Self::command(invocation);
        let _ = cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        let mut child = Self::spawn(invocation, cmd)?;
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());
        let status = self.wait(invocation, &mut child)?;
        if status.code().is_none() {
            // Killed: descendants may still hold the pipes open, so the
            // readers are left to finish on their own.
            return Err(failure(invocation, status, "terminated".to_string()));
        }
        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();

        if !status.success() {
            return Err(failure(invocation, status, stderr.trim().to_string()));
        }
        self.ensure_not_cancelled()?;
        Ok(stdout)
    }

    fn execute(&self, invocation: &Invocation) -> Result<()> {
        self.ensure_not_cancelled()?;
        tracing::info!(command = %invocation, "execute");

        let mut cmd = Self::command(invocation);
        let _ = cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        let mut child = Self::spawn(invocation, cmd)?;
        let status = self.wait(invocation, &mut child)?;

        if !status.success() {
            return Err(failure(
                invocation,
                status,
                "see runtime output above".to_string(),
            ));
        }
        self.ensure_not_cancelled()
    }
}
