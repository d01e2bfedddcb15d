//! External process runner with deadline and cooperative cancellation.
//!
//! Child processes inherit stdout/stderr so the operator sees their output
//! directly. On unix each child leads its own process group, so anything it
//! spawns is stopped with it. Cancellation and deadline expiry first send a
//! termination request to the group and only force-kill once the grace period
//! has elapsed.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use docbinder_shared::{BinderError, Result};

/// Default time a terminated process gets before it is killed.
pub const DEFAULT_TERMINATION_GRACE: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// CommandSpec
// ---------------------------------------------------------------------------

/// An external command: program, arguments, and the directory it runs in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Working directory; `None` inherits ours.
    pub working_dir: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.working_dir = Some(dir.as_ref().to_path_buf());
        self
    }
}

// ---------------------------------------------------------------------------
// ProcessRunner
// ---------------------------------------------------------------------------

/// Runs [`CommandSpec`]s to completion, a deadline, or cancellation.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    grace: Duration,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new(DEFAULT_TERMINATION_GRACE)
    }
}

impl ProcessRunner {
    /// Create a runner that waits `grace` after a termination request before killing.
    pub fn new(grace: Duration) -> Self {
        Self { grace }
    }

    /// Run `spec` and wait for it.
    ///
    /// Returns `Ok(())` on a zero exit status. A non-zero status is
    /// [`BinderError::ProcessFailed`], an expired `deadline` is
    /// [`BinderError::DeadlineExceeded`], and a cancelled token is
    /// [`BinderError::Interrupted`]. In the last two cases the child has
    /// exited (or been killed) by the time this returns.
    #[instrument(skip_all, fields(program = %spec.program))]
    pub async fn run(
        &self,
        spec: &CommandSpec,
        deadline: Option<Instant>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(BinderError::Interrupted);
        }

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(dir) = &spec.working_dir {
            command.current_dir(dir);
        }
        #[cfg(unix)]
        command.process_group(0);

        info!(args = ?spec.args, dir = ?spec.working_dir, "starting process");
        let started = Instant::now();
        let mut child = command
            .spawn()
            .map_err(|e| BinderError::spawn(&spec.program, e))?;
        // Captured now: `id()` is `None` once the child has been reaped.
        let group = child.id();

        let expiry = async {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            status = child.wait() => {
                let status = status.map_err(|e| BinderError::spawn(&spec.program, e))?;
                let elapsed_ms = started.elapsed().as_millis();
                if status.success() {
                    debug!(elapsed_ms, "process finished");
                    Ok(())
                } else {
                    warn!(code = ?status.code(), elapsed_ms, "process failed");
                    Err(BinderError::ProcessFailed {
                        program: spec.program.clone(),
                        code: status.code(),
                    })
                }
            }
            () = cancel.cancelled() => {
                warn!("cancellation requested, terminating process");
                self.terminate(&mut child, group).await;
                Err(BinderError::Interrupted)
            }
            () = expiry => {
                warn!("deadline expired, terminating process");
                self.terminate(&mut child, group).await;
                Err(BinderError::DeadlineExceeded {
                    program: spec.program.clone(),
                    after: started.elapsed(),
                })
            }
        }
    }

    /// Ask the child's process group to exit, escalating to a kill after the
    /// grace period.
    async fn terminate(&self, child: &mut Child, group: Option<u32>) {
        request_termination(child, group);

        match tokio::time::timeout(self.grace, child.wait()).await {
            Ok(Ok(status)) => debug!(?status, "process exited after termination request"),
            Ok(Err(e)) => warn!(error = %e, "failed waiting for terminated process"),
            Err(_) => {
                warn!(
                    grace_ms = self.grace.as_millis(),
                    "process ignored termination request, killing"
                );
                kill_group(group);
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "failed to kill process");
                }
            }
        }

        // Members that ignored the request may outlive the leader.
        kill_group(group);
    }
}

#[cfg(unix)]
fn request_termination(_child: &mut Child, group: Option<u32>) {
    signal_group(group, nix::sys::signal::Signal::SIGTERM);
}

#[cfg(unix)]
fn kill_group(group: Option<u32>) {
    signal_group(group, nix::sys::signal::Signal::SIGKILL);
}

#[cfg(unix)]
fn signal_group(group: Option<u32>, signal: nix::sys::signal::Signal) {
    use nix::errno::Errno;
    use nix::sys::signal::killpg;
    use nix::unistd::Pid;

    let Some(pgid) = group.and_then(|id| i32::try_from(id).ok()) else {
        return;
    };
    match killpg(Pid::from_raw(pgid), signal) {
        // The whole group is already gone.
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => debug!(pgid, ?signal, error = %e, "failed to signal process group"),
    }
}

#[cfg(not(unix))]
fn request_termination(child: &mut Child, _group: Option<u32>) {
    if let Err(e) = child.start_kill() {
        debug!(error = %e, "failed to terminate process");
    }
}

#[cfg(not(unix))]
fn kill_group(_group: Option<u32>) {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
