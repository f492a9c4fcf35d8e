// SPDX-FileCopyrightText: 2026 Alter Ego Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Owned child process with bounded start and stop.
//!
//! [`ManagedProcess`] keeps the platform-specific termination sequence in one
//! place: on Unix it sends `SIGTERM`, waits up to the stop timeout, then
//! escalates to `SIGKILL`. Elsewhere it kills immediately.

use std::future::Future;
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use alterego_core::AlterEgoError;

/// Delay between readiness probes while starting.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A long-running child process such as a local model server.
pub struct ManagedProcess {
    program: String,
    args: Vec<String>,
    child: Mutex<Option<Child>>,
}

impl ManagedProcess {
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            child: Mutex::new(None),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<Child>> {
        self.child.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Spawns the process and polls `probe` until it reports ready.
    ///
    /// Fails with [`AlterEgoError::Startup`] if the process exits first or
    /// `timeout` elapses; in the timeout case the child is killed. A process
    /// that is already running is left alone.
    pub async fn start<F, Fut>(&self, timeout: Duration, mut probe: F) -> Result<(), AlterEgoError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
    {
        if self.is_alive() {
            debug!(program = %self.program, "process already running");
            return Ok(());
        }

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AlterEgoError::Startup {
                message: format!("failed to spawn `{}`: {e}", self.program),
            })?;

        let started = Instant::now();
        let deadline = started + timeout;
        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    return Err(AlterEgoError::Startup {
                        message: format!("`{}` exited during startup ({status})", self.program),
                    });
                }
                Ok(None) => {}
                Err(e) => {
                    return Err(AlterEgoError::Startup {
                        message: format!("failed to poll `{}`: {e}", self.program),
                    });
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if let Ok(true) = tokio::time::timeout(remaining, probe()).await {
                info!(
                    program = %self.program,
                    pid = ?child.id(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "process ready"
                );
                *self.slot() = Some(child);
                return Ok(());
            }

            if Instant::now() >= deadline {
                let _ = child.kill().await;
                return Err(AlterEgoError::Startup {
                    message: format!(
                        "`{}` not ready within {}s",
                        self.program,
                        timeout.as_secs_f32()
                    ),
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Terminates the process, escalating to a kill after `timeout`.
    ///
    /// Stopping a process that is not running is a no-op.
    pub async fn stop(&self, timeout: Duration) -> Result<(), AlterEgoError> {
        let Some(mut child) = self.slot().take() else {
            return Ok(());
        };
        if let Ok(Some(status)) = child.try_wait() {
            debug!(program = %self.program, %status, "process had already exited");
            return Ok(());
        }

        request_termination(&mut child);
        match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) => {
                info!(program = %self.program, %status, "process stopped");
                Ok(())
            }
            Ok(Err(e)) => Err(AlterEgoError::Internal(format!(
                "failed to wait for `{}`: {e}",
                self.program
            ))),
            Err(_) => {
                warn!(
                    program = %self.program,
                    timeout_ms = timeout.as_millis() as u64,
                    "process ignored termination, killing"
                );
                child.kill().await.map_err(|e| {
                    AlterEgoError::Internal(format!("failed to kill `{}`: {e}", self.program))
                })
            }
        }
    }

    /// Whether the process was started and has not exited.
    pub fn is_alive(&self) -> bool {
        let mut slot = self.slot();
        match slot.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.slot().as_ref().and_then(Child::id)
    }
}

#[cfg(unix)]
fn request_termination(child: &mut Child) {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return;
    };
    let Ok(raw) = i32::try_from(pid) else {
        warn!(pid, "pid out of range, killing instead");
        let _ = child.start_kill();
        return;
    };
    if let Err(e) = kill(Pid::from_raw(raw), Signal::SIGTERM) {
        warn!(pid, error = %e, "SIGTERM failed");
    }
}

#[cfg(not(unix))]
fn request_termination(child: &mut Child) {
    let _ = child.start_kill();
}
