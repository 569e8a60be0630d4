// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Child process ownership: spawn, liveness, graceful termination, detach.

pub mod spawn;

use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use serde::Serialize;
use tokio::process::Child;
use tracing::{debug, warn};

pub use spawn::{spawn, SpawnSpec, Spawned};

/// How the child exited: a code, or the signal that killed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExitStatus {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl From<std::process::ExitStatus> for ExitStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        Self { code: status.code(), signal: status.signal() }
    }
}

/// Owns the spawned child until it is reaped or detached.
///
/// Once detached the child is never signaled again; every terminate call
/// becomes a no-op.
pub struct Supervisor {
    child: Option<Child>,
    pid: u32,
    /// Child leads its own process group (pgid == pid).
    group: bool,
    status: Option<ExitStatus>,
}

impl Supervisor {
    pub(crate) fn new(child: Child, pid: u32, group: bool) -> Self {
        Self { child: Some(child), pid, group, status: None }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn is_detached(&self) -> bool {
        self.child.is_none() && self.status.is_none()
    }

    /// Exit status if the child has already been reaped.
    pub fn status(&self) -> Option<ExitStatus> {
        self.status
    }

    /// Non-blocking reap.
    pub fn try_wait(&mut self) -> anyhow::Result<Option<ExitStatus>> {
        if let Some(status) = self.status {
            return Ok(Some(status));
        }
        let Some(ref mut child) = self.child else {
            return Ok(None);
        };
        let status = child.try_wait().context("failed to poll child")?.map(ExitStatus::from);
        if let Some(status) = status {
            debug!(pid = self.pid, ?status, "child exited");
            self.status = Some(status);
            self.child = None;
        }
        Ok(status)
    }

    /// Block until the child exits.
    pub async fn wait(&mut self) -> anyhow::Result<Option<ExitStatus>> {
        if let Some(status) = self.status {
            return Ok(Some(status));
        }
        let Some(ref mut child) = self.child else {
            return Ok(None);
        };
        let status = ExitStatus::from(child.wait().await.context("failed to wait for child")?);
        self.status = Some(status);
        self.child = None;
        Ok(Some(status))
    }

    /// SIGTERM the child, wait up to `grace`, then SIGKILL.
    pub async fn terminate(&mut self, grace: Duration) -> anyhow::Result<Option<ExitStatus>> {
        self.escalate(self.pid as i32, grace).await
    }

    /// Like [`Supervisor::terminate`] but signals the whole process group.
    /// Falls back to the single pid when the child does not lead a group.
    pub async fn terminate_group(&mut self, grace: Duration) -> anyhow::Result<Option<ExitStatus>> {
        let target = if self.group { -(self.pid as i32) } else { self.pid as i32 };
        self.escalate(target, grace).await
    }

    async fn escalate(&mut self, target: i32, grace: Duration) -> anyhow::Result<Option<ExitStatus>> {
        if self.try_wait()?.is_some() || self.child.is_none() {
            return Ok(self.status);
        }

        signal(target, Signal::SIGTERM);
        let waited = match self.child {
            Some(ref mut child) => tokio::time::timeout(grace, child.wait()).await,
            None => return Ok(self.status),
        };
        let status = match waited {
            Ok(result) => result.context("failed to wait for child")?,
            Err(_) => {
                debug!(pid = self.pid, "grace period elapsed, sending SIGKILL");
                signal(target, Signal::SIGKILL);
                match self.child {
                    Some(ref mut child) => child.wait().await.context("failed to wait for child")?,
                    None => return Ok(self.status),
                }
            }
        };
        let status = ExitStatus::from(status);
        self.status = Some(status);
        self.child = None;
        Ok(Some(status))
    }

    /// Release the child without signaling it, optionally recording its pid
    /// (newline-terminated decimal) in `pid_file`.
    pub fn detach(&mut self, pid_file: Option<&Path>) -> anyhow::Result<u32> {
        // Dropping a tokio Child without kill_on_drop leaves it running.
        drop(self.child.take());
        if let Some(path) = pid_file {
            std::fs::write(path, format!("{}\n", self.pid))
                .with_context(|| format!("failed to write pid file {}", path.display()))?;
        }
        debug!(pid = self.pid, "detached from child");
        Ok(self.pid)
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        // An unreaped, undetached child must not outlive us.
        if let Some(ref mut child) = self.child {
            if matches!(child.try_wait(), Ok(None)) {
                let target = if self.group { -(self.pid as i32) } else { self.pid as i32 };
                signal(target, Signal::SIGKILL);
                let _ = child.start_kill();
            }
        }
    }
}

/// Deliver `sig` to a pid (positive) or process group (negative). A target
/// that is already gone is not an error.
fn signal(target: i32, sig: Signal) {
    match kill(Pid::from_raw(target), sig) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => warn!("failed to send {sig} to {target}: {e}"),
    }
}

/// Whether a process with `pid` exists (checked with signal 0).
pub fn is_alive(pid: u32) -> bool {
    matches!(kill(Pid::from_raw(pid as i32), None), Ok(()) | Err(Errno::EPERM))
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
