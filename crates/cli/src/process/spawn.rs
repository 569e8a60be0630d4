// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::os::fd::{AsRawFd, OwnedFd};
use std::process::Stdio;
use std::sync::Once;

use anyhow::{bail, Context};
use nix::fcntl::{fcntl, FcntlArg, FdFlag};
use nix::libc;
use tokio::net::unix::pipe;
use tokio::process::{ChildStderr, ChildStdout, Command};
use tracing::{debug, warn};

use super::Supervisor;

/// Everything needed to launch the child.
#[derive(Debug, Clone, Default)]
pub struct SpawnSpec {
    pub command: Vec<String>,
    /// Extra descriptors (>= 3) to open in the child as pipe write ends.
    pub custom_fds: Vec<i32>,
    /// Make the child a process group leader so the group can be signaled.
    pub group: bool,
    /// Prefix with `stdbuf -oL -eL` when it is available.
    pub unbuffered: bool,
    /// Start the child with SIGPIPE ignored. Set for detachable sessions:
    /// after a detach our read ends are gone, and a later write must fail
    /// with EPIPE instead of killing the child.
    pub ignore_sigpipe: bool,
}

/// A running child plus the read ends of its output pipes.
pub struct Spawned {
    pub supervisor: Supervisor,
    pub stdout: Option<ChildStdout>,
    pub stderr: Option<ChildStderr>,
    pub custom: Vec<(i32, pipe::Receiver)>,
}

static SHIM_MISSING: Once = Once::new();

/// Resolve the argv actually executed, applying the unbuffering shim.
///
/// When wrapped, the shim itself always spawns, so the real program is
/// looked up first and a missing or non-executable one is a spawn error.
pub fn resolve_argv(spec: &SpawnSpec) -> anyhow::Result<Vec<String>> {
    if !spec.unbuffered {
        return Ok(spec.command.clone());
    }
    let Some(program) = spec.command.first() else {
        bail!("no command given");
    };
    match which::which("stdbuf") {
        Ok(path) => {
            which::which(program).with_context(|| format!("failed to spawn {program:?}"))?;
            let mut argv = vec![path.to_string_lossy().into_owned(), "-oL".into(), "-eL".into()];
            argv.extend(spec.command.iter().cloned());
            Ok(argv)
        }
        Err(_) => {
            SHIM_MISSING.call_once(|| {
                warn!("stdbuf not found on PATH; running without line buffering");
            });
            Ok(spec.command.clone())
        }
    }
}

/// Spawn the child with stdin inherited, stdout/stderr piped, and one pipe
/// per custom descriptor.
#[allow(unsafe_code)]
pub fn spawn(spec: &SpawnSpec) -> anyhow::Result<Spawned> {
    let argv = resolve_argv(spec)?;
    let Some((program, args)) = argv.split_first() else {
        bail!("no command given");
    };
    for &fd in &spec.custom_fds {
        if fd < 3 {
            bail!("custom descriptor {fd} must be >= 3");
        }
    }

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(false);
    if spec.group {
        cmd.process_group(0);
    }
    if spec.ignore_sigpipe {
        // SAFETY: signal(2) is async-signal-safe and touches no captured state.
        // Closures run after std restores default signal dispositions.
        unsafe {
            cmd.pre_exec(|| {
                if libc::signal(libc::SIGPIPE, libc::SIG_IGN) == libc::SIG_ERR {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }
    }

    let mut readers = Vec::with_capacity(spec.custom_fds.len());
    let mut writers: Vec<OwnedFd> = Vec::with_capacity(spec.custom_fds.len());
    for &target in &spec.custom_fds {
        let (read, write) = nix::unistd::pipe().context("failed to create pipe")?;
        fcntl(&read, FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC)).context("fcntl failed")?;
        fcntl(&write, FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC)).context("fcntl failed")?;
        readers.push((target, read));
        writers.push(write);
    }

    if !writers.is_empty() {
        let pairs: Vec<(i32, i32)> = writers
            .iter()
            .zip(&spec.custom_fds)
            .map(|(w, &target)| (w.as_raw_fd(), target))
            .collect();
        // Park every source above the highest target first so a dup2 onto
        // one target can never clobber a source not yet moved.
        let floor = spec.custom_fds.iter().copied().max().unwrap_or(2) + 1;
        let mut parked = vec![-1; pairs.len()];
        // SAFETY: the closure runs between fork and exec and only calls
        // async-signal-safe functions (fcntl, dup2, close) on integers
        // captured by value. `parked` is allocated before fork.
        unsafe {
            cmd.pre_exec(move || {
                for (slot, &(src, _)) in parked.iter_mut().zip(&pairs) {
                    let fd = libc::fcntl(src, libc::F_DUPFD, floor);
                    if fd == -1 {
                        return Err(std::io::Error::last_os_error());
                    }
                    *slot = fd;
                }
                for (&fd, &(_, target)) in parked.iter().zip(&pairs) {
                    if libc::dup2(fd, target) == -1 {
                        return Err(std::io::Error::last_os_error());
                    }
                    libc::close(fd);
                }
                Ok(())
            });
        }
    }

    let mut child = cmd.spawn().with_context(|| format!("failed to spawn {program:?}"))?;
    // Our copies of the write ends must close so readers see EOF.
    drop(writers);

    let pid = child.id().context("child exited before its pid was read")?;
    debug!(pid, ?argv, group = spec.group, "spawned child");

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    // From here on a failure drops the supervisor, which kills the child.
    let supervisor = Supervisor::new(child, pid, spec.group);
    let mut custom = Vec::with_capacity(readers.len());
    for (target, read) in readers {
        let receiver = pipe::Receiver::from_owned_fd(read)
            .with_context(|| format!("failed to register fd{target} pipe"))?;
        custom.push((target, receiver));
    }

    Ok(Spawned { supervisor, stdout, stderr, custom })
}
