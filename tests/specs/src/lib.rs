// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end binary smoke tests.
//!
//! Spawns the real `earlyexit` binary as a subprocess and checks its exit
//! code, echoed output, and `--json` summary.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};

/// Resolve the path to the compiled `earlyexit` binary.
pub fn earlyexit_binary() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    // tests/specs → tests → workspace root
    let workspace = manifest.parent().and_then(|p| p.parent()).unwrap_or(manifest);
    workspace.join("target").join("debug").join("earlyexit")
}

/// Captured result of one finished run.
#[derive(Debug)]
pub struct Finished {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl Finished {
    /// Parse the last stdout line as the `--json` summary.
    pub fn summary(&self) -> anyhow::Result<serde_json::Value> {
        let line = self
            .stdout
            .lines()
            .last()
            .ok_or_else(|| anyhow::anyhow!("no stdout; stderr: {}", self.stderr))?;
        Ok(serde_json::from_str(line)?)
    }
}

/// A running `earlyexit` process that is killed on drop.
pub struct EarlyexitProcess {
    child: Child,
}

impl EarlyexitProcess {
    /// Start `earlyexit` with `args` (flags, `--`, command).
    pub fn start(args: &[&str]) -> anyhow::Result<Self> {
        let child = Command::new(earlyexit_binary())
            .args(args)
            .env("EARLYEXIT_LOG_LEVEL", "warn")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;
        Ok(Self { child })
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Wait for the process to exit within `timeout` and collect its output.
    pub async fn wait_exit(self, timeout: Duration) -> anyhow::Result<Finished> {
        let output = tokio::time::timeout(timeout, self.child.wait_with_output())
            .await
            .map_err(|_| anyhow::anyhow!("earlyexit did not exit within {timeout:?}"))??;
        Ok(Finished {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Run `earlyexit` to completion.
pub async fn run(args: &[&str], timeout: Duration) -> anyhow::Result<Finished> {
    EarlyexitProcess::start(args)?.wait_exit(timeout).await
}
