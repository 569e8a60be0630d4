// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end smoke tests that spawn the real `earlyexit` binary and check
//! the exit-code contract from the outside.

use std::time::Duration;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

use earlyexit::exit;
use earlyexit_specs::{run, EarlyexitProcess};

const TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::test]
async fn match_exits_zero_and_echoes() -> anyhow::Result<()> {
    let done = run(&["--delay-exit", "0", "ERROR", "--", "sh", "-c", "echo hi; echo ERROR; sleep 5"], TIMEOUT)
        .await?;
    assert_eq!(done.code, Some(0));
    assert!(done.stdout.contains("hi"), "stdout: {}", done.stdout);
    assert!(done.stdout.contains("ERROR"), "stdout: {}", done.stdout);
    Ok(())
}

#[tokio::test]
async fn no_match_exits_one() -> anyhow::Result<()> {
    let done = run(&["ERROR", "--", "echo", "all good"], TIMEOUT).await?;
    assert_eq!(done.code, Some(1));
    Ok(())
}

#[tokio::test]
async fn success_exit_codes_invert_zero_and_one() -> anyhow::Result<()> {
    let done = run(&["--success-exit-codes", "ERROR", "--", "echo", "all good"], TIMEOUT).await?;
    assert_eq!(done.code, Some(0));
    Ok(())
}

#[tokio::test]
async fn idle_timeout_exits_two_with_diagnostic() -> anyhow::Result<()> {
    let done = run(&["--idle-timeout", "300ms", "NEVER", "--", "sh", "-c", "echo one; sleep 10"], TIMEOUT)
        .await?;
    assert_eq!(done.code, Some(exit::TIMEOUT));
    assert!(done.stderr.contains("timeout (idle)"), "stderr: {}", done.stderr);
    Ok(())
}

#[tokio::test]
async fn usage_errors_exit_three() -> anyhow::Result<()> {
    // Nothing to watch for.
    let done = run(&["--", "true"], TIMEOUT).await?;
    assert_eq!(done.code, Some(exit::CLI_ERROR));
    assert!(done.stderr.contains("earlyexit: error"), "stderr: {}", done.stderr);

    // Unknown flag: clap's own error, still code 3.
    let done = run(&["--no-such-flag", "x", "--", "true"], TIMEOUT).await?;
    assert_eq!(done.code, Some(exit::CLI_ERROR));

    // Bad regex.
    let done = run(&["(unclosed", "--", "true"], TIMEOUT).await?;
    assert_eq!(done.code, Some(exit::CLI_ERROR));
    Ok(())
}

#[tokio::test]
async fn missing_program_exits_three() -> anyhow::Result<()> {
    let done = run(&["x", "--", "/nonexistent/earlyexit-smoke"], TIMEOUT).await?;
    assert_eq!(done.code, Some(exit::CLI_ERROR));
    Ok(())
}

#[tokio::test]
async fn help_exits_zero() -> anyhow::Result<()> {
    let done = run(&["--help"], TIMEOUT).await?;
    assert_eq!(done.code, Some(0));
    assert!(done.stdout.contains("--idle-timeout"));
    Ok(())
}

#[tokio::test]
async fn json_summary_on_stdout() -> anyhow::Result<()> {
    let done = run(
        &["--json", "--quiet", "--delay-exit", "0", "FAIL", "--", "sh", "-c", "echo ok; echo FAIL >&2; sleep 5"],
        TIMEOUT,
    )
    .await?;
    assert_eq!(done.code, Some(0));
    let summary = done.summary()?;
    assert_eq!(summary["outcome"], "matched(pattern)");
    assert_eq!(summary["exit_code"], 0);
    assert_eq!(summary["match_count"], 1);
    assert_eq!(summary["first_match"]["stream"], "stderr");
    assert_eq!(summary["first_match"]["line"], "FAIL");
    Ok(())
}

#[tokio::test]
async fn sigint_exits_one_thirty() -> anyhow::Result<()> {
    let proc = EarlyexitProcess::start(&["NEVER", "--", "sleep", "30"])?;
    tokio::time::sleep(Duration::from_millis(300)).await;
    let pid = proc.pid().ok_or_else(|| anyhow::anyhow!("no pid"))?;
    kill(Pid::from_raw(pid as i32), Signal::SIGINT)?;

    let done = proc.wait_exit(TIMEOUT).await?;
    assert_eq!(done.code, Some(exit::INTERRUPTED));
    Ok(())
}
