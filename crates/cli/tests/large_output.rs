// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Large output tests: line accounting under volume, long unterminated
//! lines, and log file integrity.

use earlyexit::config::Config;
use earlyexit::outcome::{MatchKind, Outcome};
use earlyexit::session::{Session, SessionConfig};
use earlyexit::stream::StreamId;

fn shell(script: &str) -> Vec<String> {
    vec!["sh".into(), "-c".into(), script.into()]
}

#[tokio::test]
async fn every_line_counted_under_volume() -> anyhow::Result<()> {
    let mut config = Config::test();
    config.pattern = Some("NEVER".into());
    config.command = shell("seq 1 100000");

    let report = Session::new(SessionConfig::from_config(&config)?).run().await;
    assert_eq!(report.outcome, Outcome::NoMatch);
    let stdout = report.stream_lines.iter().find(|(id, _)| *id == StreamId::Stdout);
    assert_eq!(stdout.map(|(_, n)| *n), Some(100_000));
    Ok(())
}

#[tokio::test]
async fn match_found_deep_in_output() -> anyhow::Result<()> {
    let mut config = Config::test();
    config.pattern = Some("^77777$".into());
    config.command = shell("seq 1 200000; sleep 5");

    let report = Session::new(SessionConfig::from_config(&config)?).run().await;
    assert_eq!(report.outcome, Outcome::Matched(MatchKind::Pattern));
    let first = report.first_match.ok_or_else(|| anyhow::anyhow!("no match"))?;
    assert_eq!(first.line_number, 77_777);
    assert_eq!(first.context.last().map(String::as_str), Some("77776"));
    Ok(())
}

#[tokio::test]
async fn long_unterminated_line_is_classified_at_eof() -> anyhow::Result<()> {
    let mut config = Config::test();
    config.pattern = Some("TAIL$".into());
    // 256 KiB of filler then a marker, no trailing newline.
    config.command = shell("head -c 262144 /dev/zero | tr '\\0' 'x'; printf TAIL");

    let report = Session::new(SessionConfig::from_config(&config)?).run().await;
    assert_eq!(report.outcome, Outcome::Matched(MatchKind::Pattern));
    Ok(())
}

#[tokio::test]
async fn log_file_holds_every_line() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut config = Config::test();
    config.pattern = Some("NEVER".into());
    config.log_prefix = Some(dir.path().join("volume"));
    config.command = shell("seq 1 50000");

    let report = Session::new(SessionConfig::from_config(&config)?).run().await;
    assert_eq!(report.outcome, Outcome::NoMatch);

    let log = std::fs::read_to_string(dir.path().join("volume.log"))?;
    assert_eq!(log.lines().count(), 50_000);
    assert_eq!(log.lines().last(), Some("50000"));
    Ok(())
}
