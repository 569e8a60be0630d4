// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn execution(outcome: &str, exit_code: i32) -> ExecutionRecord {
    ExecutionRecord {
        command: vec!["make".into(), "test".into()],
        pattern: Some("FAIL".into()),
        started_ms: 1_000,
        ended_ms: 2_500,
        outcome: outcome.into(),
        exit_code,
        classification: Classification::Error,
        match_count: 1,
        stream_lines: BTreeMap::from([("stdout".to_owned(), 12)]),
        child_exit_code: None,
    }
}

#[test]
fn appends_tagged_entries_in_order() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let recorder = JsonlRecorder::new(tmp.path().join("runs.jsonl"));

    let m = MatchRecord {
        command: vec!["make".into()],
        pattern: Some("FAIL".into()),
        stream: "stderr".into(),
        line_number: 7,
        line: "FAIL: widget".into(),
        context: vec!["running widget".into()],
        classification: Classification::Error,
        timestamp_ms: 1_200,
    };
    recorder.record_match(&m);
    recorder.record_execution(&execution("matched(pattern)", 0));

    let entries = recorder.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0], TelemetryEntry::Match(m));
    assert!(matches!(entries[1], TelemetryEntry::Execution(ref e) if e.exit_code == 0));

    let raw = std::fs::read_to_string(recorder.path())?;
    assert!(raw.lines().next().is_some_and(|l| l.contains(r#""type":"match""#)));
    Ok(())
}

#[test]
fn unwritable_path_is_swallowed() {
    let recorder = JsonlRecorder::new("/nonexistent-dir/earlyexit/runs.jsonl");
    recorder.record_execution(&execution("no_match", 1));
    assert!(recorder.entries().is_empty());
}

#[test]
fn noop_recorder_accepts_everything() {
    let recorder: Box<dyn Recorder> = Box::new(NoopRecorder);
    recorder.record_execution(&execution("timeout(idle)", 2));
}

#[test]
fn corrupt_lines_are_skipped() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("runs.jsonl");
    std::fs::write(&path, "not json\n")?;
    let recorder = JsonlRecorder::new(&path);
    recorder.record_execution(&execution("stuck(repeat)", 2));
    assert_eq!(recorder.entries().len(), 1);
    Ok(())
}
