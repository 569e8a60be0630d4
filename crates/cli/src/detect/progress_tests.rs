// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use regex::Regex;

use super::*;

fn detector(max_repeat: u32) -> anyhow::Result<ProgressDetector> {
    Ok(ProgressDetector::new(Regex::new(r"(\d+)%")?, max_repeat))
}

#[test]
fn advancing_value_never_fires() -> anyhow::Result<()> {
    let mut d = detector(2)?;
    for line in ["copy 10%", "copy 20%", "copy 30%", "copy 40%"] {
        assert!(d.observe(line).is_none());
    }
    Ok(())
}

#[test]
fn stalled_value_fires() -> anyhow::Result<()> {
    let mut d = detector(2)?;
    assert!(d.observe("copy 42% eta 1m").is_none());
    assert!(d.observe("copy 42% eta 2m").is_none());
    let trigger = d.observe("copy 42% eta 5m");
    assert!(matches!(trigger, Some(Trigger { kind: StuckKind::NoProgress, .. })));
    Ok(())
}

#[test]
fn unrelated_lines_are_ignored() -> anyhow::Result<()> {
    let mut d = detector(2)?;
    assert!(d.observe("copy 42%").is_none());
    assert!(d.observe("warning: slow disk").is_none());
    assert!(d.observe("copy 42%").is_none());
    assert!(d.observe("copy 42%").is_some());
    Ok(())
}
