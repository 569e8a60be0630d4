// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use regex::Regex;

use super::*;

#[yare::parameterized(
    iso = { "2024-05-01T12:30:45.123Z waiting for lock", "waiting for lock" },
    iso_offset = { "2024-05-01 12:30:45,001+02:00 retrying", "retrying" },
    time_only = { "[12:30:45] polling", "[] polling" },
    kernel = { "[   12.345678] usb reset", "usb reset" },
    epoch_ms = { "1714566645123 tick", "tick" },
    untouched = { "no timestamps here", "no timestamps here" },
)]
fn strips_timestamp_forms(input: &str, expected: &str) {
    assert_eq!(strip_timestamps(input), expected);
}

#[test]
fn lines_differing_only_by_time_normalize_equal() {
    let n = Normalizer { strip_timestamps: true, extract: None };
    assert_eq!(
        n.normalize("10:00:01 Waiting for database"),
        n.normalize("10:00:02 Waiting for database")
    );
}

#[test]
fn extract_prefers_group_one() -> anyhow::Result<()> {
    let re = Regex::new(r"status=(\w+)")?;
    assert_eq!(extract(&re, "pod status=Pending since 3s"), Some("Pending".to_owned()));
    let whole = Regex::new(r"\d+%")?;
    assert_eq!(extract(&whole, "progress 42% done"), Some("42%".to_owned()));
    assert_eq!(extract(&whole, "no percent"), None);
    Ok(())
}

#[test]
fn normalize_falls_back_to_line_without_extract_match() -> anyhow::Result<()> {
    let n = Normalizer { strip_timestamps: false, extract: Some(Regex::new(r"id=(\d+)")?) };
    assert_eq!(n.normalize("job id=7 running"), "7");
    assert_eq!(n.normalize("  plain line  "), "plain line");
    Ok(())
}
