// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::LazyLock;

use regex::Regex;

/// Timestamp shapes stripped before comparing lines, most specific first.
const TIMESTAMP_SOURCES: &[&str] = &[
    // 2024-05-01T12:30:45.123Z, 2024-05-01 12:30:45,123+02:00
    r"\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(?:[.,]\d+)?(?:Z|[+-]\d{2}:?\d{2})?",
    // 2024-05-01, 2024/05/01
    r"\b\d{4}[-/]\d{2}[-/]\d{2}\b",
    // 12:30:45, 12:30:45.123
    r"\b\d{1,2}:\d{2}:\d{2}(?:[.,]\d+)?\b",
    // [   12.345678] (kernel / uptime style)
    r"\[\s*\d+\.\d+\s*\]",
    // unix epoch seconds or milliseconds
    r"\b1\d{9}(?:\d{3})?\b",
];

static TIMESTAMPS: LazyLock<Vec<Regex>> =
    LazyLock::new(|| TIMESTAMP_SOURCES.iter().filter_map(|src| Regex::new(src).ok()).collect());

/// How a line is reduced before repeat comparison.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    pub strip_timestamps: bool,
    /// When set and matching, only capture group 1 (or the whole match) is
    /// compared. Non-matching lines fall back to the full line.
    pub extract: Option<Regex>,
}

impl Normalizer {
    pub fn normalize(&self, line: &str) -> String {
        let mut text = if self.strip_timestamps { strip_timestamps(line) } else { line.to_owned() };
        if let Some(ref re) = self.extract {
            if let Some(extracted) = extract(re, &text) {
                text = extracted;
            }
        }
        text.trim().to_owned()
    }
}

/// Remove common timestamp forms and collapse the leftover whitespace.
pub fn strip_timestamps(line: &str) -> String {
    let mut text = line.to_owned();
    for re in TIMESTAMPS.iter() {
        if re.is_match(&text) {
            text = re.replace_all(&text, "").into_owned();
        }
    }
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Capture group 1 if the pattern has one and it participated, else the
/// whole match.
pub fn extract(re: &Regex, text: &str) -> Option<String> {
    let caps = re.captures(text)?;
    let m = caps.get(1).or_else(|| caps.get(0))?;
    Some(m.as_str().to_owned())
}

#[cfg(test)]
#[path = "normalize_tests.rs"]
mod tests;
