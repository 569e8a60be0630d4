// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use regex::Regex;

use super::normalize::extract;
use super::stuck::RepeatCounter;
use super::Trigger;
use crate::outcome::StuckKind;

/// Fires when a value that should advance (a counter, a percentage) stays
/// the same across `max_repeat` consecutive occurrences. Lines where the
/// extractor does not match are ignored.
#[derive(Debug)]
pub struct ProgressDetector {
    extractor: Regex,
    max_repeat: u32,
    counter: RepeatCounter,
}

impl ProgressDetector {
    pub fn new(extractor: Regex, max_repeat: u32) -> Self {
        Self { extractor, max_repeat, counter: RepeatCounter::default() }
    }

    pub fn observe(&mut self, line: &str) -> Option<Trigger> {
        let value = extract(&self.extractor, line)?;
        let repeats = self.counter.observe(value.clone());
        if repeats >= self.max_repeat {
            return Some(Trigger {
                kind: StuckKind::NoProgress,
                detail: format!("no progress: {value:?} unchanged for {repeats} repeats"),
            });
        }
        None
    }
}

#[cfg(test)]
#[path = "progress_tests.rs"]
mod tests;
