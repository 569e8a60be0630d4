// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::normalize::Normalizer;
use super::Trigger;
use crate::outcome::StuckKind;

/// Counts consecutive occurrences of the same value.
#[derive(Debug, Default)]
pub struct RepeatCounter {
    last: Option<String>,
    occurrences: u32,
}

impl RepeatCounter {
    /// Feed one value and return how many times it has repeated in a row
    /// (0 for a fresh value).
    pub fn observe(&mut self, value: String) -> u32 {
        if self.last.as_deref() == Some(value.as_str()) {
            self.occurrences = self.occurrences.saturating_add(1);
        } else {
            self.last = Some(value);
            self.occurrences = 1;
        }
        self.repeats()
    }

    /// Forget the previous value so the next one starts a fresh run.
    pub fn reset(&mut self) {
        self.last = None;
        self.occurrences = 0;
    }

    pub fn repeats(&self) -> u32 {
        self.occurrences.saturating_sub(1)
    }
}

/// Fires when the same normalized line repeats `max_repeat` times.
#[derive(Debug)]
pub struct StuckDetector {
    normalizer: Normalizer,
    max_repeat: u32,
    counter: RepeatCounter,
}

impl StuckDetector {
    pub fn new(normalizer: Normalizer, max_repeat: u32) -> Self {
        Self { normalizer, max_repeat, counter: RepeatCounter::default() }
    }

    pub fn observe(&mut self, line: &str) -> Option<Trigger> {
        let normalized = self.normalizer.normalize(line);
        // A blank line never repeats anything and breaks the current run.
        if normalized.is_empty() {
            self.counter.reset();
            return None;
        }
        let repeats = self.counter.observe(normalized);
        if repeats >= self.max_repeat {
            return Some(Trigger {
                kind: StuckKind::Repeat,
                detail: format!("line repeated {repeats} times: {line}"),
            });
        }
        None
    }
}

#[cfg(test)]
#[path = "stuck_tests.rs"]
mod tests;
