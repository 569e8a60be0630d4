// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::VecDeque;

/// Fixed-capacity ring of the most recent lines seen on one descriptor.
///
/// Used as before-context: when a line matches, the ring holds the lines
/// that preceded it. Older lines are silently discarded once full.
#[derive(Debug)]
pub struct LineRing {
    lines: VecDeque<String>,
    capacity: usize,
}

impl LineRing {
    /// Create a ring holding at most `capacity` lines. A zero capacity
    /// keeps nothing.
    pub fn new(capacity: usize) -> Self {
        Self { lines: VecDeque::with_capacity(capacity), capacity }
    }

    pub fn push(&mut self, line: &str) {
        if self.capacity == 0 {
            return;
        }
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line.to_owned());
    }

    /// Retained lines, oldest first.
    pub fn snapshot(&self) -> Vec<String> {
        self.lines.iter().cloned().collect()
    }
}

#[cfg(test)]
#[path = "ring_tests.rs"]
mod tests;
