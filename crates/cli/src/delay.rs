// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::{Duration, Instant};

/// Post-match capture budget: the window closes at whichever bound is hit
/// first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayExit {
    pub duration: Duration,
    pub max_lines: u64,
}

impl Default for DelayExit {
    fn default() -> Self {
        Self { duration: Duration::from_secs(10), max_lines: 100 }
    }
}

/// Verdict for one line arriving after the match threshold was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admit {
    /// Echo and log the line as captured context.
    Captured,
    /// The window has closed; the line is dropped.
    Closed,
}

/// The open post-match window. Once closed it never reopens: both bounds
/// are monotonic and `closed` latches.
#[derive(Debug, Clone)]
pub struct CaptureWindow {
    opened_at: Instant,
    captured: u64,
    closed: bool,
}

impl CaptureWindow {
    pub fn open(now: Instant) -> Self {
        Self { opened_at: now, captured: 0, closed: false }
    }

    /// Lines captured since the window opened.
    pub fn captured(&self) -> u64 {
        self.captured
    }

    pub fn is_closed(&self, policy: &DelayExit, now: Instant) -> bool {
        self.closed
            || policy.duration.is_zero()
            || now.saturating_duration_since(self.opened_at) >= policy.duration
            || self.captured >= policy.max_lines
    }

    /// Count one more line against the budget.
    pub fn admit(&mut self, policy: &DelayExit, now: Instant) -> Admit {
        if self.is_closed(policy, now) {
            self.closed = true;
            return Admit::Closed;
        }
        self.captured += 1;
        Admit::Captured
    }
}

#[cfg(test)]
#[path = "delay_tests.rs"]
mod tests;
