// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cross-task session state shared by readers, timeout comparators, and the
//! supervising loop.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::Notify;

use crate::delay::{Admit, CaptureWindow, DelayExit};
use crate::detect::Trigger;
use crate::outcome::{Classification, MatchKind, Outcome, TimeoutReason};
use crate::stream::StreamId;

/// The line that first classified the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchInfo {
    pub kind: MatchKind,
    pub stream: StreamId,
    pub line_number: u64,
    pub line: String,
    /// Lines that preceded the match on the same descriptor.
    pub context: Vec<String>,
}

/// A hang heuristic firing, with where it fired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StuckEvent {
    pub trigger: Trigger,
    pub stream: StreamId,
    pub line: String,
}

/// Output timestamps for one descriptor.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StreamTiming {
    pub first: Option<Instant>,
    pub last: Option<Instant>,
    pub lines: u64,
}

#[derive(Debug, Default)]
struct Timing {
    last_output: Option<Instant>,
    streams: BTreeMap<StreamId, StreamTiming>,
}

#[derive(Debug, Default)]
struct Matching {
    classification: Classification,
    first: Option<MatchInfo>,
    window: Option<CaptureWindow>,
}

/// Shared mutable state for one session.
///
/// Every field is either atomic or behind a mutex. Set-once fields
/// (trigger, timeout, outcome) ignore later writes.
pub struct MonitorState {
    started_at: Instant,
    timing: Mutex<Timing>,
    match_count: AtomicU64,
    matching: Mutex<Matching>,
    trigger: Mutex<Option<StuckEvent>>,
    timeout: Mutex<Option<TimeoutReason>>,
    outcome: Mutex<Option<Outcome>>,
    readers_active: AtomicUsize,
    /// Wakes the supervising loop when a reader records something terminal.
    pub wake: Notify,
}

impl MonitorState {
    pub fn new(started_at: Instant) -> Self {
        Self {
            started_at,
            timing: Mutex::new(Timing::default()),
            match_count: AtomicU64::new(0),
            matching: Mutex::new(Matching::default()),
            trigger: Mutex::new(None),
            timeout: Mutex::new(None),
            outcome: Mutex::new(None),
            readers_active: AtomicUsize::new(0),
            wake: Notify::new(),
        }
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    // -- Timing ---------------------------------------------------------------

    /// Record a line from `id` at `now`; returns the per-stream line number.
    pub fn record_output(&self, id: StreamId, now: Instant) -> u64 {
        let mut timing = self.timing.lock();
        timing.last_output = Some(now);
        let stream = timing.streams.entry(id).or_default();
        stream.first.get_or_insert(now);
        stream.last = Some(now);
        stream.lines += 1;
        stream.lines
    }

    pub fn last_output(&self) -> Option<Instant> {
        self.timing.lock().last_output
    }

    /// Earliest first-output timestamp across all streams.
    pub fn first_output(&self) -> Option<Instant> {
        self.timing.lock().streams.values().filter_map(|s| s.first).min()
    }

    pub fn stream_timing(&self, id: StreamId) -> StreamTiming {
        self.timing.lock().streams.get(&id).copied().unwrap_or_default()
    }

    // -- Matching -------------------------------------------------------------

    /// Record a matching line. Returns `true` when this match reaches
    /// `max_count` and opens the delay-exit window. Once the window is open
    /// further matches are not counted.
    pub fn record_match(&self, info: MatchInfo, max_count: u64, now: Instant) -> bool {
        let mut matching = self.matching.lock();
        if matching.window.is_some() {
            return false;
        }
        let count = self.match_count.fetch_add(1, Ordering::AcqRel) + 1;
        if matching.classification == Classification::None {
            matching.classification = info.kind.classification();
        }
        if matching.first.is_none() {
            matching.first = Some(info);
        }
        if count >= max_count.max(1) {
            matching.window = Some(CaptureWindow::open(now));
            return true;
        }
        false
    }

    pub fn match_count(&self) -> u64 {
        self.match_count.load(Ordering::Acquire)
    }

    pub fn classification(&self) -> Classification {
        self.matching.lock().classification
    }

    pub fn first_match(&self) -> Option<MatchInfo> {
        self.matching.lock().first.clone()
    }

    /// Kind of the session's first match, once the threshold was reached.
    pub fn matched_kind(&self) -> Option<MatchKind> {
        let matching = self.matching.lock();
        matching.window.as_ref()?;
        matching.first.as_ref().map(|m| m.kind)
    }

    pub fn window_open(&self) -> bool {
        self.matching.lock().window.is_some()
    }

    /// Admit a post-match line against the delay-exit budget. `None` when
    /// no window is open.
    pub fn admit_line(&self, policy: &DelayExit, now: Instant) -> Option<Admit> {
        let mut matching = self.matching.lock();
        matching.window.as_mut().map(|w| w.admit(policy, now))
    }

    /// Whether an open window has hit either bound.
    pub fn window_closed(&self, policy: &DelayExit, now: Instant) -> bool {
        self.matching.lock().window.as_ref().is_some_and(|w| w.is_closed(policy, now))
    }

    pub fn captured_lines(&self) -> u64 {
        self.matching.lock().window.as_ref().map_or(0, |w| w.captured())
    }

    // -- Terminal conditions --------------------------------------------------

    /// Record a hang heuristic firing; the first one wins.
    pub fn record_trigger(&self, event: StuckEvent) -> bool {
        let mut slot = self.trigger.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(event);
        true
    }

    pub fn trigger(&self) -> Option<StuckEvent> {
        self.trigger.lock().clone()
    }

    /// Record a timeout comparator firing; the first one wins.
    pub fn record_timeout(&self, reason: TimeoutReason) -> bool {
        let mut slot = self.timeout.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(reason);
        true
    }

    pub fn timeout(&self) -> Option<TimeoutReason> {
        *self.timeout.lock()
    }

    /// Commit the session outcome. Only the first commit takes effect.
    pub fn commit(&self, outcome: Outcome) -> bool {
        let mut slot = self.outcome.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(outcome);
        true
    }

    pub fn outcome(&self) -> Option<Outcome> {
        *self.outcome.lock()
    }

    pub fn is_terminal(&self) -> bool {
        self.outcome.lock().is_some()
    }

    // -- Reader lifecycle -----------------------------------------------------

    pub fn reader_started(&self) {
        self.readers_active.fetch_add(1, Ordering::AcqRel);
    }

    pub fn reader_finished(&self) {
        self.readers_active.fetch_sub(1, Ordering::AcqRel);
        self.wake.notify_one();
    }

    pub fn readers_done(&self) -> bool {
        self.readers_active.load(Ordering::Acquire) == 0
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
