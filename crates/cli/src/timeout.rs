// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Overall, idle, first-output, and per-stream idle deadlines.
//!
//! Each configured limit becomes a [`Comparator`] polled by its own task
//! against the shared timing in [`MonitorState`]. The first comparator to
//! fire records its reason; the supervising loop commits the outcome.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::outcome::TimeoutReason;
use crate::state::MonitorState;
use crate::stream::StreamId;

/// Every deadline configured for a session. `None` disables a limit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeoutPolicy {
    pub overall: Option<Duration>,
    pub idle: Option<Duration>,
    pub first_output: Option<Duration>,
    pub stream_idle: Vec<(StreamId, Duration)>,
}

impl TimeoutPolicy {
    pub fn is_empty(&self) -> bool {
        self.comparators().is_empty()
    }

    pub fn comparators(&self) -> Vec<Comparator> {
        let mut out = Vec::new();
        if let Some(d) = self.overall {
            out.push(Comparator::Overall(d));
        }
        if let Some(d) = self.idle {
            out.push(Comparator::Idle(d));
        }
        if let Some(d) = self.first_output {
            out.push(Comparator::FirstOutput(d));
        }
        out.extend(self.stream_idle.iter().map(|&(id, d)| Comparator::StreamIdle(id, d)));
        out
    }
}

/// One deadline check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    /// Wall clock since start.
    Overall(Duration),
    /// Since the last monitored line, or since start before any output.
    Idle(Duration),
    /// Since start, only while no monitored line has arrived.
    FirstOutput(Duration),
    /// Since the stream's last line; armed by its first line.
    StreamIdle(StreamId, Duration),
}

impl Comparator {
    pub fn reason(&self) -> TimeoutReason {
        match self {
            Self::Overall(_) => TimeoutReason::Overall,
            Self::Idle(_) => TimeoutReason::Idle,
            Self::FirstOutput(_) => TimeoutReason::FirstOutput,
            Self::StreamIdle(id, _) => TimeoutReason::StreamIdle(*id),
        }
    }

    /// Whether the deadline has passed at `now`.
    pub fn check(&self, state: &MonitorState, now: Instant) -> bool {
        let since = |t: Instant| now.saturating_duration_since(t);
        match *self {
            Self::Overall(limit) => since(state.started_at()) >= limit,
            Self::Idle(limit) => {
                since(state.last_output().unwrap_or(state.started_at())) >= limit
            }
            Self::FirstOutput(limit) => {
                state.first_output().is_none() && since(state.started_at()) >= limit
            }
            Self::StreamIdle(id, limit) => {
                state.stream_timing(id).last.is_some_and(|last| since(last) >= limit)
            }
        }
    }

    /// Poll until the deadline passes, the session ends, or `shutdown` fires.
    /// Returns whether this comparator recorded the timeout.
    pub async fn watch(
        self,
        state: Arc<MonitorState>,
        poll: Duration,
        shutdown: CancellationToken,
    ) -> bool {
        let mut interval = tokio::time::interval(poll);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return false,
                _ = interval.tick() => {}
            }
            if state.is_terminal() {
                return false;
            }
            // After the match threshold the delay-exit bounds take over.
            if state.window_open() {
                continue;
            }
            if self.check(&state, Instant::now()) {
                let reason = self.reason();
                let recorded = state.record_timeout(reason);
                if recorded {
                    debug!("timeout fired: {reason}");
                    state.wake.notify_one();
                }
                return recorded;
            }
        }
    }
}

#[cfg(test)]
#[path = "timeout_tests.rs"]
mod tests;
