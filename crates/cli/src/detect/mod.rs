// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hang heuristics evaluated inline on each line: repeated output, stalled
//! progress values, and backwards state transitions.

pub mod normalize;
pub mod progress;
pub mod stuck;
pub mod transition;

use std::sync::Arc;

use parking_lot::Mutex;
use regex::Regex;

use crate::outcome::StuckKind;

pub use normalize::Normalizer;
pub use progress::ProgressDetector;
pub use stuck::StuckDetector;
pub use transition::TransitionDetector;

/// A heuristic firing on a specific line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    pub kind: StuckKind,
    pub detail: String,
}

/// Whether detector state is kept per descriptor or shared by all of them.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum DetectorScope {
    #[default]
    PerStream,
    Session,
}

/// Immutable detector settings; [`DetectorConfig::build`] creates fresh state.
#[derive(Debug, Clone, Default)]
pub struct DetectorConfig {
    /// Repeat threshold for the stuck heuristic; `None` disables it.
    pub max_repeat: Option<u32>,
    pub normalizer: Normalizer,
    /// Progress extractor and its own repeat threshold.
    pub progress: Option<(Regex, u32)>,
    /// Ordered state list plus optional token extractor.
    pub transition: Option<(Vec<String>, Option<Regex>)>,
    pub scope: DetectorScope,
}

impl DetectorConfig {
    pub fn is_enabled(&self) -> bool {
        self.max_repeat.is_some() || self.progress.is_some() || self.transition.is_some()
    }

    pub fn build(&self) -> anyhow::Result<DetectorSet> {
        let stuck = self.max_repeat.map(|n| StuckDetector::new(self.normalizer.clone(), n));
        let progress = self.progress.clone().map(|(re, n)| ProgressDetector::new(re, n));
        let transition = match self.transition {
            Some((ref states, ref extractor)) => {
                Some(TransitionDetector::new(states.clone(), extractor.clone())?)
            }
            None => None,
        };
        Ok(DetectorSet { stuck, progress, transition })
    }
}

/// Any subset of the three heuristics. Every active heuristic sees every
/// line; the first one to fire on a line is reported.
#[derive(Debug, Default)]
pub struct DetectorSet {
    pub stuck: Option<StuckDetector>,
    pub progress: Option<ProgressDetector>,
    pub transition: Option<TransitionDetector>,
}

impl DetectorSet {
    pub fn observe(&mut self, line: &str) -> Option<Trigger> {
        let stuck = self.stuck.as_mut().and_then(|d| d.observe(line));
        let progress = self.progress.as_mut().and_then(|d| d.observe(line));
        let transition = self.transition.as_mut().and_then(|d| d.observe(line));
        stuck.or(progress).or(transition)
    }
}

/// Detector state as held by one stream reader.
#[derive(Debug, Default)]
pub enum DetectorHandle {
    #[default]
    Disabled,
    Owned(DetectorSet),
    Shared(Arc<Mutex<DetectorSet>>),
}

impl DetectorHandle {
    pub fn observe(&mut self, line: &str) -> Option<Trigger> {
        match self {
            Self::Disabled => None,
            Self::Owned(set) => set.observe(line),
            Self::Shared(set) => set.lock().observe(line),
        }
    }
}

#[cfg(test)]
#[path = "detect_tests.rs"]
mod tests;
