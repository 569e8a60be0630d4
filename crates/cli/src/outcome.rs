// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::stream::StreamId;

/// Session-wide classification of the first triggering line.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    #[default]
    None,
    Success,
    Error,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which pattern slot produced a match.
///
/// A plain positional pattern classifies as `error` but keeps its own kind so
/// the exit resolver can apply the selected convention to it; dual-mode
/// success/error matches have fixed codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Pattern,
    Success,
    Error,
}

impl MatchKind {
    pub fn classification(&self) -> Classification {
        match self {
            Self::Success => Classification::Success,
            Self::Pattern | Self::Error => Classification::Error,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pattern => "pattern",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// Which timeout comparator fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutReason {
    Overall,
    Idle,
    FirstOutput,
    StreamIdle(StreamId),
}

impl fmt::Display for TimeoutReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overall => f.write_str("overall"),
            Self::Idle => f.write_str("idle"),
            Self::FirstOutput => f.write_str("first_output"),
            Self::StreamIdle(id) => write!(f, "{id}_idle"),
        }
    }
}

/// Which hang heuristic fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StuckKind {
    Repeat,
    NoProgress,
    Regression,
}

impl StuckKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Repeat => "repeat",
            Self::NoProgress => "no_progress",
            Self::Regression => "regression",
        }
    }
}

impl fmt::Display for StuckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal result of one monitoring session. Committed exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Matched(MatchKind),
    NoMatch,
    Timeout(TimeoutReason),
    Stuck(StuckKind),
    Detached,
    CliError,
    Interrupted,
}

impl Outcome {
    /// Wire-format name without the reason payload.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Matched(_) => "matched",
            Self::NoMatch => "no_match",
            Self::Timeout(_) => "timeout",
            Self::Stuck(_) => "stuck",
            Self::Detached => "detached",
            Self::CliError => "cli_error",
            Self::Interrupted => "interrupted",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Matched(kind) => write!(f, "matched({})", kind.as_str()),
            Self::Timeout(reason) => write!(f, "timeout({reason})"),
            Self::Stuck(kind) => write!(f, "stuck({kind})"),
            other => f.write_str(other.as_str()),
        }
    }
}

#[cfg(test)]
#[path = "outcome_tests.rs"]
mod tests;
