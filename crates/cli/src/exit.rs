// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};

use crate::outcome::{MatchKind, Outcome};

pub const TIMEOUT: i32 = 2;
pub const CLI_ERROR: i32 = 3;
pub const DETACHED: i32 = 4;
pub const INTERRUPTED: i32 = 130;

/// Meaning of exit codes 0 and 1. Every other code is shared.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitConvention {
    /// grep-like: 0 = pattern found, 1 = not found.
    #[default]
    PatternFound,
    /// shell-like: 0 = no error found, 1 = error found.
    Success,
}

/// Map a committed outcome to the process exit code.
pub fn resolve(outcome: Outcome, convention: ExitConvention) -> i32 {
    match (outcome, convention) {
        (Outcome::Matched(MatchKind::Success), _) => 0,
        (Outcome::Matched(MatchKind::Error), _) => 1,
        (Outcome::Matched(MatchKind::Pattern), ExitConvention::PatternFound) => 0,
        (Outcome::Matched(MatchKind::Pattern), ExitConvention::Success) => 1,
        (Outcome::NoMatch, ExitConvention::PatternFound) => 1,
        (Outcome::NoMatch, ExitConvention::Success) => 0,
        (Outcome::Timeout(_) | Outcome::Stuck(_), _) => TIMEOUT,
        (Outcome::CliError, _) => CLI_ERROR,
        (Outcome::Detached, _) => DETACHED,
        (Outcome::Interrupted, _) => INTERRUPTED,
    }
}

#[cfg(test)]
#[path = "exit_tests.rs"]
mod tests;
