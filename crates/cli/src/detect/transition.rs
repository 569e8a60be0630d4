// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use anyhow::Context;
use regex::Regex;

use super::normalize::extract;
use super::Trigger;
use crate::outcome::StuckKind;

/// Fires when a recognized state token moves backwards in a declared order.
#[derive(Debug)]
pub struct TransitionDetector {
    states: Vec<String>,
    finder: Regex,
    /// Highest state index seen so far.
    highest: Option<usize>,
    fired: bool,
}

impl TransitionDetector {
    /// Build a detector over `states` (in forward order). With no
    /// `extractor`, the first declared state found as a whole word is used.
    pub fn new(states: Vec<String>, extractor: Option<Regex>) -> anyhow::Result<Self> {
        anyhow::ensure!(!states.is_empty(), "transition state list is empty");
        let finder = match extractor {
            Some(re) => re,
            None => {
                let alternation =
                    states.iter().map(|s| regex::escape(s)).collect::<Vec<_>>().join("|");
                Regex::new(&format!(r"\b(?:{alternation})\b"))
                    .context("failed to build transition state matcher")?
            }
        };
        Ok(Self { states, finder, highest: None, fired: false })
    }

    /// Position of `token` in the declared order.
    pub fn index_of(&self, token: &str) -> Option<usize> {
        let token = token.trim();
        self.states.iter().position(|s| s == token)
    }

    pub fn observe(&mut self, line: &str) -> Option<Trigger> {
        if self.fired {
            return None;
        }
        let token = extract(&self.finder, line)?;
        let index = self.index_of(&token)?;

        match self.highest {
            Some(highest) if index < highest => {
                self.fired = true;
                Some(Trigger {
                    kind: StuckKind::Regression,
                    detail: format!(
                        "state regressed from {:?} to {:?}",
                        self.states[highest], self.states[index]
                    ),
                })
            }
            _ => {
                self.highest = Some(index);
                None
            }
        }
    }
}

#[cfg(test)]
#[path = "transition_tests.rs"]
mod tests;
