// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Line classification: exclusions, dual success/error patterns, and the
//! default pattern with optional inversion.

use anyhow::Context;
use regex::Regex;
use tracing::warn;

use crate::outcome::MatchKind;

/// Compile-time modifiers applied to every user pattern.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PatternOptions {
    pub ignore_case: bool,
    pub word: bool,
    pub line: bool,
    /// Request the alternate engine (lookaround, backreferences).
    pub perl: bool,
}

enum Matcher {
    Standard(Regex),
    #[cfg(feature = "fancy")]
    Fancy(fancy_regex::Regex),
}

/// A regex plus its modifiers, immutable after compilation.
pub struct CompiledPattern {
    source: String,
    matcher: Matcher,
}

impl std::fmt::Debug for CompiledPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledPattern").field("source", &self.source).finish()
    }
}

impl CompiledPattern {
    /// Compile `pattern`, wrapping it with anchors for the word and
    /// whole-line modifiers before handing it to the engine.
    pub fn compile(pattern: &str, opts: PatternOptions) -> anyhow::Result<Self> {
        let mut wrapped = format!("(?:{pattern})");
        if opts.word {
            wrapped = format!(r"\b{wrapped}\b");
        }
        if opts.line {
            wrapped = format!("^{wrapped}$");
        }
        if opts.ignore_case {
            wrapped = format!("(?i){wrapped}");
        }

        let matcher =
            if opts.perl { compile_perl(&wrapped, pattern)? } else { standard(&wrapped, pattern)? };
        Ok(Self { source: pattern.to_owned(), matcher })
    }

    pub fn is_match(&self, line: &str) -> bool {
        match &self.matcher {
            Matcher::Standard(re) => re.is_match(line),
            // Backtracking limits surface as errors; treat them as no match.
            #[cfg(feature = "fancy")]
            Matcher::Fancy(re) => re.is_match(line).unwrap_or(false),
        }
    }
}

fn standard(wrapped: &str, pattern: &str) -> anyhow::Result<Matcher> {
    let re = Regex::new(wrapped).with_context(|| format!("invalid pattern {pattern:?}"))?;
    Ok(Matcher::Standard(re))
}

#[cfg(feature = "fancy")]
fn compile_perl(wrapped: &str, pattern: &str) -> anyhow::Result<Matcher> {
    let re = fancy_regex::Regex::new(wrapped)
        .with_context(|| format!("invalid pattern {pattern:?}"))?;
    Ok(Matcher::Fancy(re))
}

#[cfg(not(feature = "fancy"))]
fn compile_perl(wrapped: &str, pattern: &str) -> anyhow::Result<Matcher> {
    static FANCY_FALLBACK: std::sync::Once = std::sync::Once::new();
    FANCY_FALLBACK.call_once(|| {
        warn!("perl-compatible regex engine not compiled in, using the standard engine");
    });
    standard(wrapped, pattern)
}

/// Per-line verdict from [`PatternSet::classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineClass {
    /// An exclusion matched; the line is never classified.
    Excluded,
    NoMatch,
    Match(MatchKind),
}

/// All patterns configured for a session.
#[derive(Debug, Default)]
pub struct PatternSet {
    /// Default pattern, or the error pattern in dual mode.
    pub primary: Option<CompiledPattern>,
    pub success: Option<CompiledPattern>,
    pub exclusions: Vec<CompiledPattern>,
    /// Inverts the primary pattern only.
    pub invert: bool,
    /// Primary matches classify as [`MatchKind::Error`] instead of
    /// [`MatchKind::Pattern`].
    pub dual: bool,
}

impl PatternSet {
    /// Compile exclusions leniently: a malformed one is logged and skipped.
    pub fn compile_exclusions(sources: &[String], opts: PatternOptions) -> Vec<CompiledPattern> {
        sources
            .iter()
            .filter_map(|src| match CompiledPattern::compile(src, opts) {
                Ok(p) => Some(p),
                Err(e) => {
                    warn!("skipping exclusion: {e:#}");
                    None
                }
            })
            .collect()
    }

    /// Classify one line. `primary_override` replaces the primary pattern
    /// for a descriptor with its own pattern; the success pattern and
    /// exclusions always come from the session.
    pub fn classify(&self, line: &str, primary_override: Option<&CompiledPattern>) -> LineClass {
        if self.exclusions.iter().any(|p| p.is_match(line)) {
            return LineClass::Excluded;
        }

        if let Some(ref success) = self.success {
            if success.is_match(line) {
                return LineClass::Match(MatchKind::Success);
            }
        }

        let Some(primary) = primary_override.or(self.primary.as_ref()) else {
            return LineClass::NoMatch;
        };
        if primary.is_match(line) != self.invert {
            let kind = if self.dual { MatchKind::Error } else { MatchKind::Pattern };
            return LineClass::Match(kind);
        }
        LineClass::NoMatch
    }
}

#[cfg(test)]
#[path = "pattern_tests.rs"]
mod tests;
