// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: fixtures and assertion helpers.

use std::io::Cursor;

use tokio::io::AsyncRead;

use crate::pattern::{CompiledPattern, PatternOptions, PatternSet};

/// A pattern set with only a primary pattern, default options.
pub fn primary_patterns(src: &str) -> anyhow::Result<PatternSet> {
    Ok(PatternSet {
        primary: Some(CompiledPattern::compile(src, PatternOptions::default())?),
        ..PatternSet::default()
    })
}

/// An in-memory descriptor that yields `text` then EOF.
pub fn text_source(text: &str) -> Box<dyn AsyncRead + Send + Unpin> {
    Box::new(Cursor::new(text.as_bytes().to_vec()))
}

/// Assert that an expression evaluates to `Err` whose Display output
/// contains the given substring.
#[macro_export]
macro_rules! assert_err_contains {
    ($expr:expr, $substr:expr) => {{
        let result = $expr;
        let err = result.expect_err(concat!("expected Err for: ", stringify!($expr)));
        let msg = format!("{err:#}");
        assert!(msg.contains($substr), "expected error containing {:?}, got: {msg:?}", $substr);
    }};
}
