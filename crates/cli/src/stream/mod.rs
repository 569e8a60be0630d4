// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-descriptor identity, configuration, and the reader task that feeds
//! lines into classification.

pub mod lines;
pub mod reader;
pub mod sink;

use std::fmt;
use std::path::PathBuf;

use serde::{Serialize, Serializer};

use crate::pattern::CompiledPattern;

pub use lines::LineDecoder;
pub use reader::{Dispatch, ReaderReport, StreamReader};
pub use sink::LogSink;

/// One monitored or drained I/O channel of the child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StreamId {
    Stdout,
    Stderr,
    /// Custom descriptor, always >= 3.
    Fd(i32),
}

impl StreamId {
    pub fn fd(&self) -> i32 {
        match self {
            Self::Stdout => 1,
            Self::Stderr => 2,
            Self::Fd(n) => *n,
        }
    }

    /// Whether echoed lines belong on our stdout (only the child's stdout does).
    pub fn echoes_to_stdout(&self) -> bool {
        matches!(self, Self::Stdout)
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout => f.write_str("stdout"),
            Self::Stderr => f.write_str("stderr"),
            Self::Fd(n) => write!(f, "fd{n}"),
        }
    }
}

impl Serialize for StreamId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Setup-time description of one descriptor, resolved once before spawn.
#[derive(Debug)]
pub struct StreamSpec {
    pub id: StreamId,
    /// Drained streams are echoed and logged but never classified, never
    /// fed to detectors, and do not count as output for timeouts.
    pub monitored: bool,
    /// Replaces the session's primary pattern for this descriptor.
    pub pattern: Option<CompiledPattern>,
    pub label: String,
    pub log_path: Option<PathBuf>,
}

impl StreamSpec {
    pub fn new(id: StreamId, monitored: bool) -> Self {
        Self { id, monitored, pattern: None, label: id.to_string(), log_path: None }
    }
}
