// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fire-and-forget run records for an external statistics collaborator.
//!
//! Recording never blocks or alters termination: every I/O or
//! serialization failure is swallowed.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::outcome::Classification;

/// The first triggering line of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub command: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    pub stream: String,
    pub line_number: u64,
    pub line: String,
    pub context: Vec<String>,
    pub classification: Classification,
    pub timestamp_ms: u64,
}

/// Summary of one completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub command: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    pub started_ms: u64,
    pub ended_ms: u64,
    pub outcome: String,
    pub exit_code: i32,
    pub classification: Classification,
    pub match_count: u64,
    pub stream_lines: BTreeMap<String, u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub child_exit_code: Option<i32>,
}

/// One JSONL line in the telemetry file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TelemetryEntry {
    Match(MatchRecord),
    Execution(ExecutionRecord),
}

/// Sink for run records.
pub trait Recorder: Send + Sync {
    fn record_match(&self, record: &MatchRecord);
    fn record_execution(&self, record: &ExecutionRecord);
}

/// Default recorder: drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRecorder;

impl Recorder for NoopRecorder {
    fn record_match(&self, _record: &MatchRecord) {}
    fn record_execution(&self, _record: &ExecutionRecord) {}
}

/// Appends each record as one JSON object per line.
#[derive(Debug, Clone)]
pub struct JsonlRecorder {
    path: PathBuf,
}

impl JsonlRecorder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, entry: &TelemetryEntry) {
        let Ok(mut line) = serde_json::to_string(entry) else {
            return;
        };
        line.push('\n');
        let Ok(mut file) = std::fs::OpenOptions::new().create(true).append(true).open(&self.path)
        else {
            return;
        };
        let _ = file.write_all(line.as_bytes());
    }

    /// Read back every parseable entry; unreadable lines are skipped.
    pub fn entries(&self) -> Vec<TelemetryEntry> {
        let Ok(contents) = std::fs::read_to_string(&self.path) else {
            return vec![];
        };
        contents.lines().filter_map(|line| serde_json::from_str(line).ok()).collect()
    }
}

impl Recorder for JsonlRecorder {
    fn record_match(&self, record: &MatchRecord) {
        self.append(&TelemetryEntry::Match(record.clone()));
    }

    fn record_execution(&self, record: &ExecutionRecord) {
        self.append(&TelemetryEntry::Execution(record.clone()));
    }
}

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
#[path = "telemetry_tests.rs"]
mod tests;
