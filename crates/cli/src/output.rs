// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal rendering: echoed child output, one-line diagnostics, and the
//! `--json` summary.

use std::collections::BTreeMap;
use std::io::{IsTerminal, Write};
use std::path::PathBuf;

use colored::Colorize;
use serde::Serialize;

use crate::outcome::{Classification, MatchKind, Outcome};
use crate::session::Report;
use crate::state::MatchInfo;
use crate::stream::StreamId;

/// When to highlight matching lines.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ColorMode {
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorMode {
    /// Resolve `auto` against whether our stdout is a terminal.
    pub fn enabled(self) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Auto => std::io::stdout().is_terminal(),
        }
    }
}

/// Echo settings shared by every reader.
#[derive(Debug, Clone, Copy, Default)]
pub struct Printer {
    pub quiet: bool,
    pub line_numbers: bool,
    pub labels: bool,
    pub color: bool,
}

impl Printer {
    /// Build a printer. Process-wide `colored` state is left alone; the
    /// binary sets it once at startup.
    pub fn new(quiet: bool, line_numbers: bool, labels: bool, color: ColorMode) -> Self {
        Self { quiet, line_numbers, labels, color: color.enabled() }
    }

    /// Render one echoed line without the trailing newline.
    pub fn format_line(
        &self,
        label: &str,
        line_number: u64,
        line: &str,
        matched: Option<MatchKind>,
    ) -> String {
        let mut out = String::new();
        if self.labels {
            out.push('[');
            out.push_str(label);
            out.push_str("] ");
        }
        if self.line_numbers {
            out.push_str(&line_number.to_string());
            out.push(':');
        }
        match matched {
            Some(kind) if self.color => {
                let styled = match kind.classification() {
                    Classification::Success => line.green().bold(),
                    _ => line.red().bold(),
                };
                out.push_str(&styled.to_string());
            }
            _ => out.push_str(line),
        }
        out
    }

    /// Echo a child line to the matching terminal stream. Write errors
    /// (closed pipe downstream) are ignored.
    pub fn echo(
        &self,
        id: StreamId,
        label: &str,
        line_number: u64,
        line: &str,
        matched: Option<MatchKind>,
    ) {
        if self.quiet {
            return;
        }
        let rendered = self.format_line(label, line_number, line, matched);
        if id.echoes_to_stdout() {
            let mut out = std::io::stdout().lock();
            let _ = writeln!(out, "{rendered}");
            let _ = out.flush();
        } else {
            let _ = writeln!(std::io::stderr().lock(), "{rendered}");
        }
    }
}

/// One-line stderr diagnostic for outcomes that deserve explanation.
pub fn diagnostic(report: &Report) -> Option<String> {
    let line = match report.outcome {
        Outcome::Timeout(reason) => {
            format!("earlyexit: timeout ({reason}) after {:.1}s", report.duration.as_secs_f64())
        }
        Outcome::Stuck(kind) => match report.trigger {
            Some(ref event) => format!(
                "earlyexit: stuck ({kind}) on {}: {}",
                event.stream, event.trigger.detail
            ),
            None => format!("earlyexit: stuck ({kind})"),
        },
        Outcome::Detached => match report.child_pid {
            Some(pid) => format!("earlyexit: detached from pid {pid}"),
            None => "earlyexit: detached".to_owned(),
        },
        Outcome::Interrupted => "earlyexit: interrupted".to_owned(),
        Outcome::CliError => match report.error {
            Some(ref e) => format!("earlyexit: error: {e}"),
            None => "earlyexit: error".to_owned(),
        },
        Outcome::Matched(_) | Outcome::NoMatch => return None,
    };
    Some(line)
}

/// Machine-readable end-of-run summary printed with `--json`.
#[derive(Debug, Serialize)]
pub struct Summary {
    pub outcome: String,
    pub exit_code: i32,
    pub classification: Classification,
    pub match_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_match: Option<MatchInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
    pub captured_lines: u64,
    pub streams: BTreeMap<String, u64>,
    pub duration_ms: u64,
    pub child_pid: Option<u32>,
    pub child_exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub child_signal: Option<i32>,
    pub log_files: Vec<PathBuf>,
}

impl Summary {
    pub fn new(report: &Report) -> Self {
        Self {
            outcome: report.outcome.to_string(),
            exit_code: report.exit_code,
            classification: report.classification,
            match_count: report.match_count,
            first_match: report.first_match.clone(),
            trigger: report.trigger.as_ref().map(|e| e.trigger.detail.clone()),
            captured_lines: report.captured_lines,
            streams: report.stream_lines.iter().map(|(id, n)| (id.to_string(), *n)).collect(),
            duration_ms: report.duration.as_millis() as u64,
            child_pid: report.child_pid,
            child_exit_code: report.child_status.and_then(|s| s.code),
            child_signal: report.child_status.and_then(|s| s.signal),
            log_files: report.log_files.clone(),
        }
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;
