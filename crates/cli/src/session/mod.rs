// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Monitoring session: immutable settings resolved once from [`Config`], and
//! the supervising loop that turns shared state into one outcome.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use regex::Regex;
use tracing::warn;

use crate::config::Config;
use crate::delay::DelayExit;
use crate::detect::{DetectorConfig, DetectorScope, Normalizer};
use crate::exit::ExitConvention;
use crate::outcome::{Classification, Outcome};
use crate::output::Printer;
use crate::pattern::{CompiledPattern, PatternSet};
use crate::process::ExitStatus;
use crate::state::{MatchInfo, StuckEvent};
use crate::stream::{sink, StreamId, StreamSpec};
use crate::timeout::TimeoutPolicy;

pub mod run;

pub use run::Session;

/// What to do with the child instead of killing it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetachPolicy {
    /// Also detach when a timeout fires.
    pub on_timeout: bool,
    pub pid_file: Option<PathBuf>,
}

/// Everything a session needs, validated and compiled before spawn.
#[derive(Debug)]
pub struct SessionConfig {
    pub command: Vec<String>,
    /// Source of the pattern that classified lines, for telemetry.
    pub pattern_source: Option<String>,
    pub patterns: Arc<PatternSet>,
    pub streams: Vec<StreamSpec>,
    pub detectors: DetectorConfig,
    pub timeouts: TimeoutPolicy,
    pub delay: DelayExit,
    pub max_count: u64,
    pub context: usize,
    pub printer: Printer,
    pub detach: Option<DetachPolicy>,
    /// Spawn the child as a process group leader and signal the group.
    pub group: bool,
    pub unbuffered: bool,
    pub convention: ExitConvention,
    pub grace: Duration,
    pub poll: Duration,
    pub join_timeout: Duration,
}

impl SessionConfig {
    /// Compile patterns and detectors and resolve descriptors. Any error
    /// here is a usage error.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let opts = config.pattern_options();
        let primary_source = config.pattern.as_ref().or(config.error_pattern.as_ref());
        let primary = primary_source.map(|p| CompiledPattern::compile(p, opts)).transpose()?;
        let success =
            config.success_pattern.as_ref().map(|p| CompiledPattern::compile(p, opts)).transpose()?;
        let patterns = PatternSet {
            primary,
            success,
            exclusions: PatternSet::compile_exclusions(&config.exclude, opts),
            invert: config.invert_match,
            dual: config.success_pattern.is_some() || config.error_pattern.is_some(),
        };

        let streams = resolve_streams(config)?;
        let detectors = detector_config(config)?;
        // Fail on a bad state list now rather than after spawn.
        detectors.build()?;

        let labels = config.label || !config.fd_labels.is_empty();
        Ok(Self {
            command: config.command.clone(),
            pattern_source: primary_source.or(config.success_pattern.as_ref()).cloned(),
            patterns: Arc::new(patterns),
            streams,
            detectors,
            timeouts: config.timeout_policy(),
            delay: config.delay_exit(),
            max_count: config.max_count,
            context: config.context,
            printer: Printer::new(config.quiet, config.line_number, labels, config.color),
            detach: config.detach.then(|| DetachPolicy {
                on_timeout: config.detach_on_timeout,
                pid_file: config.pid_file.clone(),
            }),
            group: config.detach_group,
            unbuffered: config.unbuffered,
            convention: config.exit_convention(),
            grace: config.grace_period,
            poll: config.poll_interval(),
            join_timeout: config.join_timeout(),
        })
    }
}

fn resolve_streams(config: &Config) -> anyhow::Result<Vec<StreamSpec>> {
    let (stdout, stderr) = config.standard_streams();
    let mut streams =
        vec![StreamSpec::new(StreamId::Stdout, stdout), StreamSpec::new(StreamId::Stderr, stderr)];
    streams.extend(config.fds.iter().map(|&fd| StreamSpec::new(StreamId::Fd(fd), true)));

    for (fd, source) in config.fd_patterns()? {
        let Some(spec) = streams.iter_mut().find(|s| s.id.fd() == fd) else {
            continue;
        };
        match CompiledPattern::compile(&source, config.pattern_options()) {
            Ok(p) => spec.pattern = Some(p),
            Err(e) => warn!("ignoring pattern for fd {fd}: {e:#}"),
        }
    }
    for (fd, label) in config.fd_labels()? {
        if let Some(spec) = streams.iter_mut().find(|s| s.id.fd() == fd) {
            spec.label = label;
        }
    }

    if config.logging() {
        let prefix = match config.log_prefix {
            Some(ref prefix) => prefix.clone(),
            None => {
                let dir = config.log_dir.clone().unwrap_or_else(std::env::temp_dir);
                let _ = std::fs::create_dir_all(&dir);
                sink::auto_prefix(&dir, &config.command, std::process::id())
            }
        };
        for spec in streams.iter_mut().filter(|s| s.monitored) {
            spec.log_path = Some(sink::log_path(&prefix, spec.id));
        }
    }
    Ok(streams)
}

fn detector_config(config: &Config) -> anyhow::Result<DetectorConfig> {
    let compile = |flag: &str, src: &Option<String>| -> anyhow::Result<Option<Regex>> {
        src.as_deref()
            .map(|s| Regex::new(s).with_context(|| format!("invalid {flag} {s:?}")))
            .transpose()
    };
    let progress = compile("--progress-pattern", &config.progress_pattern)?
        .map(|re| (re, config.progress_repeat));
    let transition = if config.transition_states.is_empty() {
        None
    } else {
        let extractor = compile("--transition-pattern", &config.transition_pattern)?;
        Some((config.transition_states.clone(), extractor))
    };
    Ok(DetectorConfig {
        max_repeat: config.max_repeat,
        normalizer: Normalizer {
            strip_timestamps: config.stuck_ignore_timestamps,
            extract: compile("--stuck-pattern", &config.stuck_pattern)?,
        },
        progress,
        transition,
        scope: if config.session_detector { DetectorScope::Session } else { DetectorScope::PerStream },
    })
}

/// Result of one session, as printed and recorded.
#[derive(Debug, Clone)]
pub struct Report {
    pub outcome: Outcome,
    pub exit_code: i32,
    pub classification: Classification,
    pub match_count: u64,
    pub first_match: Option<MatchInfo>,
    pub trigger: Option<StuckEvent>,
    pub captured_lines: u64,
    /// Lines read per descriptor, drained ones included.
    pub stream_lines: Vec<(StreamId, u64)>,
    pub duration: Duration,
    pub child_pid: Option<u32>,
    pub child_status: Option<ExitStatus>,
    pub log_files: Vec<PathBuf>,
    /// Setup or spawn failure message for `cli_error`.
    pub error: Option<String>,
}

#[cfg(test)]
#[path = "../session_tests.rs"]
mod tests;
