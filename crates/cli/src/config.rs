// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::delay::DelayExit;
use crate::exit::ExitConvention;
use crate::output::ColorMode;
use crate::pattern::PatternOptions;
use crate::stream::StreamId;
use crate::timeout::TimeoutPolicy;

/// Run a command and stop it as soon as its output says something
/// interesting.
#[derive(Debug, Parser)]
#[command(name = "earlyexit", version, about)]
pub struct Config {
    /// Regex to watch for. Optional when a timeout, detector, or dual
    /// pattern is given.
    pub pattern: Option<String>,

    /// Command to run (after --).
    #[arg(last = true)]
    pub command: Vec<String>,

    // -- Pattern -------------------------------------------------------------
    /// Case-insensitive matching.
    #[arg(short = 'i', long)]
    pub ignore_case: bool,

    /// Match whole words only.
    #[arg(short = 'w', long = "word-regexp")]
    pub word_regexp: bool,

    /// Match whole lines only.
    #[arg(short = 'x', long = "line-regexp")]
    pub line_regexp: bool,

    /// Trigger on lines that do NOT match PATTERN.
    #[arg(short = 'v', long = "invert-match")]
    pub invert_match: bool,

    /// Number of matches before the delay-exit window opens.
    #[arg(short = 'm', long, default_value = "1")]
    pub max_count: u64,

    /// Use the backtracking engine (lookaround, backreferences).
    #[arg(short = 'P', long)]
    pub perl_regexp: bool,

    /// Ignore lines matching this regex (repeatable).
    #[arg(long)]
    pub exclude: Vec<String>,

    /// Lines matching this classify the run as a success.
    #[arg(long)]
    pub success_pattern: Option<String>,

    /// Lines matching this classify the run as an error.
    #[arg(long)]
    pub error_pattern: Option<String>,

    // -- Timeouts ------------------------------------------------------------
    /// Overall wall-clock limit.
    #[arg(short = 't', long, value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    /// Limit on time without any monitored output.
    #[arg(long, value_parser = parse_duration)]
    pub idle_timeout: Option<Duration>,

    /// Limit on time before the first monitored line.
    #[arg(long, value_parser = parse_duration)]
    pub first_output_timeout: Option<Duration>,

    /// Limit on stdout silence once it has produced a line.
    #[arg(long, value_parser = parse_duration)]
    pub stdout_idle_timeout: Option<Duration>,

    /// Limit on stderr silence once it has produced a line.
    #[arg(long, value_parser = parse_duration)]
    pub stderr_idle_timeout: Option<Duration>,

    // -- Delay-exit ----------------------------------------------------------
    /// How long to keep capturing after the match threshold (0 = stop now).
    #[arg(short = 'A', long, value_parser = parse_duration, default_value = "10s")]
    pub delay_exit: Duration,

    /// Maximum lines captured after the match threshold.
    #[arg(long, default_value = "100")]
    pub delay_exit_after_lines: u64,

    /// Lines of before-context kept per descriptor.
    #[arg(short = 'B', long, default_value = "10")]
    pub context: usize,

    // -- Streams -------------------------------------------------------------
    /// Monitor stdout only (stderr is still drained).
    #[arg(long)]
    pub stdout: bool,

    /// Monitor stderr only (stdout is still drained).
    #[arg(long)]
    pub stderr: bool,

    /// Also open and monitor descriptor N >= 3 (repeatable).
    #[arg(long = "fd", value_name = "N")]
    pub fds: Vec<i32>,

    /// Per-descriptor pattern override, N=PATTERN (repeatable).
    #[arg(long = "fd-pattern", value_name = "N=PATTERN")]
    pub fd_patterns: Vec<String>,

    /// Per-descriptor echo label, N=LABEL (repeatable).
    #[arg(long = "fd-label", value_name = "N=LABEL")]
    pub fd_labels: Vec<String>,

    /// Prefix echoed lines with their stream label.
    #[arg(long)]
    pub label: bool,

    // -- Hang detection ------------------------------------------------------
    /// Fire after the same line repeats N times.
    #[arg(long)]
    pub max_repeat: Option<u32>,

    /// Ignore timestamps when comparing repeated lines.
    #[arg(long)]
    pub stuck_ignore_timestamps: bool,

    /// Compare only this regex's capture when detecting repeats.
    #[arg(long)]
    pub stuck_pattern: Option<String>,

    /// Regex extracting a progress value that must keep changing.
    #[arg(long)]
    pub progress_pattern: Option<String>,

    /// Repeats of the same progress value that count as stalled.
    #[arg(long, default_value = "5")]
    pub progress_repeat: u32,

    /// Ordered states, comma separated; moving backwards fires.
    #[arg(long, value_delimiter = ',')]
    pub transition_states: Vec<String>,

    /// Regex whose first capture is the state token.
    #[arg(long)]
    pub transition_pattern: Option<String>,

    /// Share detector state across all descriptors.
    #[arg(long)]
    pub session_detector: bool,

    // -- Detach --------------------------------------------------------------
    /// Leave the child running after the match instead of killing it.
    #[arg(long)]
    pub detach: bool,

    /// Run the child in its own process group.
    #[arg(long)]
    pub detach_group: bool,

    /// Also detach (instead of killing) when a timeout fires.
    #[arg(long)]
    pub detach_on_timeout: bool,

    /// Write the detached child's pid to this file.
    #[arg(long)]
    pub pid_file: Option<PathBuf>,

    // -- Output --------------------------------------------------------------
    /// Prefix echoed lines with their line number.
    #[arg(short = 'n', long)]
    pub line_number: bool,

    /// Highlight matching lines.
    #[arg(long, value_enum, default_value = "auto")]
    pub color: ColorMode,

    /// Print a JSON summary on stdout at exit.
    #[arg(long)]
    pub json: bool,

    /// Do not echo child output.
    #[arg(short = 'q', long)]
    pub quiet: bool,

    // -- Log files -----------------------------------------------------------
    /// Write each monitored descriptor to a log file.
    #[arg(long)]
    pub log: bool,

    /// Log file prefix (implies --log).
    #[arg(long)]
    pub log_prefix: Option<PathBuf>,

    /// Directory for auto-named log files (implies --log).
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    // -- Misc ----------------------------------------------------------------
    /// Force line-buffered child output via stdbuf.
    #[arg(short = 'u', long)]
    pub unbuffered: bool,

    /// Exit 0 when no error was found, 1 when one was (shell convention).
    #[arg(long)]
    pub success_exit_codes: bool,

    /// Time between SIGTERM and SIGKILL.
    #[arg(long, value_parser = parse_duration, default_value = "2s")]
    pub grace_period: Duration,

    /// Append run records to this JSONL file.
    #[arg(long, env = "EARLYEXIT_TELEMETRY_FILE")]
    pub telemetry_file: Option<PathBuf>,

    /// Diagnostic log level.
    #[arg(long, env = "EARLYEXIT_LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Diagnostic log format (text or json).
    #[arg(long, env = "EARLYEXIT_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    // -- Duration overrides (skip from CLI; set in Config::test()) --------
    #[clap(skip)]
    pub poll_ms: Option<u64>,
    #[clap(skip)]
    pub join_timeout_ms: Option<u64>,
}

/// Parse `500ms`, `10s`, `2m`, `1h`, or bare (fractional) seconds.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let split = s.find(|c: char| !(c.is_ascii_digit() || c == '.')).unwrap_or(s.len());
    let (number, unit) = s.split_at(split);
    let value: f64 = number.parse().map_err(|_| format!("invalid duration: {s:?}"))?;
    let scale = match unit {
        "ms" => 0.001,
        "" | "s" => 1.0,
        "m" => 60.0,
        "h" => 3600.0,
        _ => return Err(format!("invalid duration unit in {s:?} (use ms, s, m, or h)")),
    };
    Duration::try_from_secs_f64(value * scale).map_err(|_| format!("invalid duration: {s:?}"))
}

/// Parse an `N=VALUE` descriptor assignment.
pub fn parse_fd_assignment(s: &str) -> anyhow::Result<(i32, String)> {
    let Some((fd, value)) = s.split_once('=') else {
        anyhow::bail!("expected N=VALUE, got {s:?}");
    };
    let fd: i32 = fd.trim().parse().map_err(|_| anyhow::anyhow!("invalid descriptor in {s:?}"))?;
    if fd < 1 {
        anyhow::bail!("invalid descriptor in {s:?}");
    }
    Ok((fd, value.to_owned()))
}

fn env_duration_ms(var: &str, default: u64) -> Duration {
    let ms = std::env::var(var).ok().and_then(|v| v.parse().ok()).unwrap_or(default);
    Duration::from_millis(ms)
}

macro_rules! duration_field {
    ($method:ident, $field:ident, $env:literal, $default:expr) => {
        pub fn $method(&self) -> Duration {
            match self.$field {
                Some(ms) => Duration::from_millis(ms),
                None => env_duration_ms($env, $default),
            }
        }
    };
}

impl Config {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.command.is_empty() {
            anyhow::bail!("no command given (put it after --)");
        }

        let dual = self.success_pattern.is_some() || self.error_pattern.is_some();
        if self.pattern.is_some() && self.error_pattern.is_some() {
            anyhow::bail!("PATTERN cannot be combined with --error-pattern");
        }
        if self.pattern.is_none()
            && !dual
            && self.timeout_policy().is_empty()
            && !self.detectors_requested()
        {
            anyhow::bail!("nothing to watch for: give a PATTERN, a timeout, or a detector");
        }
        if self.max_count == 0 {
            anyhow::bail!("--max-count must be at least 1");
        }

        if !self.detach {
            if self.detach_group {
                anyhow::bail!("--detach-group requires --detach");
            }
            if self.detach_on_timeout {
                anyhow::bail!("--detach-on-timeout requires --detach");
            }
            if self.pid_file.is_some() {
                anyhow::bail!("--pid-file requires --detach");
            }
        }

        let mut seen = BTreeSet::new();
        for &fd in &self.fds {
            if fd < 3 {
                anyhow::bail!("--fd {fd}: custom descriptors must be >= 3");
            }
            if !seen.insert(fd) {
                anyhow::bail!("--fd {fd} given twice");
            }
        }
        for (fd, _) in self.fd_patterns()?.iter().chain(self.fd_labels()?.iter()) {
            if *fd >= 3 && !seen.contains(fd) {
                anyhow::bail!("descriptor {fd} is not opened (add --fd {fd})");
            }
        }

        if self.transition_pattern.is_some() && self.transition_states.is_empty() {
            anyhow::bail!("--transition-pattern requires --transition-states");
        }
        if self.max_repeat == Some(0) {
            anyhow::bail!("--max-repeat must be at least 1");
        }
        if self.progress_repeat == 0 {
            anyhow::bail!("--progress-repeat must be at least 1");
        }
        match self.log_format.as_str() {
            "text" | "json" => {}
            other => anyhow::bail!("invalid log format: {other}"),
        }

        Ok(())
    }

    pub fn detectors_requested(&self) -> bool {
        self.max_repeat.is_some()
            || self.progress_pattern.is_some()
            || !self.transition_states.is_empty()
    }

    pub fn pattern_options(&self) -> PatternOptions {
        PatternOptions {
            ignore_case: self.ignore_case,
            word: self.word_regexp,
            line: self.line_regexp,
            perl: self.perl_regexp,
        }
    }

    pub fn timeout_policy(&self) -> TimeoutPolicy {
        let mut stream_idle = Vec::new();
        if let Some(d) = self.stdout_idle_timeout {
            stream_idle.push((StreamId::Stdout, d));
        }
        if let Some(d) = self.stderr_idle_timeout {
            stream_idle.push((StreamId::Stderr, d));
        }
        TimeoutPolicy {
            overall: self.timeout,
            idle: self.idle_timeout,
            first_output: self.first_output_timeout,
            stream_idle,
        }
    }

    pub fn delay_exit(&self) -> DelayExit {
        DelayExit { duration: self.delay_exit, max_lines: self.delay_exit_after_lines }
    }

    /// Which standard streams are monitored: `(stdout, stderr)`. Neither
    /// flag means both.
    pub fn standard_streams(&self) -> (bool, bool) {
        if !self.stdout && !self.stderr {
            return (true, true);
        }
        (self.stdout, self.stderr)
    }

    pub fn fd_patterns(&self) -> anyhow::Result<Vec<(i32, String)>> {
        self.fd_patterns.iter().map(|s| parse_fd_assignment(s)).collect()
    }

    pub fn fd_labels(&self) -> anyhow::Result<Vec<(i32, String)>> {
        self.fd_labels.iter().map(|s| parse_fd_assignment(s)).collect()
    }

    pub fn exit_convention(&self) -> ExitConvention {
        if self.success_exit_codes {
            ExitConvention::Success
        } else {
            ExitConvention::PatternFound
        }
    }

    /// Whether any log sink should be opened.
    pub fn logging(&self) -> bool {
        self.log || self.log_prefix.is_some() || self.log_dir.is_some()
    }

    // -- Tuning knobs (field override → env var → compiled default) --------

    duration_field!(poll_interval, poll_ms, "EARLYEXIT_POLL_MS", 100);
    duration_field!(join_timeout, join_timeout_ms, "EARLYEXIT_JOIN_TIMEOUT_MS", 1_000);

    /// Build a minimal `Config` for tests (`echo` command, no pattern).
    #[doc(hidden)]
    pub fn test() -> Self {
        Self {
            pattern: None,
            command: vec!["echo".into()],
            ignore_case: false,
            word_regexp: false,
            line_regexp: false,
            invert_match: false,
            max_count: 1,
            perl_regexp: false,
            exclude: vec![],
            success_pattern: None,
            error_pattern: None,
            timeout: None,
            idle_timeout: None,
            first_output_timeout: None,
            stdout_idle_timeout: None,
            stderr_idle_timeout: None,
            delay_exit: Duration::ZERO,
            delay_exit_after_lines: 100,
            context: 10,
            stdout: false,
            stderr: false,
            fds: vec![],
            fd_patterns: vec![],
            fd_labels: vec![],
            label: false,
            max_repeat: None,
            stuck_ignore_timestamps: false,
            stuck_pattern: None,
            progress_pattern: None,
            progress_repeat: 5,
            transition_states: vec![],
            transition_pattern: None,
            session_detector: false,
            detach: false,
            detach_group: false,
            detach_on_timeout: false,
            pid_file: None,
            line_number: false,
            color: ColorMode::Never,
            json: false,
            quiet: true,
            log: false,
            log_prefix: None,
            log_dir: None,
            unbuffered: false,
            success_exit_codes: false,
            grace_period: Duration::from_millis(500),
            telemetry_file: None,
            log_level: "debug".into(),
            log_format: "text".into(),
            poll_ms: Some(10),
            join_timeout_ms: Some(500),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
