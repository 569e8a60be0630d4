// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session struct and the supervising `tokio::select!` loop.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tokio::io::AsyncRead;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::detect::{DetectorHandle, DetectorScope};
use crate::exit;
use crate::outcome::Outcome;
use crate::process::{self, SpawnSpec, Spawned, Supervisor};
use crate::state::MonitorState;
use crate::stream::{Dispatch, ReaderReport, StreamId, StreamReader};
use crate::telemetry::{self, ExecutionRecord, MatchRecord, NoopRecorder, Recorder};

use super::{Report, SessionConfig};

/// One monitored run of a child command.
pub struct Session {
    config: SessionConfig,
    interrupt: CancellationToken,
    recorder: Arc<dyn Recorder>,
}

/// Tasks started for a spawned child.
struct Running {
    supervisor: Supervisor,
    readers: Vec<JoinHandle<ReaderReport>>,
    readers_stop: CancellationToken,
    timers: Vec<JoinHandle<bool>>,
    timers_stop: CancellationToken,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self { config, interrupt: CancellationToken::new(), recorder: Arc::new(NoopRecorder) }
    }

    /// Cancelling `token` ends the session as `interrupted`.
    pub fn with_interrupt(mut self, token: CancellationToken) -> Self {
        self.interrupt = token;
        self
    }

    pub fn with_recorder(mut self, recorder: Arc<dyn Recorder>) -> Self {
        self.recorder = recorder;
        self
    }

    /// Spawn the child, supervise it until exactly one outcome is committed,
    /// then kill or detach it and report.
    pub async fn run(mut self) -> Report {
        let started = Instant::now();
        let started_ms = telemetry::now_ms();
        let state = Arc::new(MonitorState::new(started));

        let report = match self.start(&state) {
            Ok(running) => self.supervise(&state, running).await,
            Err(e) => {
                warn!("setup failed: {e:#}");
                state.commit(Outcome::CliError);
                self.report(&state, None, None, Vec::new(), Some(format!("{e:#}")))
            }
        };
        self.record(&report, started_ms);
        report
    }

    /// Spawn the child and one task per descriptor and per deadline.
    fn start(&mut self, state: &Arc<MonitorState>) -> anyhow::Result<Running> {
        let cfg = &mut self.config;

        // Detector state is built before spawn so a bad config never
        // leaves an orphaned child.
        let shared = match cfg.detectors.scope {
            DetectorScope::Session if cfg.detectors.is_enabled() => {
                Some(Arc::new(Mutex::new(cfg.detectors.build()?)))
            }
            _ => None,
        };
        let mut handles = Vec::with_capacity(cfg.streams.len());
        for spec in &cfg.streams {
            let handle = if !spec.monitored || !cfg.detectors.is_enabled() {
                DetectorHandle::Disabled
            } else if let Some(ref set) = shared {
                DetectorHandle::Shared(Arc::clone(set))
            } else {
                DetectorHandle::Owned(cfg.detectors.build()?)
            };
            handles.push(handle);
        }

        let spawn_spec = SpawnSpec {
            command: cfg.command.clone(),
            custom_fds: cfg
                .streams
                .iter()
                .filter_map(|s| match s.id {
                    StreamId::Fd(n) => Some(n),
                    _ => None,
                })
                .collect(),
            group: cfg.group,
            unbuffered: cfg.unbuffered,
            ignore_sigpipe: cfg.detach.is_some(),
        };
        let Spawned { supervisor, stdout, stderr, mut custom } = process::spawn(&spawn_spec)?;

        let dispatch = Dispatch {
            state: Arc::clone(state),
            patterns: Arc::clone(&cfg.patterns),
            printer: cfg.printer,
            delay: cfg.delay,
            max_count: cfg.max_count,
            context: cfg.context,
        };
        let readers_stop = CancellationToken::new();
        let mut stdout = stdout;
        let mut stderr = stderr;
        let mut readers = Vec::with_capacity(cfg.streams.len());
        for (spec, detector) in std::mem::take(&mut cfg.streams).into_iter().zip(handles) {
            let source = match spec.id {
                StreamId::Stdout => stdout.take().map(boxed),
                StreamId::Stderr => stderr.take().map(boxed),
                StreamId::Fd(n) => {
                    custom.iter().position(|(fd, _)| *fd == n).map(|i| boxed(custom.swap_remove(i).1))
                }
            };
            let Some(source) = source else {
                warn!("no pipe for {}", spec.id);
                continue;
            };
            let reader = StreamReader::new(spec, source, dispatch.clone(), detector);
            readers.push(tokio::spawn(reader.run(readers_stop.clone())));
        }

        let timers_stop = CancellationToken::new();
        let timers = cfg
            .timeouts
            .comparators()
            .into_iter()
            .map(|c| tokio::spawn(c.watch(Arc::clone(state), cfg.poll, timers_stop.clone())))
            .collect();

        Ok(Running { supervisor, readers, readers_stop, timers, timers_stop })
    }

    async fn supervise(&self, state: &Arc<MonitorState>, mut running: Running) -> Report {
        let cfg = &self.config;
        let mut tick = tokio::time::interval(cfg.poll);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut child_exited_at: Option<Instant> = None;

        let decided = loop {
            tokio::select! {
                _ = self.interrupt.cancelled() => break Outcome::Interrupted,
                _ = state.wake.notified() => {}
                _ = tick.tick() => {}
            }
            let now = Instant::now();

            if let Some(event) = state.trigger() {
                break Outcome::Stuck(event.trigger.kind);
            }
            if let Some(kind) = state.matched_kind() {
                // The delay-exit window governs; timeouts no longer apply.
                if state.window_closed(&cfg.delay, now) || state.readers_done() {
                    break Outcome::Matched(kind);
                }
                continue;
            }
            if let Some(reason) = state.timeout() {
                break Outcome::Timeout(reason);
            }

            if child_exited_at.is_none() {
                let exited = match running.supervisor.try_wait() {
                    Ok(status) => status.is_some(),
                    Err(e) => {
                        warn!("{e:#}");
                        true
                    }
                };
                if exited {
                    child_exited_at = Some(now);
                }
            }
            if let Some(at) = child_exited_at {
                // A grandchild may hold a pipe open after the child exits.
                if state.readers_done() || now.saturating_duration_since(at) >= cfg.join_timeout {
                    break Outcome::NoMatch;
                }
            }
        };

        let outcome = match (decided, cfg.detach.as_ref()) {
            (Outcome::Matched(_), Some(_)) => Outcome::Detached,
            (Outcome::Timeout(_), Some(policy)) if policy.on_timeout => Outcome::Detached,
            (other, _) => other,
        };
        if !state.commit(outcome) {
            debug!("outcome already committed");
        }
        let outcome = state.outcome().unwrap_or(outcome);
        debug!(%outcome, "session decided");
        running.timers_stop.cancel();

        let mut child_status = None;
        match outcome {
            Outcome::Detached => {
                let pid_file = cfg.detach.as_ref().and_then(|d| d.pid_file.as_deref());
                if let Err(e) = running.supervisor.detach(pid_file) {
                    warn!("{e:#}");
                }
            }
            Outcome::NoMatch => {
                child_status = running.supervisor.status();
            }
            _ => {
                let result = if cfg.group {
                    running.supervisor.terminate_group(cfg.grace).await
                } else {
                    running.supervisor.terminate(cfg.grace).await
                };
                match result {
                    Ok(status) => child_status = status,
                    Err(e) => warn!("failed to terminate child: {e:#}"),
                }
            }
        }

        running.readers_stop.cancel();
        let mut reports = Vec::with_capacity(running.readers.len());
        for handle in running.readers {
            if let Some(report) = join_bounded(handle, cfg.join_timeout).await {
                reports.push(report);
            }
        }
        for handle in running.timers {
            let _ = join_bounded(handle, cfg.join_timeout).await;
        }

        let pid = running.supervisor.pid();
        self.report(state, Some(pid), child_status, reports, None)
    }

    fn report(
        &self,
        state: &MonitorState,
        child_pid: Option<u32>,
        child_status: Option<process::ExitStatus>,
        readers: Vec<ReaderReport>,
        error: Option<String>,
    ) -> Report {
        let outcome = state.outcome().unwrap_or(Outcome::CliError);
        let trigger = match outcome {
            Outcome::Stuck(_) => state.trigger(),
            _ => None,
        };
        Report {
            outcome,
            exit_code: exit::resolve(outcome, self.config.convention),
            classification: state.classification(),
            match_count: state.match_count(),
            first_match: state.first_match(),
            trigger,
            captured_lines: state.captured_lines(),
            stream_lines: readers.iter().map(|r| (r.id, r.lines)).collect(),
            duration: state.started_at().elapsed(),
            child_pid,
            child_status,
            log_files: readers.into_iter().filter_map(|r| r.log_path).collect(),
            error,
        }
    }

    /// Hand the run to the telemetry collaborator. Never fails.
    fn record(&self, report: &Report, started_ms: u64) {
        let cfg = &self.config;
        if let Some(ref m) = report.first_match {
            self.recorder.record_match(&MatchRecord {
                command: cfg.command.clone(),
                pattern: cfg.pattern_source.clone(),
                stream: m.stream.to_string(),
                line_number: m.line_number,
                line: m.line.clone(),
                context: m.context.clone(),
                classification: m.kind.classification(),
                timestamp_ms: telemetry::now_ms(),
            });
        }
        let stream_lines: BTreeMap<String, u64> =
            report.stream_lines.iter().map(|(id, n)| (id.to_string(), *n)).collect();
        self.recorder.record_execution(&ExecutionRecord {
            command: cfg.command.clone(),
            pattern: cfg.pattern_source.clone(),
            started_ms,
            ended_ms: telemetry::now_ms(),
            outcome: report.outcome.to_string(),
            exit_code: report.exit_code,
            classification: report.classification,
            match_count: report.match_count,
            stream_lines,
            child_exit_code: report.child_status.and_then(|s| s.code),
        });
    }
}

/// Join a task, aborting it if it outlives `limit`.
async fn join_bounded<T>(mut handle: JoinHandle<T>, limit: std::time::Duration) -> Option<T> {
    match tokio::time::timeout(limit, &mut handle).await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            warn!("task failed: {e}");
            None
        }
        Err(_) => {
            debug!("task did not finish within {limit:?}; aborting");
            handle.abort();
            None
        }
    }
}

fn boxed<R: AsyncRead + Send + Unpin + 'static>(reader: R) -> Box<dyn AsyncRead + Send + Unpin> {
    Box::new(reader)
}
