// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{LineDecoder, LogSink, StreamId, StreamSpec};
use crate::delay::{Admit, DelayExit};
use crate::detect::DetectorHandle;
use crate::output::Printer;
use crate::pattern::{CompiledPattern, LineClass, PatternSet};
use crate::ring::LineRing;
use crate::state::{MatchInfo, MonitorState, StuckEvent};

/// Session-wide pieces every reader needs.
#[derive(Clone)]
pub struct Dispatch {
    pub state: Arc<MonitorState>,
    pub patterns: Arc<PatternSet>,
    pub printer: Printer,
    pub delay: DelayExit,
    pub max_count: u64,
    pub context: usize,
}

/// What a reader saw by the time it returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderReport {
    pub id: StreamId,
    pub lines: u64,
    pub log_path: Option<PathBuf>,
    /// True when the reader hit EOF rather than stopping early.
    pub eof: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// Reads one descriptor to EOF, feeding each line through logging, echo,
/// classification, and the hang detectors.
///
/// Readers only publish into [`MonitorState`]; the supervising loop decides
/// termination.
pub struct StreamReader {
    id: StreamId,
    monitored: bool,
    label: String,
    pattern: Option<CompiledPattern>,
    source: Box<dyn AsyncRead + Send + Unpin>,
    dispatch: Dispatch,
    ring: LineRing,
    sink: Option<LogSink>,
    detector: DetectorHandle,
    lines: u64,
}

impl StreamReader {
    /// Build a reader and register it as active with the session state so
    /// the supervisor never observes "all readers done" before it starts.
    pub fn new(
        spec: StreamSpec,
        source: Box<dyn AsyncRead + Send + Unpin>,
        dispatch: Dispatch,
        detector: DetectorHandle,
    ) -> Self {
        let sink = spec.log_path.as_deref().and_then(LogSink::open);
        dispatch.state.reader_started();
        Self {
            id: spec.id,
            monitored: spec.monitored,
            label: spec.label,
            pattern: spec.pattern,
            source,
            ring: LineRing::new(dispatch.context),
            dispatch,
            sink,
            detector,
            lines: 0,
        }
    }

    pub async fn run(mut self, shutdown: CancellationToken) -> ReaderReport {
        let mut buf = vec![0u8; 8192];
        let mut decoder = LineDecoder::new();
        let mut eof = false;

        'read: loop {
            let n = tokio::select! {
                _ = shutdown.cancelled() => break,
                result = self.source.read(&mut buf) => match result {
                    Ok(0) => {
                        eof = true;
                        break;
                    }
                    Ok(n) => n,
                    Err(e) => {
                        debug!("{} read error: {e}", self.id);
                        eof = true;
                        break;
                    }
                },
            };
            for line in decoder.feed(&buf[..n]) {
                if self.handle_line(line) == Flow::Stop {
                    break 'read;
                }
            }
        }

        if eof {
            if let Some(line) = decoder.finish() {
                self.handle_line(line);
            }
        }

        debug!("{} reader done: {} lines, eof={eof}", self.id, self.lines);
        self.dispatch.state.reader_finished();
        ReaderReport {
            id: self.id,
            lines: self.lines,
            log_path: self.sink.as_ref().map(|s| s.path().to_owned()),
            eof,
        }
    }

    fn handle_line(&mut self, line: String) -> Flow {
        let now = Instant::now();
        let state = Arc::clone(&self.dispatch.state);
        if state.is_terminal() {
            return Flow::Stop;
        }

        // Post-match lines are captured context, never new matches.
        let capturing = if self.monitored {
            match state.admit_line(&self.dispatch.delay, now) {
                Some(Admit::Closed) => {
                    state.wake.notify_one();
                    return Flow::Stop;
                }
                Some(Admit::Captured) => true,
                None => false,
            }
        } else {
            if state.window_closed(&self.dispatch.delay, now) {
                return Flow::Stop;
            }
            state.window_open()
        };

        self.lines += 1;
        let line_number = self.lines;
        if self.monitored {
            state.record_output(self.id, now);
        }
        if let Some(ref mut sink) = self.sink {
            sink.write_line(&line);
        }

        let class = if self.monitored && !capturing {
            self.dispatch.patterns.classify(&line, self.pattern.as_ref())
        } else {
            LineClass::NoMatch
        };
        let matched = match class {
            LineClass::Match(kind) => Some(kind),
            LineClass::Excluded | LineClass::NoMatch => None,
        };
        self.dispatch.printer.echo(self.id, &self.label, line_number, &line, matched);

        if let Some(kind) = matched {
            let info = MatchInfo {
                kind,
                stream: self.id,
                line_number,
                line: line.clone(),
                context: self.ring.snapshot(),
            };
            if state.record_match(info, self.dispatch.max_count, now) {
                debug!("{} match threshold reached at line {line_number}", self.id);
                state.wake.notify_one();
            }
        }

        if !self.monitored || class == LineClass::Excluded {
            return Flow::Continue;
        }
        self.ring.push(&line);

        if let Some(trigger) = self.detector.observe(&line) {
            debug!("{} detector fired: {}", self.id, trigger.detail);
            if state.record_trigger(StuckEvent { trigger, stream: self.id, line }) {
                state.wake.notify_one();
            }
        }
        Flow::Continue
    }
}

#[cfg(test)]
#[path = "reader_tests.rs"]
mod tests;
