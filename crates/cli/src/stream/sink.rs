// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only per-descriptor log files.

use std::fs::File;
use std::io::{LineWriter, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use super::StreamId;

/// Append-only log file owned by exactly one stream reader.
#[derive(Debug)]
pub struct LogSink {
    path: PathBuf,
    writer: LineWriter<File>,
    failed: bool,
}

impl LogSink {
    /// Open (creating or appending) the log file. Failure is logged and
    /// disables logging for this descriptor; it never aborts the run.
    pub fn open(path: &Path) -> Option<Self> {
        let file = match std::fs::OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => file,
            Err(e) => {
                warn!("cannot open log file {}: {e}; logging disabled", path.display());
                return None;
            }
        };
        Some(Self { path: path.to_owned(), writer: LineWriter::new(file), failed: false })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write one raw line. The first write error is logged; later lines are
    /// dropped silently.
    pub fn write_line(&mut self, line: &str) {
        if self.failed {
            return;
        }
        let result = self
            .writer
            .write_all(line.as_bytes())
            .and_then(|()| self.writer.write_all(b"\n"));
        if let Err(e) = result {
            warn!("write to {} failed: {e}; logging disabled", self.path.display());
            self.failed = true;
        }
    }
}

/// Log path for `id` under `prefix`: `.log` for stdout, `.errlog` for
/// stderr, `.fd<N>.log` for custom descriptors.
pub fn log_path(prefix: &Path, id: StreamId) -> PathBuf {
    let suffix = match id {
        StreamId::Stdout => ".log".to_owned(),
        StreamId::Stderr => ".errlog".to_owned(),
        StreamId::Fd(n) => format!(".fd{n}.log"),
    };
    let mut name = prefix.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Derive a log prefix from the command: `<dir>/earlyexit-<program>-<pid>`.
pub fn auto_prefix(dir: &Path, command: &[String], pid: u32) -> PathBuf {
    let program = command
        .first()
        .and_then(|c| Path::new(c).file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "command".to_owned());
    let program: String = program
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    dir.join(format!("earlyexit-{program}-{pid}"))
}

#[cfg(test)]
#[path = "sink_tests.rs"]
mod tests;
