// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

/// Incremental newline splitter with lossy UTF-8 decoding.
///
/// Partial lines are buffered until the next `\n`; a trailing `\r` is
/// dropped so CRLF output compares equal to LF output.
#[derive(Debug, Default)]
pub struct LineDecoder {
    line_buf: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of raw bytes and return every completed line.
    pub fn feed(&mut self, data: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in data {
            if byte == b'\n' {
                lines.push(self.take_line());
            } else {
                self.line_buf.push(byte);
            }
        }
        lines
    }

    /// Flush a final unterminated line at EOF.
    pub fn finish(&mut self) -> Option<String> {
        if self.line_buf.is_empty() {
            return None;
        }
        Some(self.take_line())
    }

    fn take_line(&mut self) -> String {
        if self.line_buf.last() == Some(&b'\r') {
            self.line_buf.pop();
        }
        let line = String::from_utf8_lossy(&self.line_buf).into_owned();
        self.line_buf.clear();
        line
    }
}

#[cfg(test)]
#[path = "lines_tests.rs"]
mod tests;
