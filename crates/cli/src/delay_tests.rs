// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::{Duration, Instant};

use super::*;

#[test]
fn zero_duration_closes_immediately() {
    let policy = DelayExit { duration: Duration::ZERO, max_lines: 100 };
    let now = Instant::now();
    let mut window = CaptureWindow::open(now);
    assert!(window.is_closed(&policy, now));
    assert_eq!(window.admit(&policy, now), Admit::Closed);
    assert_eq!(window.captured(), 0);
}

#[test]
fn line_budget_closes_window() {
    let policy = DelayExit { duration: Duration::from_secs(60), max_lines: 2 };
    let now = Instant::now();
    let mut window = CaptureWindow::open(now);
    assert_eq!(window.admit(&policy, now), Admit::Captured);
    assert_eq!(window.admit(&policy, now), Admit::Captured);
    assert!(window.is_closed(&policy, now));
    assert_eq!(window.admit(&policy, now), Admit::Closed);
    assert_eq!(window.captured(), 2);
}

#[test]
fn duration_bound_closes_window() {
    let policy = DelayExit { duration: Duration::from_millis(500), max_lines: 100 };
    let start = Instant::now();
    let mut window = CaptureWindow::open(start);
    assert_eq!(window.admit(&policy, start + Duration::from_millis(100)), Admit::Captured);
    assert!(!window.is_closed(&policy, start + Duration::from_millis(499)));
    assert_eq!(window.admit(&policy, start + Duration::from_millis(500)), Admit::Closed);
}

#[test]
fn closed_window_never_reopens() {
    let policy = DelayExit { duration: Duration::from_millis(500), max_lines: 100 };
    let start = Instant::now();
    let mut window = CaptureWindow::open(start);
    assert_eq!(window.admit(&policy, start + Duration::from_secs(1)), Admit::Closed);
    // A clock reading from before the deadline does not reopen it.
    assert_eq!(window.admit(&policy, start), Admit::Closed);
    assert!(window.is_closed(&policy, start));
}

#[test]
fn zero_line_budget_captures_nothing() {
    let policy = DelayExit { duration: Duration::from_secs(10), max_lines: 0 };
    let now = Instant::now();
    let mut window = CaptureWindow::open(now);
    assert_eq!(window.admit(&policy, now), Admit::Closed);
}
