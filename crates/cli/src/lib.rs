// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

pub mod config;
pub mod delay;
pub mod detect;
pub mod exit;
pub mod outcome;
pub mod output;
pub mod pattern;
pub mod process;
pub mod ring;
pub mod session;
pub mod state;
pub mod stream;
pub mod telemetry;
pub mod test_support;
pub mod timeout;
