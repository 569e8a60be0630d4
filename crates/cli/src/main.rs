// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use clap::error::ErrorKind;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use earlyexit::config::Config;
use earlyexit::exit;
use earlyexit::output::{self, Summary};
use earlyexit::session::{Session, SessionConfig};
use earlyexit::telemetry::{JsonlRecorder, NoopRecorder, Recorder};

#[tokio::main]
async fn main() {
    let config = match Config::try_parse() {
        Ok(config) => config,
        Err(e) => {
            let _ = e.print();
            // clap's own exit code 2 would read as a timeout.
            match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => std::process::exit(0),
                _ => std::process::exit(exit::CLI_ERROR),
            }
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("earlyexit: error: {e:#}");
        std::process::exit(exit::CLI_ERROR);
    }

    init_tracing(&config);
    // Our own detection already decided; stop `colored` second-guessing a pipe.
    if config.color.enabled() {
        colored::control::set_override(true);
    }

    let session_config = match SessionConfig::from_config(&config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("earlyexit: error: {e:#}");
            std::process::exit(exit::CLI_ERROR);
        }
    };

    let interrupt = CancellationToken::new();
    spawn_signal_handler(interrupt.clone());

    let recorder: Arc<dyn Recorder> = match config.telemetry_file {
        Some(ref path) => Arc::new(JsonlRecorder::new(path)),
        None => Arc::new(NoopRecorder),
    };

    let report =
        Session::new(session_config).with_interrupt(interrupt).with_recorder(recorder).run().await;
    debug!(outcome = %report.outcome, code = report.exit_code, "session finished");

    if let Some(line) = output::diagnostic(&report) {
        eprintln!("{line}");
    }
    if config.json {
        match Summary::new(&report).to_json() {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("earlyexit: failed to encode summary: {e:#}"),
        }
    }
    std::process::exit(report.exit_code);
}

fn init_tracing(config: &Config) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));

    // Child stdout is echoed on our stdout; diagnostics stay on stderr.
    match config.log_format.as_str() {
        "json" => {
            fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).json().init();
        }
        _ => {
            fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
        }
    }
}

/// First SIGINT or SIGTERM ends the session as `interrupted`.
fn spawn_signal_handler(interrupt: CancellationToken) {
    tokio::spawn(async move {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).ok();
        let mut sigint =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt()).ok();

        tokio::select! {
            _ = async {
                if let Some(ref mut s) = sigterm { s.recv().await } else { std::future::pending().await }
            } => {
                info!("received SIGTERM");
                interrupt.cancel();
            }
            _ = async {
                if let Some(ref mut s) = sigint { s.recv().await } else { std::future::pending().await }
            } => {
                info!("received SIGINT");
                interrupt.cancel();
            }
        }
    });
}
