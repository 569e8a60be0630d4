// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use clap::Parser;

use super::{parse_duration, parse_fd_assignment, Config};
use crate::exit::ExitConvention;
use crate::stream::StreamId;

fn parse(args: &[&str]) -> Config {
    Config::parse_from(args)
}

#[test]
fn pattern_and_command() -> anyhow::Result<()> {
    let config = parse(&["earlyexit", "-i", "ERROR", "--", "make", "-j4"]);
    config.validate()?;
    assert_eq!(config.pattern.as_deref(), Some("ERROR"));
    assert_eq!(config.command, vec!["make", "-j4"]);
    assert!(config.pattern_options().ignore_case);
    assert_eq!(config.max_count, 1);
    assert_eq!(config.delay_exit, Duration::from_secs(10));
    assert_eq!(config.delay_exit_after_lines, 100);
    assert_eq!(config.context, 10);
    assert_eq!(config.grace_period, Duration::from_secs(2));
    Ok(())
}

#[test]
fn timeout_alone_is_enough() -> anyhow::Result<()> {
    let config = parse(&["earlyexit", "--idle-timeout", "2s", "--", "sleep", "5"]);
    config.validate()?;
    assert_eq!(config.pattern, None);
    assert_eq!(config.timeout_policy().idle, Some(Duration::from_secs(2)));
    Ok(())
}

#[test]
fn stream_idle_limits_map_to_streams() {
    let config = parse(&[
        "earlyexit",
        "--stderr-idle-timeout",
        "500ms",
        "--stdout-idle-timeout",
        "1",
        "x",
        "--",
        "true",
    ]);
    assert_eq!(
        config.timeout_policy().stream_idle,
        vec![
            (StreamId::Stdout, Duration::from_secs(1)),
            (StreamId::Stderr, Duration::from_millis(500)),
        ]
    );
}

#[yare::parameterized(
    no_command       = { &["earlyexit", "ERROR"], "no command" },
    nothing_to_watch = { &["earlyexit", "--", "true"], "nothing to watch" },
    pattern_and_err  = { &["earlyexit", "x", "--error-pattern", "y", "--", "true"],
                         "cannot be combined" },
    group_no_detach  = { &["earlyexit", "x", "--detach-group", "--", "true"], "requires --detach" },
    pid_no_detach    = { &["earlyexit", "x", "--pid-file", "/tmp/p", "--", "true"],
                         "requires --detach" },
    on_timeout       = { &["earlyexit", "x", "--detach-on-timeout", "--", "true"],
                         "requires --detach" },
    low_fd           = { &["earlyexit", "x", "--fd", "2", "--", "true"], ">= 3" },
    dup_fd           = { &["earlyexit", "x", "--fd", "3", "--fd", "3", "--", "true"], "twice" },
    fd_not_opened    = { &["earlyexit", "x", "--fd-pattern", "4=y", "--", "true"], "--fd 4" },
    bad_assignment   = { &["earlyexit", "x", "--fd-label", "three", "--", "true"], "N=VALUE" },
    orphan_extractor = { &["earlyexit", "x", "--transition-pattern", "(\\w+)", "--", "true"],
                         "--transition-states" },
    zero_max_count   = { &["earlyexit", "x", "-m", "0", "--", "true"], "--max-count" },
    zero_max_repeat  = { &["earlyexit", "--max-repeat", "0", "--", "true"], "--max-repeat" },
    zero_progress    = { &["earlyexit", "x", "--progress-repeat", "0", "--", "true"],
                         "--progress-repeat" },
    bad_log_format   = { &["earlyexit", "x", "--log-format", "xml", "--", "true"], "log format" },
)]
fn invalid_config(args: &[&str], expected_substr: &str) {
    let config = parse(args);
    crate::assert_err_contains!(config.validate(), expected_substr);
}

#[test]
fn detectors_and_dual_patterns_count_as_watch_targets() -> anyhow::Result<()> {
    parse(&["earlyexit", "--max-repeat", "3", "--", "true"]).validate()?;
    parse(&["earlyexit", "--success-pattern", "OK", "--", "true"]).validate()?;
    parse(&["earlyexit", "--transition-states", "a,b,c", "--", "true"]).validate()?;
    Ok(())
}

#[test]
fn transition_states_split_on_commas() {
    let config = parse(&["earlyexit", "--transition-states", "init,build,test", "--", "true"]);
    assert_eq!(config.transition_states, vec!["init", "build", "test"]);
}

#[yare::parameterized(
    neither     = { &["earlyexit", "x", "--", "true"], (true, true) },
    stdout_only = { &["earlyexit", "--stdout", "x", "--", "true"], (true, false) },
    stderr_only = { &["earlyexit", "--stderr", "x", "--", "true"], (false, true) },
    both        = { &["earlyexit", "--stdout", "--stderr", "x", "--", "true"], (true, true) },
)]
fn standard_stream_selection(args: &[&str], expected: (bool, bool)) {
    assert_eq!(parse(args).standard_streams(), expected);
}

#[test]
fn success_exit_codes_flag() {
    assert_eq!(parse(&["earlyexit", "x", "--", "true"]).exit_convention(), ExitConvention::PatternFound);
    assert_eq!(
        parse(&["earlyexit", "--success-exit-codes", "x", "--", "true"]).exit_convention(),
        ExitConvention::Success
    );
}

#[yare::parameterized(
    millis     = { "500ms", Duration::from_millis(500) },
    seconds    = { "10s", Duration::from_secs(10) },
    minutes    = { "2m", Duration::from_secs(120) },
    hours      = { "1h", Duration::from_secs(3600) },
    bare       = { "30", Duration::from_secs(30) },
    fractional = { "1.5", Duration::from_millis(1500) },
    zero       = { "0", Duration::ZERO },
)]
fn durations(input: &str, expected: Duration) {
    assert_eq!(parse_duration(input), Ok(expected));
}

#[yare::parameterized(
    empty    = { "" },
    unit     = { "5d" },
    negative = { "-1s" },
    garbage  = { "soon" },
)]
fn invalid_durations(input: &str) {
    assert!(parse_duration(input).is_err());
}

#[test]
fn invalid_duration_rejected_by_parser() {
    assert!(Config::try_parse_from(["earlyexit", "-t", "forever", "x", "--", "true"]).is_err());
}

#[test]
fn fd_assignment_keeps_equals_in_value() -> anyhow::Result<()> {
    assert_eq!(parse_fd_assignment("3=a=b")?, (3, "a=b".to_owned()));
    assert!(parse_fd_assignment("0=x").is_err());
    assert!(parse_fd_assignment("x=y").is_err());
    Ok(())
}

#[test]
fn logging_implied_by_prefix_or_dir() {
    assert!(!parse(&["earlyexit", "x", "--", "true"]).logging());
    assert!(parse(&["earlyexit", "--log-prefix", "/tmp/run", "x", "--", "true"]).logging());
    assert!(parse(&["earlyexit", "--log-dir", "/tmp", "x", "--", "true"]).logging());
}

#[test]
fn tuning_knob_field_override() {
    let config = Config::test();
    assert_eq!(config.poll_interval(), Duration::from_millis(10));
    assert_eq!(config.join_timeout(), Duration::from_millis(500));
}

#[test]
fn test_config_is_valid_once_given_a_pattern() -> anyhow::Result<()> {
    let mut config = Config::test();
    config.pattern = Some("x".into());
    config.validate()?;
    Ok(())
}

#[test]
#[serial_test::serial]
fn tuning_knob_env_fallback() {
    let mut config = Config::test();
    config.poll_ms = None;
    std::env::set_var("EARLYEXIT_POLL_MS", "25");
    assert_eq!(config.poll_interval(), Duration::from_millis(25));
    std::env::set_var("EARLYEXIT_POLL_MS", "soon");
    assert_eq!(config.poll_interval(), Duration::from_millis(100));
    std::env::remove_var("EARLYEXIT_POLL_MS");
}
