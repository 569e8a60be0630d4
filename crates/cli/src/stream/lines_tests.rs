// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::LineDecoder;

#[test]
fn splits_complete_lines() {
    let mut decoder = LineDecoder::new();
    assert_eq!(decoder.feed(b"one\ntwo\n"), vec!["one", "two"]);
    assert_eq!(decoder.finish(), None);
}

#[test]
fn buffers_partial_lines() {
    let mut decoder = LineDecoder::new();
    assert!(decoder.feed(b"hal").is_empty());
    assert_eq!(decoder.feed(b"f\nnext"), vec!["half"]);
    assert_eq!(decoder.finish(), Some("next".to_owned()));
}

#[test]
fn strips_carriage_return() {
    let mut decoder = LineDecoder::new();
    assert_eq!(decoder.feed(b"dos line\r\n"), vec!["dos line"]);
}

#[test]
fn keeps_empty_lines() {
    let mut decoder = LineDecoder::new();
    assert_eq!(decoder.feed(b"\n\nx\n"), vec!["", "", "x"]);
}

#[test]
fn invalid_utf8_is_replaced() {
    let mut decoder = LineDecoder::new();
    let lines = decoder.feed(b"bad \xff byte\n");
    assert_eq!(lines, vec!["bad \u{FFFD} byte"]);
}

#[test]
fn multibyte_split_across_chunks_is_preserved() {
    let mut decoder = LineDecoder::new();
    let snowman = "☃".as_bytes();
    assert!(decoder.feed(&snowman[..1]).is_empty());
    assert_eq!(decoder.feed(&[&snowman[1..], b"\n"].concat()), vec!["☃"]);
}
