// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use tokio::sync::mpsc;

use super::*;

async fn drive(input: &[u8]) -> Vec<FrameResult> {
    let (tx, mut rx) = mpsc::channel(64);
    run_framer(input, tx).await;
    let mut out = Vec::new();
    while let Ok(item) = rx.try_recv() {
        out.push(item);
    }
    out
}

#[tokio::test]
async fn decodes_well_formed_lines_in_order() {
    let input = b"{\"type\":\"a\"}\n{\"type\":\"b\",\"id\":\"1\"}\n";
    let out = drive(input).await;
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].as_ref().unwrap().kind, "a");
    assert_eq!(out[1].as_ref().unwrap().id.as_deref(), Some("1"));
}

#[tokio::test]
async fn malformed_line_emits_error_and_framing_continues() {
    let input = b"not json\n{\"type\":\"ok\"}\n";
    let out = drive(input).await;
    assert_eq!(out.len(), 2);
    assert!(matches!(out[0], Err(FramerError::InvalidJson(_))));
    assert_eq!(out[1].as_ref().unwrap().kind, "ok");
}

#[tokio::test]
async fn trailing_bytes_without_newline_are_discarded() {
    let input = b"{\"type\":\"ok\"}\n{\"type\":\"partial\"";
    let out = drive(input).await;
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].as_ref().unwrap().kind, "ok");
}

#[tokio::test]
async fn oversized_line_is_rejected_not_truncated() {
    let mut input = vec![b'"'];
    input.extend(std::iter::repeat(b'x').take(MAX_RECORD_SIZE + 10));
    input.push(b'"');
    input.push(b'\n');
    input.extend_from_slice(b"{\"type\":\"after\"}\n");

    let out = drive(&input).await;
    assert_eq!(out.len(), 2);
    assert!(matches!(out[0], Err(FramerError::TooLarge)));
    assert_eq!(out[1].as_ref().unwrap().kind, "after");
}

#[tokio::test]
async fn blank_lines_are_skipped() {
    let input = b"\n\n{\"type\":\"ok\"}\n\n";
    let out = drive(input).await;
    assert_eq!(out.len(), 1);
}
