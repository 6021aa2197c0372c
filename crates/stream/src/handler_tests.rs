// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashSet;
use std::time::Duration;

use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};

use super::*;

#[tokio::test]
async fn subscriber_receives_stdout_frames() {
    let (client_stdin, mut worker_stdin) = duplex(4096);
    let (mut worker_stdout, client_stdout) = duplex(4096);
    let (_worker_stderr_w, client_stderr) = duplex(4096);

    let handler = StreamHandler::start(client_stdout, client_stderr, client_stdin, 4096);
    let sub = handler.subscribe("c1", HashSet::new(), SlowPolicy::DropOldest);

    worker_stdout.write_all(b"{\"type\":\"out\",\"payload\":{\"x\":1}}\n").await.unwrap();
    let frame = tokio::time::timeout(Duration::from_secs(2), sub.recv()).await.unwrap().unwrap();
    assert_eq!(frame.kind, "out");

    handler.close().await;
    let _ = worker_stdin.shutdown().await;
}

#[tokio::test]
async fn send_assigns_id_when_missing_and_writes_a_json_line() {
    let (client_stdin, mut worker_stdin_read) = duplex(4096);
    let (worker_stdout_w, client_stdout) = duplex(4096);
    let (_worker_stderr_w, client_stderr) = duplex(4096);
    drop(worker_stdout_w);

    let handler = StreamHandler::start(client_stdout, client_stderr, client_stdin, 4096);
    let frame = Frame { kind: "send".into(), id: None, reply_to: None, payload: serde_json::json!({"text": "hi"}) };
    let id = handler.send(frame, Duration::from_secs(1)).await.unwrap();
    assert!(!id.is_empty());

    let mut buf = vec![0u8; 256];
    let n = tokio::time::timeout(Duration::from_secs(1), worker_stdin_read.read(&mut buf)).await.unwrap().unwrap();
    let text = String::from_utf8_lossy(&buf[..n]);
    assert!(text.contains("\"id\":"));
    assert!(text.ends_with('\n'));

    handler.close().await;
}

#[tokio::test]
async fn receive_correlates_by_reply_to() {
    let (client_stdin, _worker_stdin_read) = duplex(4096);
    let (mut worker_stdout, client_stdout) = duplex(4096);
    let (_worker_stderr_w, client_stderr) = duplex(4096);

    let handler = StreamHandler::start(client_stdout, client_stderr, client_stdin, 4096);

    let recv_fut = handler.receive(Duration::from_secs(2), Some("req-1"));
    worker_stdout
        .write_all(b"{\"type\":\"reply\",\"reply-to\":\"req-1\",\"payload\":{}}\n")
        .await
        .unwrap();

    let frame = recv_fut.await.unwrap();
    assert_eq!(frame.reply_to.as_deref(), Some("req-1"));

    handler.close().await;
}

#[tokio::test]
async fn receive_times_out_without_a_matching_reply() {
    let (client_stdin, _worker_stdin_read) = duplex(4096);
    let (_worker_stdout_w, client_stdout) = duplex(4096);
    let (_worker_stderr_w, client_stderr) = duplex(4096);

    let handler = StreamHandler::start(client_stdout, client_stderr, client_stdin, 4096);
    let result = handler.receive(Duration::from_millis(50), Some("never-arrives")).await;
    assert!(matches!(result, Err(StreamHandlerError::ReceiveTimeout)));

    handler.close().await;
}

#[tokio::test]
async fn stderr_bytes_accumulate_in_ring_buffer() {
    let (client_stdin, _worker_stdin_read) = duplex(4096);
    let (_worker_stdout_w, client_stdout) = duplex(4096);
    let (mut worker_stderr, client_stderr) = duplex(4096);

    let handler = StreamHandler::start(client_stdout, client_stderr, client_stdin, 4096);
    worker_stderr.write_all(b"panic: something broke").await.unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(handler.stderr_ring().len() > 0);

    handler.close().await;
}
