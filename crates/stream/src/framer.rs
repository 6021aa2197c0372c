// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Splits a byte stream into line-delimited JSON [`Frame`]s (§4.A).

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, BufReader};
use tokio::sync::mpsc;

/// Maximum size of a single record, in bytes, before it is rejected.
pub const MAX_RECORD_SIZE: usize = 1024 * 1024;

/// A single JSON record with at minimum `{type, id?, payload}` (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "reply-to")]
    pub reply_to: Option<String>,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Errors raised by the framer on a malformed or oversized line.
#[derive(Debug, Error, Clone)]
pub enum FramerError {
    #[error("record exceeds {MAX_RECORD_SIZE} bytes")]
    TooLarge,
    #[error("invalid JSON: {0}")]
    InvalidJson(String),
    #[error("underlying read failed: {0}")]
    Io(String),
}

/// One decode outcome per newline-terminated segment.
pub type FrameResult = Result<Frame, FramerError>;

/// Drives a byte stream, decoding each `\n`-terminated segment as JSON and
/// sending the outcome (success or a typed framing error) on `out`.
///
/// No re-synchronization state persists across frames: a decode failure on
/// one line never affects the next. Trailing bytes with no terminating
/// newline are discarded at end-of-stream, per §4.A.
pub async fn run_framer<R>(reader: R, out: mpsc::Sender<FrameResult>)
where
    R: AsyncRead + Unpin,
{
    const CHUNK: usize = 8 * 1024;

    let mut reader = BufReader::with_capacity(CHUNK, reader);
    let mut line = Vec::new();
    let mut oversized = false;

    loop {
        let mut chunk = [0u8; CHUNK];
        let n = match tokio::io::AsyncReadExt::read(&mut reader, &mut chunk).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                let _ = out.send(Err(FramerError::Io(e.to_string()))).await;
                break;
            }
        };

        for &byte in &chunk[..n] {
            if byte == b'\n' {
                if oversized {
                    oversized = false;
                    line.clear();
                    if out.send(Err(FramerError::TooLarge)).await.is_err() {
                        return;
                    }
                    continue;
                }
                if !line.is_empty() {
                    let result = decode_line(&line);
                    line.clear();
                    if out.send(result).await.is_err() {
                        return;
                    }
                }
                continue;
            }

            if oversized {
                continue; // discard bytes of an already-oversized line
            }
            line.push(byte);
            if line.len() > MAX_RECORD_SIZE {
                oversized = true;
                line.clear();
            }
        }
    }
    // Trailing bytes with no terminating newline are discarded at EOF (§4.A).
}

fn decode_line(line: &[u8]) -> FrameResult {
    if line.len() > MAX_RECORD_SIZE {
        return Err(FramerError::TooLarge);
    }
    serde_json::from_slice::<Frame>(line).map_err(|e| FramerError::InvalidJson(e.to_string()))
}

#[cfg(test)]
#[path = "framer_tests.rs"]
mod tests;
