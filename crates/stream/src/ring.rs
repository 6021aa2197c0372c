// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded, mutex-guarded byte buffer with oldest-first eviction (§4.B).
//!
//! Used only for opportunistic inspection (stderr capture, diagnostics) —
//! the hot path is the [`crate::handler::StreamHandler`], not this buffer.
//! Never blocks, never fails.

use std::sync::Mutex;

struct Inner {
    buf: Vec<u8>,
    capacity: usize,
    write_pos: usize,
    total_written: u64,
    len: usize,
    overflowed: bool,
}

/// Fixed-capacity circular byte buffer that evicts oldest bytes on overflow.
pub struct RingBuffer {
    inner: Mutex<Inner>,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                buf: vec![0u8; capacity.max(1)],
                capacity: capacity.max(1),
                write_pos: 0,
                total_written: 0,
                len: 0,
                overflowed: false,
            }),
        }
    }

    /// Append data, evicting the oldest bytes to make room if necessary.
    pub fn write(&self, data: &[u8]) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let capacity = inner.capacity;

        for chunk in data.chunks(capacity) {
            let start = inner.write_pos;
            let end = start + chunk.len();

            if end <= capacity {
                inner.buf[start..end].copy_from_slice(chunk);
            } else {
                let first = capacity - start;
                inner.buf[start..capacity].copy_from_slice(&chunk[..first]);
                inner.buf[..chunk.len() - first].copy_from_slice(&chunk[first..]);
            }

            inner.write_pos = end % capacity;
            inner.total_written += chunk.len() as u64;
            let new_len = (inner.len + chunk.len()).min(capacity);
            if inner.len + chunk.len() > capacity {
                inner.overflowed = true;
            }
            inner.len = new_len;
        }
    }

    /// Copy out the currently buffered bytes, oldest first.
    pub fn read(&self) -> Vec<u8> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let capacity = inner.capacity;
        let len = inner.len;
        if len == 0 {
            return Vec::new();
        }
        let start = if inner.write_pos >= len { inner.write_pos - len } else { capacity - (len - inner.write_pos) };

        let mut out = Vec::with_capacity(len);
        if start + len <= capacity {
            out.extend_from_slice(&inner.buf[start..start + len]);
        } else {
            let first = capacity - start;
            out.extend_from_slice(&inner.buf[start..capacity]);
            out.extend_from_slice(&inner.buf[..len - first]);
        }
        out
    }

    /// Current number of readable bytes.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total bytes ever written through this buffer.
    pub fn total_written(&self) -> u64 {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).total_written
    }

    /// `true` once any write has evicted previously-buffered bytes.
    pub fn overflowed(&self) -> bool {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).overflowed
    }
}

#[cfg(test)]
#[path = "ring_tests.rs"]
mod tests;
