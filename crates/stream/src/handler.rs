// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Binds a worker's stdio to subscribers (§4.J).
//!
//! `StreamHandler` exclusively owns the [`RingBuffer`] and framer for one
//! worker (§3 Ownership). `Send` writes one JSON line to stdin, assigning a
//! fresh id when the caller left one unset; `Receive` awaits the first
//! frame whose `reply-to` matches, or any frame if no id was requested.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex};
use tokio_util::sync::CancellationToken;

use crate::bus::{Event, EventBus};
use crate::framer::{run_framer, Frame, FramerError};
use crate::ring::RingBuffer;
use crate::subscription::{SlowPolicy, Subscriber};

/// Errors surfaced by [`StreamHandler`] operations.
#[derive(Debug, Error)]
pub enum StreamHandlerError {
    #[error("write to stdin timed out")]
    WriteTimeout,
    #[error("stdin write failed: {0}")]
    WriteFailed(String),
    #[error("receive timed out waiting for a reply")]
    ReceiveTimeout,
    #[error("stream handler is closed")]
    Closed,
}

/// Topic names used on the worker's [`EventBus`].
pub const TOPIC_STDOUT: &str = "worker:stdout";
pub const TOPIC_STDERR: &str = "worker:stderr";
pub const TOPIC_FRAMING_ERROR: &str = "worker:framing_error";

struct Pending {
    waiters: HashMap<String, oneshot::Sender<Frame>>,
    any: Vec<oneshot::Sender<Frame>>,
}

/// Connects a Framer, a RingBuffer, and an EventBus to a set of subscribers
/// for one worker's stdio.
pub struct StreamHandler {
    bus: EventBus,
    subscribers: RwLock<HashMap<String, Arc<Subscriber>>>,
    stderr_ring: Arc<RingBuffer>,
    stdin_tx: AsyncMutex<Box<dyn AsyncWrite + Send + Unpin>>,
    pending: Arc<std::sync::Mutex<Pending>>,
    next_id: AtomicU64,
    cancel: CancellationToken,
    tasks: parking_lot::Mutex<Vec<tokio::task::JoinHandle<()>>>,
}

impl StreamHandler {
    /// Start draining `stdout`/`stderr` and take ownership of `stdin`.
    /// Spawns the two reader tasks described in §4.J / §5.
    pub fn start<O, E, I>(stdout: O, stderr: E, stdin: I, stderr_ring_capacity: usize) -> Arc<Self>
    where
        O: AsyncRead + Send + Unpin + 'static,
        E: AsyncRead + Send + Unpin + 'static,
        I: AsyncWrite + Send + Unpin + 'static,
    {
        let handler = Arc::new(Self {
            bus: EventBus::new(),
            subscribers: RwLock::new(HashMap::new()),
            stderr_ring: Arc::new(RingBuffer::new(stderr_ring_capacity)),
            stdin_tx: AsyncMutex::new(Box::new(stdin)),
            pending: Arc::new(std::sync::Mutex::new(Pending { waiters: HashMap::new(), any: Vec::new() })),
            next_id: AtomicU64::new(1),
            cancel: CancellationToken::new(),
            tasks: parking_lot::Mutex::new(Vec::new()),
        });

        let stdout_task = {
            let handler = Arc::clone(&handler);
            tokio::spawn(async move { handler.drain_stdout(stdout).await })
        };
        let stderr_task = {
            let handler = Arc::clone(&handler);
            tokio::spawn(async move { handler.drain_stderr(stderr).await })
        };
        handler.tasks.lock().extend([stdout_task, stderr_task]);

        handler
    }

    async fn drain_stdout<O>(self: Arc<Self>, stdout: O)
    where
        O: AsyncRead + Send + Unpin + 'static,
    {
        let (tx, mut rx) = mpsc::channel(256);
        let cancel = self.cancel.clone();
        let feeder = tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = run_framer(stdout, tx) => {}
            }
        });

        while let Some(result) = rx.recv().await {
            match result {
                Ok(frame) => self.dispatch(TOPIC_STDOUT, frame),
                Err(err) => self.bus.publish(Event {
                    topic: TOPIC_FRAMING_ERROR.into(),
                    payload: serde_json::json!({"error": err.to_string()}),
                }),
            }
        }
        feeder.abort();
    }

    async fn drain_stderr<E>(self: Arc<Self>, stderr: E)
    where
        E: AsyncRead + Send + Unpin + 'static,
    {
        use tokio::io::AsyncReadExt;
        let mut reader = stderr;
        let mut buf = [0u8; 4096];
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                result = reader.read(&mut buf) => {
                    match result {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            self.stderr_ring.write(&buf[..n]);
                            self.bus.publish(Event {
                                topic: TOPIC_STDERR.into(),
                                payload: serde_json::json!({"bytes": n}),
                            });
                        }
                    }
                }
            }
        }
    }

    fn dispatch(&self, topic: &str, frame: Frame) {
        // Correlate against pending Receive() waiters first.
        if let Some(ref id) = frame.reply_to {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(waiter) = pending.waiters.remove(id) {
                let _ = waiter.send(frame.clone());
            }
        }
        {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(waiter) = pending.any.pop() {
                let _ = waiter.send(frame.clone());
            }
        }

        self.bus.publish(Event { topic: topic.into(), payload: serde_json::to_value(&frame).unwrap_or_default() });

        let subs = self.subscribers.read();
        for sub in subs.values() {
            if sub.is_subscribed(topic) {
                sub.offer(frame.clone());
            }
        }
    }

    /// Attach a new subscriber with the given topic filter and slow-policy.
    pub fn subscribe(
        &self,
        id: impl Into<String>,
        topics: std::collections::HashSet<String>,
        policy: SlowPolicy,
    ) -> Arc<Subscriber> {
        let id = id.into();
        let sub = Arc::new(Subscriber::new(id.clone(), topics, policy));
        self.subscribers.write().insert(id, Arc::clone(&sub));
        sub
    }

    pub fn unsubscribe(&self, id: &str) {
        self.subscribers.write().remove(id);
    }

    /// Write one JSON line to stdin. Assigns a fresh id if `msg.id` is unset.
    pub async fn send(&self, mut msg: Frame, timeout: Duration) -> Result<String, StreamHandlerError> {
        let id = msg.id.clone().unwrap_or_else(|| {
            let n = self.next_id.fetch_add(1, Ordering::Relaxed);
            format!("ac-{n}")
        });
        msg.id = Some(id.clone());

        let mut line = serde_json::to_vec(&msg).map_err(|e| StreamHandlerError::WriteFailed(e.to_string()))?;
        line.push(b'\n');

        let write = async {
            let mut stdin = self.stdin_tx.lock().await;
            stdin.write_all(&line).await.map_err(|e| StreamHandlerError::WriteFailed(e.to_string()))?;
            stdin.flush().await.map_err(|e| StreamHandlerError::WriteFailed(e.to_string()))
        };

        tokio::time::timeout(timeout, write).await.map_err(|_| StreamHandlerError::WriteTimeout)??;
        Ok(id)
    }

    /// Await the first frame whose `reply-to == id`, or any frame if `id` is empty.
    pub async fn receive(&self, timeout: Duration, id: Option<&str>) -> Result<Frame, StreamHandlerError> {
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            match id {
                Some(id) => {
                    pending.waiters.insert(id.to_owned(), tx);
                }
                None => pending.any.push(tx),
            }
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(frame)) => Ok(frame),
            Ok(Err(_)) => Err(StreamHandlerError::Closed),
            Err(_) => Err(StreamHandlerError::ReceiveTimeout),
        }
    }

    /// Close stdin, cancel the reader tasks, and wait for them to exit.
    pub async fn close(&self) {
        self.cancel.cancel();
        {
            let mut stdin = self.stdin_tx.lock().await;
            let _ = stdin.shutdown().await;
        }
        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            let _ = task.await;
        }
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn stderr_ring(&self) -> &RingBuffer {
        &self.stderr_ring
    }
}

#[cfg(test)]
#[path = "handler_tests.rs"]
mod tests;
