// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client attachment to a worker's output stream: a bounded queue plus a
//! slow-consumer policy (§3 Subscription, §4.J back-pressure).

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;

use crate::framer::Frame;

/// Default bounded queue capacity per subscriber (§3).
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// What to do when a subscriber's queue is full (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlowPolicy {
    DropOldest,
    DropNewest,
    Disconnect,
}

/// A client's attachment to a worker stream.
///
/// The broadcaster never blocks on a subscription: [`Subscriber::offer`]
/// always returns immediately, applying the configured slow-policy on
/// overflow instead of awaiting queue space.
pub struct Subscriber {
    pub id: String,
    pub topics: HashSet<String>,
    pub policy: SlowPolicy,
    tx: mpsc::Sender<Frame>,
    rx: tokio::sync::Mutex<mpsc::Receiver<Frame>>,
    dropped: AtomicU64,
    disconnected: std::sync::atomic::AtomicBool,
}

/// Outcome of offering a frame to a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferOutcome {
    Delivered,
    DroppedOldest,
    DroppedNewest,
    Disconnected,
}

impl Subscriber {
    pub fn new(id: impl Into<String>, topics: HashSet<String>, policy: SlowPolicy) -> Self {
        Self::with_capacity(id, topics, policy, DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(
        id: impl Into<String>,
        topics: HashSet<String>,
        policy: SlowPolicy,
        capacity: usize,
    ) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            id: id.into(),
            topics,
            policy,
            tx,
            rx: tokio::sync::Mutex::new(rx),
            dropped: AtomicU64::new(0),
            disconnected: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.topics.is_empty() || self.topics.contains(topic)
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::Relaxed)
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Receive the next frame. Used by the connection task that forwards
    /// queued frames out over the wire.
    pub async fn recv(&self) -> Option<Frame> {
        self.rx.lock().await.recv().await
    }

    /// Offer a frame without ever blocking the caller (the broadcaster).
    pub fn offer(&self, frame: Frame) -> OfferOutcome {
        if self.disconnected.load(Ordering::Relaxed) {
            return OfferOutcome::Disconnected;
        }

        match self.tx.try_send(frame) {
            Ok(()) => OfferOutcome::Delivered,
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.disconnected.store(true, Ordering::Relaxed);
                OfferOutcome::Disconnected
            }
            Err(mpsc::error::TrySendError::Full(frame)) => self.handle_full(frame),
        }
    }

    fn handle_full(&self, frame: Frame) -> OfferOutcome {
        match self.policy {
            SlowPolicy::DropNewest => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                OfferOutcome::DroppedNewest
            }
            SlowPolicy::Disconnect => {
                self.disconnected.store(true, Ordering::Relaxed);
                OfferOutcome::Disconnected
            }
            SlowPolicy::DropOldest => {
                // Evict one queued frame, then retry once. The queue is
                // bounded so this never loops more than the capacity.
                let mut rx = match self.rx.try_lock() {
                    Ok(rx) => rx,
                    Err(_) => {
                        // Receiver task is mid-read; count this as a drop
                        // of the incoming frame rather than blocking.
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        return OfferOutcome::DroppedNewest;
                    }
                };
                let evicted = rx.try_recv().is_ok();
                drop(rx);
                if evicted {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                }
                match self.tx.try_send(frame) {
                    Ok(()) => OfferOutcome::DroppedOldest,
                    Err(_) => {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        OfferOutcome::DroppedNewest
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "subscription_tests.rs"]
mod tests;
