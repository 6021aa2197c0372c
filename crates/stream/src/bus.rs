// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Topic → handler registry with independent per-handler failure isolation
//! (§4.C).

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// An event published on the bus, tagged with its topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub topic: String,
    pub payload: serde_json::Value,
}

type HandlerFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
type Handler = Arc<dyn Fn(Event) -> HandlerFuture + Send + Sync>;

struct Registration {
    id: u64,
    handler: Handler,
}

/// Unsubscribes its handler when dropped.
pub struct HandlerGuard {
    bus: Arc<BusInner>,
    topic: String,
    id: u64,
}

impl Drop for HandlerGuard {
    fn drop(&mut self) {
        self.bus.unsubscribe(&self.topic, self.id);
    }
}

struct BusInner {
    handlers: Mutex<HashMap<String, Vec<Registration>>>,
    next_id: AtomicU64,
}

impl BusInner {
    fn unsubscribe(&self, topic: &str, id: u64) {
        if let Some(list) = self.handlers.lock().get_mut(topic) {
            list.retain(|r| r.id != id);
        }
    }
}

/// Fan-out registry: `publish` dispatches to every handler registered on a
/// topic, each in its own task, so one handler's failure or panic cannot
/// affect another. Handlers see events in publish order per-topic.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self { inner: Arc::new(BusInner { handlers: Mutex::new(HashMap::new()), next_id: AtomicU64::new(1) }) }
    }

    /// Register a handler for `topic`. Returns a handle that unsubscribes on drop.
    pub fn subscribe<F, Fut>(&self, topic: impl Into<String>, handler: F) -> HandlerGuard
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let topic = topic.into();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let boxed: Handler = Arc::new(move |event| Box::pin(handler(event)));
        self.inner.handlers.lock().entry(topic.clone()).or_default().push(Registration { id, handler: boxed });
        HandlerGuard { bus: Arc::clone(&self.inner), topic, id }
    }

    /// Dispatch `event` to every handler on `event.topic`, one task each.
    /// Per-topic publish order is preserved across handlers' start order;
    /// a handler's own latency never blocks another handler or the caller
    /// beyond spawning its task.
    pub fn publish(&self, event: Event) {
        let handlers: Vec<Handler> = {
            let guard = self.inner.handlers.lock();
            match guard.get(&event.topic) {
                Some(list) => list.iter().map(|r| Arc::clone(&r.handler)).collect(),
                None => return,
            }
        };

        for handler in handlers {
            let event = event.clone();
            tokio::spawn(async move {
                // AssertUnwindSafe: handlers are plain async fns with no
                // shared borrowed state that would be corrupted by a panic.
                let fut = std::panic::AssertUnwindSafe(handler(event));
                let _ = futures_util::FutureExt::catch_unwind(fut).await;
            });
        }
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.inner.handlers.lock().get(topic).map(|l| l.len()).unwrap_or(0)
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
