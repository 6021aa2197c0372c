// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request/response audit trail (§4.P). Records are masked, buffered in a
//! bounded in-process queue, and flushed in batches on size or a timer. A
//! queue already at capacity writes its record synchronously rather than
//! dropping it. Indexing by time bucket, user, and tag uses sorted sets
//! sharing the record's TTL.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use ac_core::audit::{AuditRecord, MASKED};
use parking_lot::Mutex;
use serde_json::Value;

use crate::backend::KvStore;
use crate::error::SecurityError;

const DEFAULT_BATCH_SIZE: usize = 100;
const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(10);
const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;
const DEFAULT_TTL: Duration = Duration::from_secs(30 * 24 * 3600);

fn default_sensitive_fields() -> HashSet<String> {
    ["password", "token", "secret", "key", "credential", "authorization", "cookie"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Masks any JSON object key matching `sensitive_fields` (case-insensitive),
/// recursing into nested objects and arrays.
fn mask_json(value: &mut Value, sensitive_fields: &HashSet<String>) {
    match value {
        Value::Object(map) => {
            for (key, v) in map.iter_mut() {
                if sensitive_fields.iter().any(|f| f.eq_ignore_ascii_case(key)) {
                    *v = Value::String(MASKED.to_string());
                } else {
                    mask_json(v, sensitive_fields);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                mask_json(item, sensitive_fields);
            }
        }
        _ => {}
    }
}

/// Mask a request/response body captured as a raw (presumed-JSON) string. A
/// body that doesn't parse as JSON is left untouched — it isn't a
/// structured object the sensitive-field list can apply to.
fn mask_body(body: &str, sensitive_fields: &HashSet<String>) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(mut value) => {
            mask_json(&mut value, sensitive_fields);
            value.to_string()
        }
        Err(_) => body.to_string(),
    }
}

fn mask_headers(headers: &mut std::collections::BTreeMap<String, String>, sensitive_fields: &HashSet<String>) {
    for (key, value) in headers.iter_mut() {
        if sensitive_fields.iter().any(|f| f.eq_ignore_ascii_case(key)) {
            *value = MASKED.to_string();
        }
    }
}

fn truncate_body(mut body: String, max_bytes: usize) -> String {
    if body.len() > max_bytes {
        body.truncate(max_bytes);
    }
    body
}

pub struct AuditPipelineConfig {
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub max_body_bytes: usize,
    pub sensitive_fields: HashSet<String>,
    pub ttl: Duration,
}

impl Default for AuditPipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            sensitive_fields: default_sensitive_fields(),
            ttl: DEFAULT_TTL,
        }
    }
}

fn audit_log_key(id: &str) -> String {
    format!("audit:log:{id}")
}

fn audit_timeline_key(date: &str) -> String {
    format!("audit:timeline:{date}")
}

fn audit_user_key(user: &str) -> String {
    format!("audit:user:{user}")
}

fn audit_tag_key(tag: &str) -> String {
    format!("audit:tag:{tag}")
}

/// Whether an enqueued record should wake a waiting flusher right away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Buffered,
    BatchReady,
    WrittenSynchronously,
}

pub struct AuditPipeline {
    store: Arc<dyn KvStore>,
    config: AuditPipelineConfig,
    queue: Mutex<VecDeque<AuditRecord>>,
    notify: tokio::sync::Notify,
}

impl AuditPipeline {
    pub fn new(store: Arc<dyn KvStore>, config: AuditPipelineConfig) -> Arc<Self> {
        Arc::new(Self { store, config, queue: Mutex::new(VecDeque::new()), notify: tokio::sync::Notify::new() })
    }

    fn capacity(&self) -> usize {
        self.config.batch_size * 2
    }

    /// Mask and size-cap a captured request/response record, then enqueue
    /// it. A queue already at capacity bypasses buffering and writes the
    /// record synchronously so it is never dropped; reaching `batch_size`
    /// wakes whichever task is waiting to flush a full batch.
    pub async fn record(&self, mut record: AuditRecord) -> Result<EnqueueOutcome, SecurityError> {
        mask_headers(&mut record.headers, &self.config.sensitive_fields);
        record.request_body = record
            .request_body
            .map(|b| truncate_body(mask_body(&b, &self.config.sensitive_fields), self.config.max_body_bytes));
        record.response_body = record
            .response_body
            .map(|b| truncate_body(mask_body(&b, &self.config.sensitive_fields), self.config.max_body_bytes));

        let outcome = {
            let mut queue = self.queue.lock();
            if queue.len() >= self.capacity() {
                EnqueueOutcome::WrittenSynchronously
            } else {
                queue.push_back(record.clone());
                if queue.len() >= self.config.batch_size {
                    EnqueueOutcome::BatchReady
                } else {
                    EnqueueOutcome::Buffered
                }
            }
        };

        match outcome {
            EnqueueOutcome::WrittenSynchronously => self.write_record(&record).await?,
            EnqueueOutcome::BatchReady => self.notify.notify_one(),
            EnqueueOutcome::Buffered => {}
        }

        Ok(outcome)
    }

    /// Drain and write every full `batch_size` chunk currently queued,
    /// leaving any remainder buffered.
    pub async fn flush_full_batches(&self) -> Result<(), SecurityError> {
        loop {
            let batch = {
                let mut queue = self.queue.lock();
                if queue.len() < self.config.batch_size {
                    break;
                }
                queue.drain(..self.config.batch_size).collect::<Vec<_>>()
            };
            self.flush_batch(&batch).await?;
        }
        Ok(())
    }

    /// Flush whatever is currently queued, regardless of batch size.
    pub async fn flush(&self) -> Result<(), SecurityError> {
        let batch: Vec<AuditRecord> = self.queue.lock().drain(..).collect();
        self.flush_batch(&batch).await
    }

    /// Spawn a background task that drains a full batch as soon as one is
    /// ready, and otherwise flushes whatever is queued every
    /// `flush_interval`. Runs until the returned handle is dropped or
    /// aborted.
    pub fn spawn_flusher(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let pipeline = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(pipeline.config.flush_interval);
            loop {
                tokio::select! {
                    _ = pipeline.notify.notified() => {
                        if let Err(err) = pipeline.flush_full_batches().await {
                            tracing::error!(error = %err, "audit batch flush failed");
                        }
                    }
                    _ = ticker.tick() => {
                        if let Err(err) = pipeline.flush().await {
                            tracing::error!(error = %err, "periodic audit flush failed");
                        }
                    }
                }
            }
        })
    }

    async fn flush_batch(&self, batch: &[AuditRecord]) -> Result<(), SecurityError> {
        for record in batch {
            self.write_record(record).await?;
        }
        Ok(())
    }

    async fn write_record(&self, record: &AuditRecord) -> Result<(), SecurityError> {
        let body = serde_json::to_string(record).map_err(|e| SecurityError::Store(e.to_string()))?;
        self.store.set_ex(&audit_log_key(&record.id), &body, self.config.ttl).await?;

        let score = record.timestamp.timestamp_millis() as f64;
        let date = record.timestamp.format("%Y-%m-%d").to_string();
        self.store.zadd(&audit_timeline_key(&date), &record.id, score).await?;
        self.store.expire(&audit_timeline_key(&date), self.config.ttl).await?;

        if let Some(user) = &record.user_id {
            self.store.zadd(&audit_user_key(user), &record.id, score).await?;
            self.store.expire(&audit_user_key(user), self.config.ttl).await?;
        }
        for tag in &record.tags {
            self.store.zadd(&audit_tag_key(tag), &record.id, score).await?;
            self.store.expire(&audit_tag_key(tag), self.config.ttl).await?;
        }
        Ok(())
    }

    pub fn flush_interval(&self) -> Duration {
        self.config.flush_interval
    }

    #[cfg(test)]
    fn queue_len(&self) -> usize {
        self.queue.lock().len()
    }
}

#[cfg(test)]
#[path = "audit_tests.rs"]
mod tests;
