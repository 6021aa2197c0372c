// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use ac_core::audit::AuditRecord;

use super::*;
use crate::backend::InMemoryStore;

fn config(batch_size: usize) -> AuditPipelineConfig {
    AuditPipelineConfig { batch_size, ..AuditPipelineConfig::default() }
}

fn record() -> AuditRecord {
    AuditRecord::at_entry("req-1", "1.2.3.4", "POST", "https://app.example/api/v1/workers", "/api/v1/workers")
}

#[test]
fn masking_replaces_sensitive_headers_and_nested_body_fields() {
    let mut rec = record();
    rec.headers.insert("Authorization".to_string(), "Bearer xyz".to_string());
    rec.headers.insert("X-Request-ID".to_string(), "req-1".to_string());
    rec.request_body = Some(r#"{"username":"alice","password":"hunter2","nested":{"token":"abc"}}"#.to_string());

    mask_headers(&mut rec.headers, &default_sensitive_fields());
    let masked_body = mask_body(rec.request_body.as_deref().unwrap(), &default_sensitive_fields());

    assert_eq!(rec.headers["Authorization"], "[MASKED]");
    assert_eq!(rec.headers["X-Request-ID"], "req-1");
    let parsed: serde_json::Value = serde_json::from_str(&masked_body).unwrap();
    assert_eq!(parsed["password"], serde_json::json!("[MASKED]"));
    assert_eq!(parsed["nested"]["token"], serde_json::json!("[MASKED]"));
    assert_eq!(parsed["username"], serde_json::json!("alice"));
}

#[test]
fn a_non_json_body_is_left_untouched() {
    let masked = mask_body("not json at all", &default_sensitive_fields());
    assert_eq!(masked, "not json at all");
}

#[tokio::test]
async fn records_below_batch_size_stay_queued_and_unwritten() {
    let store = Arc::new(InMemoryStore::new());
    let pipeline = AuditPipeline::new(store.clone(), config(10));
    let rec = record();
    let id = rec.id.clone();
    let outcome = pipeline.record(rec).await.unwrap();
    assert_eq!(outcome, EnqueueOutcome::Buffered);
    assert_eq!(pipeline.queue_len(), 1);
    assert!(store.get(&audit_log_key(&id)).await.unwrap().is_none());
}

#[tokio::test]
async fn reaching_batch_size_reports_batch_ready() {
    let pipeline = AuditPipeline::new(Arc::new(InMemoryStore::new()), config(2));
    pipeline.record(record()).await.unwrap();
    let outcome = pipeline.record(record()).await.unwrap();
    assert_eq!(outcome, EnqueueOutcome::BatchReady);
    assert_eq!(pipeline.queue_len(), 2);
}

#[tokio::test]
async fn flush_full_batches_drains_exactly_one_batch_at_a_time() {
    let store = Arc::new(InMemoryStore::new());
    let pipeline = AuditPipeline::new(store, config(2));
    for _ in 0..5 {
        pipeline.record(record()).await.unwrap();
    }
    pipeline.flush_full_batches().await.unwrap();
    // Five queued, batches of two drained twice, one left over.
    assert_eq!(pipeline.queue_len(), 1);
}

#[tokio::test]
async fn flush_drains_a_partial_queue_on_demand() {
    let store = Arc::new(InMemoryStore::new());
    let pipeline = AuditPipeline::new(store.clone(), config(100));
    let mut rec = record();
    rec.user_id = Some("alice".to_string());
    let id = rec.id.clone();
    pipeline.record(rec).await.unwrap();
    pipeline.flush().await.unwrap();
    assert_eq!(pipeline.queue_len(), 0);
    assert!(store.get(&audit_log_key(&id)).await.unwrap().is_some());
}

#[tokio::test]
async fn a_full_queue_writes_the_next_record_synchronously() {
    let store = Arc::new(InMemoryStore::new());
    let pipeline = AuditPipeline::new(store.clone(), config(10));
    // Fill to capacity (2x batch size) without ever flushing, so the queue
    // genuinely saturates.
    for _ in 0..20 {
        pipeline.record(record()).await.unwrap();
    }
    let mut overflow = record();
    overflow.user_id = Some("bob".to_string());
    let overflow_id = overflow.id.clone();
    let outcome = pipeline.record(overflow).await.unwrap();
    assert_eq!(outcome, EnqueueOutcome::WrittenSynchronously);
    assert_eq!(pipeline.queue_len(), 20);
    let body = store.get(&audit_log_key(&overflow_id)).await.unwrap();
    assert!(body.is_some());
}

#[tokio::test]
async fn a_flushed_record_is_indexed_by_timeline_user_and_tag() {
    let store = Arc::new(InMemoryStore::new());
    let pipeline = AuditPipeline::new(store.clone(), config(1));
    let mut rec = record();
    rec.user_id = Some("alice".to_string());
    rec.tags = vec!["login".to_string()];
    let at = rec.timestamp;
    pipeline.record(rec).await.unwrap();
    pipeline.flush_full_batches().await.unwrap();

    let date = at.format("%Y-%m-%d").to_string();
    assert_eq!(store.zcard(&audit_timeline_key(&date)).await.unwrap(), 1);
    assert_eq!(store.zcard(&audit_user_key("alice")).await.unwrap(), 1);
    assert_eq!(store.zcard(&audit_tag_key("login")).await.unwrap(), 1);
}
