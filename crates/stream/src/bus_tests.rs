// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::*;

#[tokio::test]
async fn publish_reaches_all_subscribers_on_the_topic() {
    let bus = EventBus::new();
    let count_a = Arc::new(AtomicUsize::new(0));
    let count_b = Arc::new(AtomicUsize::new(0));

    let a = Arc::clone(&count_a);
    let _sub_a = bus.subscribe("worker:stdout", move |_event| {
        let a = Arc::clone(&a);
        async move {
            a.fetch_add(1, Ordering::SeqCst);
        }
    });

    let b = Arc::clone(&count_b);
    let _sub_b = bus.subscribe("worker:stdout", move |_event| {
        let b = Arc::clone(&b);
        async move {
            b.fetch_add(1, Ordering::SeqCst);
        }
    });

    bus.publish(Event { topic: "worker:stdout".into(), payload: serde_json::json!({"n": 1}) });
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(count_a.load(Ordering::SeqCst), 1);
    assert_eq!(count_b.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn publish_to_unknown_topic_is_a_no_op() {
    let bus = EventBus::new();
    bus.publish(Event { topic: "nothing:here".into(), payload: serde_json::Value::Null });
    // no panic, no subscribers to reach
    assert_eq!(bus.subscriber_count("nothing:here"), 0);
}

#[tokio::test]
async fn a_panicking_handler_does_not_affect_others() {
    let bus = EventBus::new();
    let hit = Arc::new(AtomicUsize::new(0));

    let _sub_panic = bus.subscribe("t", |_event| async move {
        panic!("boom");
    });

    let counted = Arc::clone(&hit);
    let _sub_ok = bus.subscribe("t", move |_event| {
        let counted = Arc::clone(&counted);
        async move {
            counted.fetch_add(1, Ordering::SeqCst);
        }
    });

    bus.publish(Event { topic: "t".into(), payload: serde_json::Value::Null });
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(hit.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn dropping_subscription_unsubscribes() {
    let bus = EventBus::new();
    let sub = bus.subscribe("t", |_event| async {});
    assert_eq!(bus.subscriber_count("t"), 1);
    drop(sub);
    assert_eq!(bus.subscriber_count("t"), 0);
}
