// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn small_config() -> BreakerConfig {
    BreakerConfig {
        window: Duration::from_secs(60),
        failure_threshold: 3,
        rate_threshold: 0.9,
        min_samples: 100,
        recovery_timeout: Duration::from_millis(50),
        success_threshold: 2,
    }
}

#[test]
fn starts_closed_and_allows_calls() {
    let breaker = CircuitBreaker::new(small_config());
    assert_eq!(breaker.state(), BreakerState::Closed);
    assert!(breaker.allow());
}

#[test]
fn trips_open_after_failure_threshold() {
    let breaker = CircuitBreaker::new(small_config());
    breaker.record_failure();
    breaker.record_failure();
    assert_eq!(breaker.state(), BreakerState::Closed);
    breaker.record_failure();
    assert_eq!(breaker.state(), BreakerState::Open);
    assert!(!breaker.allow());
}

#[tokio::test]
async fn open_transitions_to_half_open_after_recovery_timeout() {
    let breaker = CircuitBreaker::new(small_config());
    for _ in 0..3 {
        breaker.record_failure();
    }
    assert_eq!(breaker.state(), BreakerState::Open);

    tokio::time::sleep(Duration::from_millis(75)).await;
    assert!(breaker.allow());
    assert_eq!(breaker.state(), BreakerState::HalfOpen);
}

#[tokio::test]
async fn half_open_closes_after_consecutive_successes() {
    let breaker = CircuitBreaker::new(small_config());
    for _ in 0..3 {
        breaker.record_failure();
    }
    tokio::time::sleep(Duration::from_millis(75)).await;
    breaker.allow();
    assert_eq!(breaker.state(), BreakerState::HalfOpen);

    breaker.record_success();
    assert_eq!(breaker.state(), BreakerState::HalfOpen);
    breaker.record_success();
    assert_eq!(breaker.state(), BreakerState::Closed);
}

#[tokio::test]
async fn half_open_reopens_on_any_failure() {
    let breaker = CircuitBreaker::new(small_config());
    for _ in 0..3 {
        breaker.record_failure();
    }
    tokio::time::sleep(Duration::from_millis(75)).await;
    breaker.allow();
    assert_eq!(breaker.state(), BreakerState::HalfOpen);

    breaker.record_failure();
    assert_eq!(breaker.state(), BreakerState::Open);
}

#[test]
fn force_open_trips_regardless_of_thresholds() {
    let breaker = CircuitBreaker::new(small_config());
    assert_eq!(breaker.state(), BreakerState::Closed);
    breaker.force_open();
    assert_eq!(breaker.state(), BreakerState::Open);
    assert!(!breaker.allow());
}

#[test]
fn failure_rate_trips_with_minimum_sample_size() {
    let mut config = small_config();
    config.failure_threshold = 1000;
    config.min_samples = 4;
    config.rate_threshold = 0.5;
    let breaker = CircuitBreaker::new(config);

    breaker.record_success();
    breaker.record_failure();
    breaker.record_failure();
    assert_eq!(breaker.state(), BreakerState::Closed);
    breaker.record_failure();
    assert_eq!(breaker.state(), BreakerState::Open);
}
