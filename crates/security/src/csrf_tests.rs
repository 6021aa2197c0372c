// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::backend::InMemoryStore;

#[tokio::test]
async fn a_minted_token_verifies_once() {
    let guard = CsrfGuard::new(Arc::new(InMemoryStore::new()));
    let token = guard.mint("s1", Duration::from_secs(60)).await.unwrap();
    assert!(guard.verify("s1", &token).await.unwrap());
    assert!(!guard.verify("s1", &token).await.unwrap());
}

#[tokio::test]
async fn a_token_is_scoped_to_its_session() {
    let guard = CsrfGuard::new(Arc::new(InMemoryStore::new()));
    let token = guard.mint("s1", Duration::from_secs(60)).await.unwrap();
    assert!(!guard.verify("s2", &token).await.unwrap());
}

#[tokio::test]
async fn an_empty_token_never_verifies() {
    let guard = CsrfGuard::new(Arc::new(InMemoryStore::new()));
    assert!(!guard.verify("s1", "").await.unwrap());
}

#[test]
fn get_head_options_are_exempt() {
    assert!(CsrfGuard::is_exempt_method("GET"));
    assert!(CsrfGuard::is_exempt_method("head"));
    assert!(CsrfGuard::is_exempt_method("OPTIONS"));
    assert!(!CsrfGuard::is_exempt_method("POST"));
}

#[test]
fn double_submit_requires_a_matching_nonempty_cookie() {
    assert!(CsrfGuard::verify_double_submit("abc", "abc"));
    assert!(!CsrfGuard::verify_double_submit("abc", "xyz"));
    assert!(!CsrfGuard::verify_double_submit("", ""));
}

#[test]
fn origin_matches_host_or_a_trusted_entry() {
    let trusted = vec!["https://trusted.example".to_string()];
    assert!(CsrfGuard::verify_origin("https://app.example", "https://app.example", &trusted));
    assert!(CsrfGuard::verify_origin("https://trusted.example", "https://app.example", &trusted));
    assert!(!CsrfGuard::verify_origin("https://evil.example", "https://app.example", &trusted));
}
