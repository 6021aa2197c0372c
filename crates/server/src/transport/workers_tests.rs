// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn parse_worker_id_accepts_a_uuid() {
    let id = WorkerId::new();
    let parsed = parse_worker_id(&id.0.to_string()).unwrap();
    assert_eq!(parsed, id);
}

#[test]
fn parse_worker_id_rejects_garbage() {
    let err = parse_worker_id("not-a-uuid").unwrap_err();
    assert_eq!(err.kind, ac_core::error::ErrorKind::Validation);
}

#[test]
fn grace_defaults_when_absent() {
    let query = GraceQuery { grace: None };
    assert_eq!(grace(&query), Duration::from_secs(DEFAULT_GRACE_SECS));
}

#[test]
fn grace_honors_explicit_value() {
    let query = GraceQuery { grace: Some(30) };
    assert_eq!(grace(&query), Duration::from_secs(30));
}
