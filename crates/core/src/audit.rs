// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Literal substituted for any sensitive field value before emission (§4.P).
pub const MASKED: &str = "[MASKED]";

/// One audit record per HTTP request (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub request_id: String,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub ip: String,
    pub user_agent: String,
    pub method: String,
    pub url: String,
    pub path: String,
    pub query: String,
    pub headers: BTreeMap<String, String>,
    pub request_body: Option<String>,
    pub response_code: u16,
    pub response_size: usize,
    pub response_body: Option<String>,
    pub duration_ms: u64,
    pub error: Option<String>,
    pub tags: Vec<String>,
    pub metadata: BTreeMap<String, String>,
}

impl AuditRecord {
    /// Build a record from the fields known at request entry; response
    /// fields default empty and are filled in at request exit.
    pub fn at_entry(
        request_id: impl Into<String>,
        ip: impl Into<String>,
        method: impl Into<String>,
        url: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            request_id: request_id.into(),
            user_id: None,
            session_id: None,
            ip: ip.into(),
            user_agent: String::new(),
            method: method.into(),
            url: url.into(),
            path: path.into(),
            query: String::new(),
            headers: BTreeMap::new(),
            request_body: None,
            response_code: 0,
            response_size: 0,
            response_body: None,
            duration_ms: 0,
            error: None,
            tags: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
#[path = "audit_tests.rs"]
mod tests;
