// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Maps [`AcError`] onto the wire error envelope (§7). Every response body
//! carries the same request id as its `X-Request-ID` header; callers pass
//! it in explicitly rather than recovering it from extensions inside a
//! blanket `IntoResponse` impl.

use ac_core::error::{AcError, ErrorEnvelope, ErrorKind};
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

/// Request-scoped identifier threaded from the headers middleware into
/// every handler via the `Extension` extractor.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kinds whose context is safe to surface to the caller even outside dev
/// mode, because it describes what the caller did wrong rather than
/// anything about the server's internals.
fn is_user_actionable(kind: ErrorKind) -> bool {
    matches!(kind, ErrorKind::Validation | ErrorKind::Conflict | ErrorKind::RateLimited | ErrorKind::Csrf)
}

fn build_details(err: &AcError, dev_mode: bool) -> Option<serde_json::Value> {
    if !dev_mode && !is_user_actionable(err.kind) {
        return None;
    }
    if err.context.is_empty() && err.remediation.is_empty() {
        return None;
    }
    Some(json!({ "context": err.context, "remediation": err.remediation }))
}

/// Build the `(StatusCode, Json<ErrorEnvelope>)` pair every fallible
/// handler converts its `AcError` into before returning.
pub fn error_response(err: &AcError, request_id: &RequestId, dev_mode: bool) -> (StatusCode, Json<ErrorEnvelope>) {
    let status = StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let details = build_details(err, dev_mode);
    let envelope = ErrorEnvelope::new(err, request_id.0.clone(), details);
    (status, Json(envelope))
}

/// Handler return type alias for the common case of a JSON body or the
/// standard error envelope.
pub type ApiResult<T> = Result<T, (StatusCode, Json<ErrorEnvelope>)>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
