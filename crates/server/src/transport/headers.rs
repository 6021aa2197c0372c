// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request-id propagation and the strict security response headers (§6).
//! Runs outermost so every response, including ones produced by inner
//! middleware rejections, carries the same headers.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderName, HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;

use crate::error::RequestId;
use crate::state::AppState;

const HSTS: &str = "max-age=63072000; includeSubDomains";
const CSP: &str = "default-src 'self'";
const PERMISSIONS_POLICY: &str = "geolocation=(), camera=(), microphone=()";

pub async fn security_headers(
    State(state): State<Arc<AppState>>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let request_id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|v| RequestId(v.to_owned()))
        .unwrap_or_else(RequestId::generate);

    req.extensions_mut().insert(request_id.clone());

    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    if let Ok(value) = HeaderValue::from_str(&request_id.0) {
        headers.insert(HeaderName::from_static("x-request-id"), value);
    }

    if !state.config.dev_mode {
        headers.insert(HeaderName::from_static("strict-transport-security"), HeaderValue::from_static(HSTS));
        headers.insert(HeaderName::from_static("content-security-policy"), HeaderValue::from_static(CSP));
        headers.insert(HeaderName::from_static("x-frame-options"), HeaderValue::from_static("SAMEORIGIN"));
        headers.insert(HeaderName::from_static("x-content-type-options"), HeaderValue::from_static("nosniff"));
        headers.insert(
            HeaderName::from_static("referrer-policy"),
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        );
        headers.insert(HeaderName::from_static("permissions-policy"), HeaderValue::from_static(PERMISSIONS_POLICY));
        headers.insert(HeaderName::from_static("cross-origin-embedder-policy"), HeaderValue::from_static("require-corp"));
        headers.insert(HeaderName::from_static("cross-origin-opener-policy"), HeaderValue::from_static("same-origin"));
        headers.insert(HeaderName::from_static("cross-origin-resource-policy"), HeaderValue::from_static("same-origin"));
    }

    response
}
