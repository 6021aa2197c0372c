// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Combined security gate (§4.K/L/M/N/O/P): blocked-IP and rate-limit
//! check, attack detection, soft session validation, CSRF verification on
//! mutating methods, and request auditing, wrapping every request.
//! Exempts `/api/v1/health`.
//!
//! A session cookie that validates is touched and its user attached to the
//! request; its absence is tolerated as anonymous access, since nothing in
//! the HTTP surface issues sessions (see DESIGN.md).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use tokio::time::timeout;

use ac_core::audit::AuditRecord;
use ac_core::error::{AcError, ErrorKind};
use ac_security::{evaluate, RequestSurface};
use axum::body::{to_bytes, Body};
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderName, HeaderValue, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::error::{error_response, RequestId};
use crate::state::{AppState, CurrentUser};

const MAX_BODY_BYTES: usize = 1024 * 1024;
const EXEMPT_PATHS: &[&str] = &["/api/v1/health"];

fn header_pairs(headers: &axum::http::HeaderMap) -> Vec<(String, String)> {
    headers.iter().filter_map(|(name, value)| value.to_str().ok().map(|v| (name.to_string(), v.to_owned()))).collect()
}

fn cookie_value(req: &Request<Body>, name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    req.headers()
        .get("cookie")?
        .to_str()
        .ok()?
        .split(';')
        .map(str::trim)
        .find_map(|kv| kv.strip_prefix(prefix.as_str()))
        .map(str::to_owned)
}

fn session_cookie(req: &Request<Body>) -> Option<String> {
    cookie_value(req, "session_id")
}

fn header_str<'a>(req: &'a Request<Body>, name: &str) -> &'a str {
    header_map_str(req.headers(), name)
}

fn header_map_str<'a>(headers: &'a axum::http::HeaderMap, name: &str) -> &'a str {
    headers.get(name).and_then(|v| v.to_str().ok()).unwrap_or_default()
}

fn attack_response(request_id: &RequestId, detector: &'static str) -> Response {
    let err = AcError::new(ErrorKind::Attack, "request blocked").with_context("detector", detector);
    let (status, body) = error_response(&err, request_id, false);
    (status, body).into_response()
}

fn session_expired_response(request_id: &RequestId) -> Response {
    let err = AcError::new(ErrorKind::Auth, "session expired");
    let envelope = ac_core::error::ErrorEnvelope::new(&err, request_id.0.clone(), None);
    (StatusCode::GONE, Json(envelope)).into_response()
}

/// Single request/response security cycle. Ordering: rate limit, attack
/// scan, session validation, CSRF, audit.
pub async fn security_gate(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();
    if EXEMPT_PATHS.contains(&path.as_str()) {
        return next.run(req).await;
    }

    let started = Instant::now();
    let request_id = req.extensions().get::<RequestId>().cloned().unwrap_or_else(RequestId::generate);
    let ip = addr.ip().to_string();
    let method = req.method().to_string();
    let url = req.uri().to_string();
    let query = req.uri().query().unwrap_or_default().to_string();
    let user_agent = header_str(&req, "user-agent").to_string();
    let origin = header_str(&req, "origin").to_string();
    let csrf_token = header_str(&req, "x-csrf-token").to_string();
    let csrf_cookie = cookie_value(&req, "csrf_token").unwrap_or_default();
    let session_id = session_cookie(&req);

    let mut record = AuditRecord::at_entry(&request_id.0, &ip, &method, &url, &path);
    record.user_agent = user_agent;
    record.query = query;
    state.security_stats.requests_total.fetch_add(1, std::sync::atomic::Ordering::Relaxed);

    // Preliminary, unvalidated session lookup: only used to key the
    // per-user rate-limit layer before the full admissibility check below.
    let preliminary_user = match &session_id {
        Some(sid) => state.sessions.get(sid).await.ok().flatten().map(|s| s.user_id),
        None => None,
    };

    let decision = match timeout(state.config.store_timeout(), state.rate_limiter.check(&ip, preliminary_user.as_deref(), &path)).await {
        Ok(Ok(d)) => d,
        Ok(Err(e)) => return error_into_response(&e.into(), &request_id, state.config.dev_mode),
        Err(_) => {
            tracing::warn!("networked store timed out on rate limit check, falling back to in-process limiter");
            match state.fallback_rate_limiter.check(&ip, preliminary_user.as_deref(), &path).await {
                Ok(d) => d,
                Err(e) => return error_into_response(&e.into(), &request_id, state.config.dev_mode),
            }
        }
    };

    if decision.blocked {
        record.tags.push("blocked_ip".to_string());
        record.response_code = StatusCode::FORBIDDEN.as_u16();
        let _ = state.audit.record(record).await;
        state.security_stats.ips_blocked.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let err = AcError::new(ErrorKind::Permission, "ip blocked");
        return error_into_response(&err, &request_id, state.config.dev_mode);
    }

    if !decision.allowed {
        record.tags.push("rate_limited".to_string());
        record.response_code = StatusCode::TOO_MANY_REQUESTS.as_u16();
        let _ = state.audit.record(record).await;
        state.security_stats.rate_limited.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let err = AcError::new(ErrorKind::RateLimited, "rate limit exceeded");
        let mut response = error_into_response(&err, &request_id, state.config.dev_mode);
        apply_rate_limit_headers(response.headers_mut(), &decision);
        return response;
    }

    let (parts, body) = req.into_parts();
    let bytes = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(_) => return AcError::validation("request body too large").into_response_with(&request_id, state.config.dev_mode),
    };
    let body_str = String::from_utf8_lossy(&bytes).into_owned();
    record.request_body = Some(body_str.clone());
    let headers = header_pairs(&parts.headers);
    record.headers = headers.iter().cloned().collect();

    let surface = RequestSurface {
        method: &method,
        url: &url,
        path: &path,
        query: &record.query,
        headers: &headers,
        user_agent: &record.user_agent,
        body: &body_str,
    };
    let verdict = evaluate(&surface);
    if verdict.is_attack {
        let detector = verdict.findings.iter().max_by(|a, b| a.confidence.total_cmp(&b.confidence)).map(|f| f.detector).unwrap_or("unknown");
        record.tags.push("error".to_string());
        record.tags.push("client_error".to_string());
        record.tags.push(format!("attack:{detector}"));
        record.response_code = StatusCode::FORBIDDEN.as_u16();
        let _ = state.audit.record(record).await;
        state.security_stats.attacks_blocked.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let findings: Vec<serde_json::Value> = verdict
            .findings
            .iter()
            .map(|f| serde_json::json!({"detector": f.detector, "confidence": f.confidence, "evidence": f.evidence}))
            .collect();
        state.security_events.push(serde_json::json!({
            "request_id": request_id.0,
            "ip": ip,
            "path": path,
            "detector": detector,
            "findings": findings,
        }));
        return attack_response(&request_id, detector);
    }

    let mut current_user = CurrentUser::default();
    if let Some(sid) = &session_id {
        match state.sessions.get(sid).await {
            Ok(Some(session)) => {
                let now = chrono::Utc::now();
                if now > session.expires_at {
                    record.response_code = StatusCode::GONE.as_u16();
                    let _ = state.audit.record(record).await;
                    return session_expired_response(&request_id);
                }
                if !session.is_admissible(now) {
                    record.response_code = StatusCode::UNAUTHORIZED.as_u16();
                    let _ = state.audit.record(record).await;
                    return AcError::new(ErrorKind::Auth, "session invalid").into_response_with(&request_id, state.config.dev_mode);
                }
                let _ = state.sessions.touch(sid).await;

                let accept_language = header_map_str(&parts.headers, "accept-language");
                let platform_hint = header_map_str(&parts.headers, "sec-ch-ua-platform");
                let fingerprint = ac_core::session::DeviceFingerprint::compute(&record.user_agent, accept_language, platform_hint, None);
                let mut suspicion_signal = 0.0;
                if state.checker.check_device(&session.user_id, &fingerprint) == ac_security::DeviceCheck::NewDevice {
                    record.tags.push("device_change".to_string());
                    suspicion_signal += 25.0;
                }
                // No per-request geo-hint is available on this transport (§6
                // names no location header/field), so CheckLocation has
                // nothing current to compare the session's hint against.
                if suspicion_signal > 0.0 && state.checker.suspicion(sid, suspicion_signal) {
                    record.tags.push("suspicious_activity".to_string());
                    record.response_code = StatusCode::FORBIDDEN.as_u16();
                    let _ = state.audit.record(record).await;
                    let err = AcError::new(ErrorKind::Permission, "session suspicion threshold exceeded");
                    return error_into_response(&err, &request_id, state.config.dev_mode);
                }

                current_user.user_id = Some(session.user_id.clone());
                current_user.session_id = Some(sid.clone());
                record.session_id = Some(sid.clone());
                record.user_id = Some(session.user_id);
            }
            Ok(None) => {
                record.response_code = StatusCode::UNAUTHORIZED.as_u16();
                let _ = state.audit.record(record).await;
                return AcError::new(ErrorKind::Auth, "session not found").into_response_with(&request_id, state.config.dev_mode);
            }
            Err(e) => return error_into_response(&e.into(), &request_id, state.config.dev_mode),
        }
    }

    if let Some(sid) = &session_id {
        if !ac_security::CsrfGuard::is_exempt_method(&method) {
            let host = parts.headers.get("host").and_then(|v| v.to_str().ok()).unwrap_or_default();
            let origin_ok = origin.is_empty() || ac_security::CsrfGuard::verify_origin(&origin, host, &state.config.trusted_origins);
            let token_ok = match timeout(state.config.store_timeout(), state.csrf.verify(sid, &csrf_token)).await {
                Ok(Ok(ok)) => ok,
                Ok(Err(e)) => return error_into_response(&e.into(), &request_id, state.config.dev_mode),
                Err(_) => {
                    tracing::warn!("networked store timed out on csrf verification, falling back to double-submit cookie");
                    ac_security::CsrfGuard::verify_double_submit(&csrf_cookie, &csrf_token)
                }
            };
            if !origin_ok || !token_ok {
                record.tags.push("csrf_rejected".to_string());
                record.response_code = StatusCode::FORBIDDEN.as_u16();
                let _ = state.audit.record(record).await;
                state.security_stats.csrf_rejected.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                let err = AcError::new(ErrorKind::Csrf, "csrf token invalid").with_remediation("obtain a fresh token and retry");
                return error_into_response(&err, &request_id, state.config.dev_mode);
            }
        }
    }
    let mut parts = parts;
    parts.extensions.insert(current_user);

    let req = Request::from_parts(parts, Body::from(bytes));
    let response = next.run(req).await;

    let (mut resp_parts, resp_body) = response.into_parts();
    record.response_code = resp_parts.status.as_u16();
    record.duration_ms = started.elapsed().as_millis() as u64;

    let resp_body = match to_bytes(resp_body, MAX_BODY_BYTES).await {
        Ok(bytes) => {
            record.response_size = bytes.len();
            record.response_body = Some(String::from_utf8_lossy(&bytes).into_owned());
            bytes
        }
        Err(_) => bytes::Bytes::new(),
    };
    let _ = state.audit.record(record).await;

    apply_rate_limit_headers(&mut resp_parts.headers, &decision);
    Response::from_parts(resp_parts, Body::from(resp_body))
}

fn error_into_response(err: &AcError, request_id: &RequestId, dev_mode: bool) -> Response {
    let (status, body) = error_response(err, request_id, dev_mode);
    (status, body).into_response()
}

trait IntoErrorResponse {
    fn into_response_with(self, request_id: &RequestId, dev_mode: bool) -> Response;
}

impl IntoErrorResponse for AcError {
    fn into_response_with(self, request_id: &RequestId, dev_mode: bool) -> Response {
        error_into_response(&self, request_id, dev_mode)
    }
}

fn apply_rate_limit_headers(headers: &mut axum::http::HeaderMap, decision: &ac_security::Decision) {
    for (layer, status) in &decision.statuses {
        let name = match layer {
            ac_security::Layer::Global => "global",
            ac_security::Layer::Ip => "ip",
            ac_security::Layer::Endpoint => "endpoint",
            ac_security::Layer::User => "user",
        };
        for (suffix, value) in [("limit", status.limit), ("remaining", status.remaining), ("reset", status.reset_secs)] {
            if let Ok(header) = HeaderName::try_from(format!("x-ratelimit-{name}-{suffix}")) {
                if let Ok(value) = HeaderValue::from_str(&value.to_string()) {
                    headers.insert(header, value);
                }
            }
        }
        if status.remaining == 0 {
            if let Ok(value) = HeaderValue::from_str(&status.reset_secs.to_string()) {
                headers.insert(HeaderName::from_static("retry-after"), value);
            }
        }
    }
}
