// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP + WebSocket transport for the control plane.

pub mod health;
pub mod headers;
pub mod security;
pub mod security_api;
pub mod sessions;
pub mod stream;
pub mod workers;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::state::AppState;

/// Build the axum `Router` with every route and the security middleware
/// stack layered around it.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(health::health))
        .route("/api/v1/workers", post(workers::create_worker).get(workers::list_workers))
        .route("/api/v1/workers/{id}", get(workers::get_worker).delete(workers::delete_worker))
        .route("/api/v1/workers/{id}/stop", post(workers::stop_worker))
        .route("/api/v1/workers/{id}/restart", post(workers::restart_worker))
        .route("/api/v1/workers/{id}/stream", get(stream::stream_handler))
        .route("/api/v1/security/events", get(security_api::list_events))
        .route("/api/v1/security/statistics", get(security_api::statistics))
        .route("/api/v1/security/detect-attack", post(security_api::detect_attack))
        .route("/api/v1/sessions", get(sessions::list_sessions))
        .route("/api/v1/sessions/{sid}", delete(sessions::revoke_session))
        .route("/api/v1/sessions/terminate-others", post(sessions::terminate_others))
        .layer(middleware::from_fn_with_state(state.clone(), security::security_gate))
        .layer(middleware::from_fn_with_state(state.clone(), headers::security_headers))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
