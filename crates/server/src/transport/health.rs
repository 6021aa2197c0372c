// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    worker_count: usize,
}

/// `GET /api/v1/health` — exempt from the security gate.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let worker_count = state.workers.read().await.len();
    Json(HealthResponse { status: "running", worker_count })
}
