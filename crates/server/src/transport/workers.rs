// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker lifecycle REST surface (§6): create, inspect, stop, restart,
//! list, delete.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use ac_core::error::AcError;
use ac_core::worker::{WorkerDescriptor, WorkerId};
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::error::{error_response, ApiResult, RequestId};
use crate::state::AppState;

const DEFAULT_GRACE_SECS: u64 = 10;

fn parse_worker_id(raw: &str) -> Result<WorkerId, AcError> {
    uuid::Uuid::parse_str(raw).map(WorkerId).map_err(|_| AcError::validation("invalid worker id"))
}

#[derive(Debug, Deserialize)]
pub struct CreateWorkerRequest {
    pub workspace: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct GraceQuery {
    pub grace: Option<u64>,
}

fn grace(query: &GraceQuery) -> Duration {
    Duration::from_secs(query.grace.unwrap_or(DEFAULT_GRACE_SECS))
}

pub async fn create_worker(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Json(body): Json<CreateWorkerRequest>,
) -> ApiResult<(StatusCode, Json<WorkerDescriptor>)> {
    match state.create_worker(body.workspace, body.args, body.env).await {
        Ok(descriptor) => Ok((StatusCode::CREATED, Json(descriptor))),
        Err(e) => Err(error_response(&e, &request_id, state.config.dev_mode)),
    }
}

pub async fn get_worker(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> ApiResult<Json<WorkerDescriptor>> {
    let id = parse_worker_id(&id).map_err(|e| error_response(&e, &request_id, state.config.dev_mode))?;
    let entry = state
        .get_worker(id)
        .await
        .ok_or_else(|| AcError::not_found("worker not found"))
        .map_err(|e| error_response(&e, &request_id, state.config.dev_mode))?;
    Ok(Json(entry.descriptor()))
}

pub async fn list_workers(State(state): State<Arc<AppState>>) -> Json<Vec<WorkerDescriptor>> {
    Json(state.list_workers().await)
}

pub async fn stop_worker(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Path(id): Path<String>,
    Query(query): Query<GraceQuery>,
) -> ApiResult<Json<WorkerDescriptor>> {
    let id = parse_worker_id(&id).map_err(|e| error_response(&e, &request_id, state.config.dev_mode))?;
    state
        .stop_worker(id, grace(&query))
        .await
        .map(Json)
        .map_err(|e| error_response(&e, &request_id, state.config.dev_mode))
}

pub async fn restart_worker(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Path(id): Path<String>,
    Query(query): Query<GraceQuery>,
) -> ApiResult<Json<WorkerDescriptor>> {
    let id = parse_worker_id(&id).map_err(|e| error_response(&e, &request_id, state.config.dev_mode))?;
    state
        .restart_worker(id, grace(&query))
        .await
        .map(Json)
        .map_err(|e| error_response(&e, &request_id, state.config.dev_mode))
}

pub async fn delete_worker(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Path(id): Path<String>,
    Query(query): Query<GraceQuery>,
) -> ApiResult<StatusCode> {
    let id = parse_worker_id(&id).map_err(|e| error_response(&e, &request_id, state.config.dev_mode))?;
    state
        .delete_worker(id, grace(&query))
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(|e| error_response(&e, &request_id, state.config.dev_mode))
}

#[cfg(test)]
#[path = "workers_tests.rs"]
mod tests;
