// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Security observability and on-demand detection surface (§4.K, §6).

use std::sync::Arc;

use ac_security::{evaluate, RequestSurface};
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<usize>,
}

pub async fn list_events(State(state): State<Arc<AppState>>, Query(query): Query<RecentQuery>) -> Json<Vec<serde_json::Value>> {
    Json(state.security_events.recent(query.limit.unwrap_or(100)))
}

pub async fn statistics(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(state.security_stats.snapshot())
}

#[derive(Debug, Deserialize)]
pub struct DetectAttackRequest {
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub user_agent: String,
    #[serde(default)]
    pub body: String,
}

pub async fn detect_attack(Json(body): Json<DetectAttackRequest>) -> Json<serde_json::Value> {
    let surface = RequestSurface {
        method: &body.method,
        url: &body.url,
        path: &body.path,
        query: &body.query,
        headers: &[],
        user_agent: &body.user_agent,
        body: &body.body,
    };
    let verdict = evaluate(&surface);
    let findings: Vec<serde_json::Value> = verdict
        .findings
        .iter()
        .map(|f| serde_json::json!({"detector": f.detector, "confidence": f.confidence, "evidence": f.evidence}))
        .collect();
    Json(serde_json::json!({"is_attack": verdict.is_attack, "findings": findings}))
}

#[cfg(test)]
#[path = "security_api_tests.rs"]
mod tests;
