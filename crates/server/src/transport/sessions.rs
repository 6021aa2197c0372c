// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session self-service surface (§4.K, §6), scoped to the authenticated
//! caller: list active sessions, revoke one, or sign out everywhere else.

use std::sync::Arc;

use ac_core::error::AcError;
use ac_core::session::Session;
use axum::extract::{Extension, Path, State};
use axum::Json;
use serde::Serialize;

use crate::error::{error_response, ApiResult, RequestId};
use crate::state::{AppState, CurrentUser};

fn require_user(user: &CurrentUser) -> Result<&str, AcError> {
    user.user_id.as_deref().ok_or_else(|| AcError::new(ac_core::error::ErrorKind::Auth, "no active session"))
}

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session_id: String,
    pub issued_at: chrono::DateTime<chrono::Utc>,
    pub last_seen: chrono::DateTime<chrono::Utc>,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    pub current: bool,
}

fn to_view(session: Session, current_sid: Option<&str>) -> SessionView {
    let current = current_sid == Some(session.session_id.as_str());
    SessionView { session_id: session.session_id, issued_at: session.issued_at, last_seen: session.last_seen, expires_at: session.expires_at, current }
}

pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Json<Vec<SessionView>>> {
    let user_id = require_user(&user).map_err(|e| error_response(&e, &request_id, state.config.dev_mode))?;
    let sessions = state
        .sessions
        .list_for_user(user_id)
        .await
        .map_err(|e| error_response(&e.into(), &request_id, state.config.dev_mode))?;
    let views = sessions.into_iter().map(|s| to_view(s, user.session_id.as_deref())).collect();
    Ok(Json(views))
}

pub async fn revoke_session(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(sid): Path<String>,
) -> ApiResult<axum::http::StatusCode> {
    let user_id = require_user(&user).map_err(|e| error_response(&e, &request_id, state.config.dev_mode))?;
    let session = state
        .sessions
        .get(&sid)
        .await
        .map_err(|e| error_response(&e.into(), &request_id, state.config.dev_mode))?
        .ok_or_else(|| error_response(&AcError::not_found("session not found"), &request_id, state.config.dev_mode))?;

    if session.user_id != user_id {
        return Err(error_response(&AcError::new(ac_core::error::ErrorKind::Permission, "not your session"), &request_id, state.config.dev_mode));
    }

    state.sessions.revoke(&sid).await.map_err(|e| error_response(&e.into(), &request_id, state.config.dev_mode))?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct TerminateOthersResponse {
    pub revoked: u32,
}

pub async fn terminate_others(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Json<TerminateOthersResponse>> {
    let user_id = require_user(&user).map_err(|e| error_response(&e, &request_id, state.config.dev_mode))?;
    let revoked = state
        .sessions
        .revoke_all_for_user(user_id, user.session_id.as_deref())
        .await
        .map_err(|e| error_response(&e.into(), &request_id, state.config.dev_mode))?;
    Ok(Json(TerminateOthersResponse { revoked }))
}

#[cfg(test)]
#[path = "sessions_tests.rs"]
mod tests;
