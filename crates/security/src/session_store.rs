// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Networked session store (§4.K). `expires-at` is written atomically with
//! the session body; `last-seen` updates via best-effort touch and may lag
//! by up to the configured touch interval. `Count(user)` is maintained by a
//! secondary index reconciled on Revoke/Create, with lazy repair on a
//! cardinality mismatch.

use std::sync::Arc;
use std::time::Duration;

use ac_core::session::{DeviceFingerprint, GeoHint, Session};
use chrono::Utc;

use crate::backend::KvStore;
use crate::error::SecurityError;

const DEFAULT_TOUCH_INTERVAL: Duration = Duration::from_secs(30);
const DEFAULT_MAX_SESSIONS_PER_USER: u32 = 10;

fn session_key(sid: &str) -> String {
    format!("session:{sid}")
}

fn user_index_key(user: &str) -> String {
    format!("session:index:{user}")
}

/// CRUD surface over sessions backed by a networked key-value store.
pub struct SessionStore {
    store: Arc<dyn KvStore>,
    ttl: Duration,
    touch_interval: Duration,
    max_sessions_per_user: u32,
}

impl SessionStore {
    pub fn new(store: Arc<dyn KvStore>, ttl: Duration) -> Self {
        Self { store, ttl, touch_interval: DEFAULT_TOUCH_INTERVAL, max_sessions_per_user: DEFAULT_MAX_SESSIONS_PER_USER }
    }

    pub fn with_touch_interval(mut self, interval: Duration) -> Self {
        self.touch_interval = interval;
        self
    }

    pub fn with_max_sessions_per_user(mut self, max: u32) -> Self {
        self.max_sessions_per_user = max;
        self
    }

    /// Create a session for `user_id`, evicting the oldest live sessions
    /// first if the user is already at the concurrent-session limit.
    pub async fn create(
        &self,
        user_id: &str,
        device_fingerprint: DeviceFingerprint,
        geo_hint: Option<GeoHint>,
    ) -> Result<Session, SecurityError> {
        self.enforce_session_limit(user_id).await?;

        let now = Utc::now();
        let session = Session {
            session_id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            issued_at: now,
            last_seen: now,
            expires_at: now + chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::hours(24)),
            device_fingerprint,
            geo_hint,
            concurrent_index: 0,
        };

        let body = serde_json::to_string(&session).map_err(|e| SecurityError::Store(e.to_string()))?;
        self.store.set_ex(&session_key(&session.session_id), &body, self.ttl).await?;
        self.store.sadd(&user_index_key(user_id), &session.session_id).await?;

        Ok(session)
    }

    /// Evicts the oldest live sessions for `user_id` until admitting one
    /// more stays within `max_sessions_per_user`.
    async fn enforce_session_limit(&self, user_id: &str) -> Result<(), SecurityError> {
        if self.max_sessions_per_user == 0 {
            return Ok(());
        }
        let mut sessions = self.list_for_user(user_id).await?;
        if sessions.len() < self.max_sessions_per_user as usize {
            return Ok(());
        }
        sessions.sort_by_key(|s| s.issued_at);
        let evict_count = sessions.len() + 1 - self.max_sessions_per_user as usize;
        for session in sessions.into_iter().take(evict_count) {
            self.revoke(&session.session_id).await?;
        }
        Ok(())
    }

    pub async fn get(&self, sid: &str) -> Result<Option<Session>, SecurityError> {
        match self.store.get(&session_key(sid)).await? {
            Some(body) => {
                let session: Session = serde_json::from_str(&body).map_err(|e| SecurityError::Store(e.to_string()))?;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    /// Best-effort refresh of `last-seen`; may be stale by up to
    /// `touch_interval` under concurrent load.
    pub async fn touch(&self, sid: &str) -> Result<(), SecurityError> {
        let Some(mut session) = self.get(sid).await? else {
            return Err(SecurityError::SessionNotFound);
        };
        session.last_seen = Utc::now();
        let body = serde_json::to_string(&session).map_err(|e| SecurityError::Store(e.to_string()))?;
        self.store.set_ex(&session_key(sid), &body, self.ttl).await?;
        Ok(())
    }

    pub async fn revoke(&self, sid: &str) -> Result<(), SecurityError> {
        if let Some(session) = self.get(sid).await? {
            self.store.srem(&user_index_key(&session.user_id), sid).await?;
        }
        self.store.del(&session_key(sid)).await
    }

    /// Revoke every session for `user`, optionally sparing `except_sid`.
    pub async fn revoke_all_for_user(&self, user: &str, except_sid: Option<&str>) -> Result<u32, SecurityError> {
        let members = self.store.smembers(&user_index_key(user)).await?;
        let mut revoked = 0u32;
        for sid in members {
            if Some(sid.as_str()) == except_sid {
                continue;
            }
            self.store.del(&session_key(&sid)).await?;
            self.store.srem(&user_index_key(user), &sid).await?;
            revoked += 1;
        }
        Ok(revoked)
    }

    /// Every live session for `user`, e.g. for a "your active sessions"
    /// listing. Repairs the index in place like [`SessionStore::count`].
    pub async fn list_for_user(&self, user: &str) -> Result<Vec<Session>, SecurityError> {
        let members = self.store.smembers(&user_index_key(user)).await?;
        let mut sessions = Vec::with_capacity(members.len());
        for sid in &members {
            match self.get(sid).await? {
                Some(session) => sessions.push(session),
                None => {
                    self.store.srem(&user_index_key(user), sid).await?;
                }
            }
        }
        Ok(sessions)
    }

    /// Count of live sessions for `user`. Repairs the index in place if the
    /// cardinality disagrees with the members that still resolve.
    pub async fn count(&self, user: &str) -> Result<u64, SecurityError> {
        let members = self.store.smembers(&user_index_key(user)).await?;
        let mut live = 0u64;
        for sid in &members {
            match self.store.get(&session_key(sid)).await? {
                Some(_) => live += 1,
                None => {
                    self.store.srem(&user_index_key(user), sid).await?;
                }
            }
        }
        Ok(live)
    }

    pub fn touch_interval(&self) -> Duration {
        self.touch_interval
    }
}

#[cfg(test)]
#[path = "session_store_tests.rs"]
mod tests;
