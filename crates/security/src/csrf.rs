// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-use CSRF tokens keyed to a session (§4.N). `mint` stores a token
//! under `csrf:{session}:{token}` with the session TTL and returns the
//! value to mirror into a `Secure; HttpOnly; SameSite=Strict` cookie and
//! the `X-CSRF-Token` response header. `verify` consumes the key on
//! success, so a token is usable exactly once.

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;

use crate::backend::KvStore;
use crate::error::SecurityError;

/// Constant-time comparison, used by the double-submit-cookie fallback.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    let mut acc = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        acc |= x ^ y;
    }
    acc == 0
}

fn csrf_key(session_id: &str, token: &str) -> String {
    format!("csrf:{session_id}:{token}")
}

fn random_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

pub struct CsrfGuard {
    store: Arc<dyn KvStore>,
}

impl CsrfGuard {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Mint a fresh token for `session_id`, valid for `ttl`.
    pub async fn mint(&self, session_id: &str, ttl: Duration) -> Result<String, SecurityError> {
        let token = random_token();
        self.store.set_ex(&csrf_key(session_id, &token), "1", ttl).await?;
        Ok(token)
    }

    /// Consume the token for `session_id`; succeeds exactly once per mint.
    pub async fn verify(&self, session_id: &str, token: &str) -> Result<bool, SecurityError> {
        if token.is_empty() {
            return Ok(false);
        }
        let present = self.store.take(&csrf_key(session_id, token)).await?;
        Ok(present.is_some())
    }

    /// Whether `method` is exempt from CSRF enforcement.
    pub fn is_exempt_method(method: &str) -> bool {
        matches!(method.to_ascii_uppercase().as_str(), "GET" | "HEAD" | "OPTIONS")
    }

    /// Double-submit-cookie fallback used when the networked store is
    /// unavailable: compares the submitted token to the cookie mirror in
    /// constant time, without consulting the store.
    pub fn verify_double_submit(cookie_token: &str, submitted_token: &str) -> bool {
        !cookie_token.is_empty() && constant_time_eq(cookie_token, submitted_token)
    }

    /// Origin check: the request's `Origin` header must equal the request
    /// host or one of the configured trusted origins.
    pub fn verify_origin(origin: &str, request_host: &str, trusted_origins: &[String]) -> bool {
        origin == request_host || trusted_origins.iter().any(|o| o == origin)
    }
}

#[cfg(test)]
#[path = "csrf_tests.rs"]
mod tests;
