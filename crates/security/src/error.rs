// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

/// Errors surfaced by the session/rate-limit/CSRF/audit surface.
#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("store operation timed out")]
    StoreTimeout,
    #[error("store error: {0}")]
    Store(String),
    #[error("session not found")]
    SessionNotFound,
    #[error("csrf validation failed: {0}")]
    Csrf(&'static str),
    #[error("rate limit exceeded on layer {0}")]
    RateLimited(&'static str),
}

impl From<redis::RedisError> for SecurityError {
    fn from(e: redis::RedisError) -> Self {
        Self::Store(e.to_string())
    }
}

impl From<SecurityError> for ac_core::error::AcError {
    fn from(e: SecurityError) -> Self {
        use ac_core::error::ErrorKind;
        match e {
            SecurityError::StoreTimeout => Self::new(ErrorKind::Network, "security store timed out"),
            SecurityError::Store(msg) => Self::new(ErrorKind::Network, msg),
            SecurityError::SessionNotFound => Self::new(ErrorKind::Auth, "session not found"),
            SecurityError::Csrf(msg) => Self::new(ErrorKind::Csrf, msg),
            SecurityError::RateLimited(layer) => Self::new(ErrorKind::RateLimited, format!("rate limited on layer {layer}")),
        }
    }
}
