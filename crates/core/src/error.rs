// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Unified error kind shared across the HTTP and WebSocket surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Config,
    Network,
    FileSystem,
    Process,
    Auth,
    Permission,
    NotFound,
    Conflict,
    RateLimited,
    Csrf,
    Attack,
    Internal,
}

impl ErrorKind {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation => 400,
            Self::Config => 500,
            Self::Network => 502,
            Self::FileSystem => 500,
            Self::Process => 500,
            Self::Auth => 401,
            Self::Permission => 403,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::RateLimited => 429,
            Self::Csrf => 403,
            Self::Attack => 403,
            Self::Internal => 500,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION",
            Self::Config => "CONFIG",
            Self::Network => "NETWORK",
            Self::FileSystem => "FILESYSTEM",
            Self::Process => "PROCESS",
            Self::Auth => "AUTH",
            Self::Permission => "PERMISSION",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::RateLimited => "RATE_LIMITED",
            Self::Csrf => "CSRF",
            Self::Attack => "ATTACK",
            Self::Internal => "INTERNAL",
        }
    }

    /// Errors that are recovered locally (retried, slow-policy'd) rather
    /// than surfaced verbatim to a caller.
    pub fn is_locally_recoverable(&self) -> bool {
        matches!(self, Self::Network | Self::Process)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified error type carried end-to-end through the control plane.
///
/// Attack and rate-limit details are only populated when explicitly
/// user-actionable (§7) — callers should not assume `details` is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcError {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub context: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub remediation: Vec<String>,
}

impl AcError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), context: BTreeMap::new(), remediation: Vec::new() }
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn with_remediation(mut self, hint: impl Into<String>) -> Self {
        self.remediation.push(hint.into());
        self
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn http_status(&self) -> u16 {
        self.kind.http_status()
    }
}

impl fmt::Display for AcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for AcError {}

/// Wire-format error envelope: `{success:false, error:{code, message, request_id, details?}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorEnvelope {
    /// Build a response envelope. `details` is only attached by the caller
    /// in dev mode or for explicitly user-actionable kinds (§7) — this
    /// constructor does not decide that policy itself.
    pub fn new(err: &AcError, request_id: impl Into<String>, details: Option<serde_json::Value>) -> Self {
        Self {
            success: false,
            error: ErrorBody {
                code: err.kind.as_str().to_owned(),
                message: err.message.clone(),
                request_id: request_id.into(),
                details,
            },
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
