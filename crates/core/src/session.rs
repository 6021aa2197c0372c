// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Opaque session identifier stored in the networked store under `session:{sid}`.
pub type SessionId = String;

/// A stable, non-secret hash identifying a client's platform surface (§3).
///
/// Not a secret — storage is plaintext. Built from the signals the spec
/// names: user-agent family, accept-language, platform hints, and an
/// optional TLS JA3 hint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceFingerprint(pub String);

impl DeviceFingerprint {
    pub fn compute(user_agent_family: &str, accept_language: &str, platform_hint: &str, ja3: Option<&str>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(user_agent_family.as_bytes());
        hasher.update(b"|");
        hasher.update(accept_language.as_bytes());
        hasher.update(b"|");
        hasher.update(platform_hint.as_bytes());
        hasher.update(b"|");
        hasher.update(ja3.unwrap_or("").as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }
}

/// A coarse geographic hint used for implausible-jump detection (§4.L).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoHint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoHint {
    /// Great-circle distance in kilometers (haversine).
    pub fn distance_km(&self, other: &GeoHint) -> f64 {
        const EARTH_RADIUS_KM: f64 = 6371.0;
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let dlat = (other.lat - self.lat).to_radians();
        let dlon = (other.lon - self.lon).to_radians();
        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().asin();
        EARTH_RADIUS_KM * c
    }
}

/// A server-side authenticated context for a user (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: SessionId,
    pub user_id: String,
    pub issued_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub device_fingerprint: DeviceFingerprint,
    pub geo_hint: Option<GeoHint>,
    /// Position of this session in the user's concurrent-session index.
    pub concurrent_index: u32,
}

impl Session {
    /// Admission check: `last_seen <= now <= expires_at` (§8 invariant).
    pub fn is_admissible(&self, now: DateTime<Utc>) -> bool {
        self.last_seen <= now && now <= self.expires_at
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
