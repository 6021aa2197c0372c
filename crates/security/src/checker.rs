// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Device fingerprint, implausible-location, and suspicion scoring (§4.L).

use std::collections::HashMap;
use std::time::Duration;

use ac_core::session::{DeviceFingerprint, GeoHint, Session};
use parking_lot::Mutex;

/// Outcome of a device fingerprint comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCheck {
    Known,
    NewDevice,
}

const IMPLAUSIBLE_DISTANCE_KM: f64 = 500.0;
const IMPLAUSIBLE_WINDOW: Duration = Duration::from_secs(3600);
const SUSPICION_DECAY_WINDOW: Duration = Duration::from_secs(24 * 3600);
const SUSPICION_THRESHOLD: f64 = 100.0;

struct SuspicionEntry {
    score: f64,
    last_updated: chrono::DateTime<chrono::Utc>,
}

/// Per-session suspicion accumulator and device/location comparison.
pub struct SecurityChecker {
    known_fingerprints: Mutex<HashMap<String, Vec<DeviceFingerprint>>>,
    suspicion: Mutex<HashMap<String, SuspicionEntry>>,
}

impl Default for SecurityChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl SecurityChecker {
    pub fn new() -> Self {
        Self { known_fingerprints: Mutex::new(HashMap::new()), suspicion: Mutex::new(HashMap::new()) }
    }

    /// `Ok` if `current` matches any recently-seen fingerprint for `user`;
    /// otherwise records it and reports `NewDevice` (non-fatal).
    pub fn check_device(&self, user: &str, current: &DeviceFingerprint) -> DeviceCheck {
        let mut known = self.known_fingerprints.lock();
        let entries = known.entry(user.to_string()).or_default();
        if entries.contains(current) {
            return DeviceCheck::Known;
        }
        entries.push(current.clone());
        if entries.len() > 10 {
            entries.remove(0);
        }
        DeviceCheck::NewDevice
    }

    /// Flags a jump further than [`IMPLAUSIBLE_DISTANCE_KM`] within less
    /// than [`IMPLAUSIBLE_WINDOW`] of the session's prior location.
    pub fn check_location(&self, session: &Session, current: GeoHint) -> bool {
        let Some(previous) = session.geo_hint else {
            return false;
        };
        let elapsed = chrono::Utc::now().signed_duration_since(session.last_seen);
        let Ok(elapsed) = elapsed.to_std() else {
            return false;
        };
        elapsed < IMPLAUSIBLE_WINDOW && previous.distance_km(&current) > IMPLAUSIBLE_DISTANCE_KM
    }

    /// Add `signal` to the session's suspicion score, decaying linearly to
    /// zero over 24h since the last update. Returns true once the
    /// accumulated score crosses the threshold.
    pub fn suspicion(&self, session_id: &str, signal: f64) -> bool {
        let now = chrono::Utc::now();
        let mut suspicion = self.suspicion.lock();
        let entry = suspicion.entry(session_id.to_string()).or_insert(SuspicionEntry { score: 0.0, last_updated: now });

        let elapsed = now.signed_duration_since(entry.last_updated).to_std().unwrap_or(Duration::ZERO);
        let decay_fraction = (elapsed.as_secs_f64() / SUSPICION_DECAY_WINDOW.as_secs_f64()).min(1.0);
        entry.score = (entry.score * (1.0 - decay_fraction)).max(0.0);
        entry.score += signal;
        entry.last_updated = now;

        entry.score >= SUSPICION_THRESHOLD
    }

    pub fn suspicion_score(&self, session_id: &str) -> f64 {
        self.suspicion.lock().get(session_id).map(|e| e.score).unwrap_or(0.0)
    }
}

#[cfg(test)]
#[path = "checker_tests.rs"]
mod tests;
