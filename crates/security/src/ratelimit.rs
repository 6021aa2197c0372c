// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Four-layer sliding-window rate limiter backed by sorted sets (§4.M).
//! Each request inserts a (timestamp, nonce) member into a sorted set keyed
//! by layer and key; expired members are pruned on access; the cardinality
//! is the current count. A request is allowed only if every layer is under
//! its limit. IP/user whitelists short-circuit all layers; a per-IP
//! violation counter escalates to a timed block consulted before anything
//! else.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use chrono::Utc;

use crate::backend::KvStore;
use crate::error::SecurityError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    Global,
    Ip,
    Endpoint,
    User,
}

impl Layer {
    fn as_str(self) -> &'static str {
        match self {
            Layer::Global => "global",
            Layer::Ip => "ip",
            Layer::Endpoint => "endpoint",
            Layer::User => "user",
        }
    }
}

const LAYER_ORDER: [Layer; 4] = [Layer::Global, Layer::Ip, Layer::Endpoint, Layer::User];

#[derive(Debug, Clone, Copy)]
pub struct LayerConfig {
    pub limit: u64,
    pub window: Duration,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self { limit: 1000, window: Duration::from_secs(60) }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LayerStatus {
    pub limit: u64,
    pub remaining: u64,
    pub reset_secs: u64,
}

#[derive(Debug, Clone)]
pub struct Decision {
    pub allowed: bool,
    pub blocked: bool,
    pub statuses: HashMap<Layer, LayerStatus>,
}

pub struct RateLimiterConfig {
    pub layers: HashMap<Layer, LayerConfig>,
    pub violation_threshold: u32,
    pub violation_window: Duration,
    pub block_duration: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        let mut layers = HashMap::new();
        layers.insert(Layer::Global, LayerConfig { limit: 10_000, window: Duration::from_secs(60) });
        layers.insert(Layer::Ip, LayerConfig { limit: 300, window: Duration::from_secs(60) });
        layers.insert(Layer::Endpoint, LayerConfig { limit: 600, window: Duration::from_secs(60) });
        layers.insert(Layer::User, LayerConfig { limit: 300, window: Duration::from_secs(60) });
        Self {
            layers,
            violation_threshold: 10,
            violation_window: Duration::from_secs(300),
            block_duration: Duration::from_secs(900),
        }
    }
}

fn rate_limit_key(layer: Layer, key: &str) -> String {
    format!("rate_limit:{}:{}", layer.as_str(), key)
}

fn blocked_ip_key(ip: &str) -> String {
    format!("blocked:ip:{ip}")
}

fn suspicious_ip_key(ip: &str) -> String {
    format!("suspicious:ip:{ip}")
}

pub struct RateLimiter {
    store: std::sync::Arc<dyn KvStore>,
    config: RateLimiterConfig,
    whitelist_ips: HashSet<String>,
    whitelist_users: HashSet<String>,
}

impl RateLimiter {
    pub fn new(store: std::sync::Arc<dyn KvStore>, config: RateLimiterConfig) -> Self {
        Self { store, config, whitelist_ips: HashSet::new(), whitelist_users: HashSet::new() }
    }

    pub fn with_whitelists(mut self, ips: HashSet<String>, users: HashSet<String>) -> Self {
        self.whitelist_ips = ips;
        self.whitelist_users = users;
        self
    }

    /// Evaluate every layer for a request; short-circuits on a whitelist
    /// match or an active IP block.
    pub async fn check(&self, ip: &str, user: Option<&str>, endpoint: &str) -> Result<Decision, SecurityError> {
        if self.store.get(&blocked_ip_key(ip)).await?.is_some() {
            return Ok(Decision { allowed: false, blocked: true, statuses: HashMap::new() });
        }

        let whitelisted = self.whitelist_ips.contains(ip) || user.is_some_and(|u| self.whitelist_users.contains(u));
        if whitelisted {
            return Ok(Decision { allowed: true, blocked: false, statuses: HashMap::new() });
        }

        let mut statuses = HashMap::new();
        let mut allowed = true;

        for layer in LAYER_ORDER {
            let key = match layer {
                Layer::Global => "all".to_string(),
                Layer::Ip => ip.to_string(),
                Layer::Endpoint => endpoint.to_string(),
                Layer::User => match user {
                    Some(u) => u.to_string(),
                    None => continue,
                },
            };
            let config = *self.config.layers.get(&layer).unwrap_or(&LayerConfig::default());
            let status = self.check_layer(layer, &key, config).await?;
            if status.remaining == 0 {
                allowed = false;
            }
            statuses.insert(layer, status);
        }

        if !allowed {
            self.record_violation(ip).await?;
        }

        Ok(Decision { allowed, blocked: false, statuses })
    }

    async fn check_layer(&self, layer: Layer, key: &str, config: LayerConfig) -> Result<LayerStatus, SecurityError> {
        let store_key = rate_limit_key(layer, key);
        let now = Utc::now().timestamp_millis() as f64;
        let window_start = now - config.window.as_millis() as f64;

        self.store.zremrangebyscore(&store_key, f64::MIN, window_start).await?;
        let nonce = format!("{now}:{}", uuid::Uuid::new_v4());
        self.store.zadd(&store_key, &nonce, now).await?;
        self.store.expire(&store_key, config.window).await?;
        let count = self.store.zcard(&store_key).await?;

        let remaining = config.limit.saturating_sub(count);
        Ok(LayerStatus { limit: config.limit, remaining, reset_secs: config.window.as_secs() })
    }

    async fn record_violation(&self, ip: &str) -> Result<(), SecurityError> {
        let count = self.store.incr(&suspicious_ip_key(ip), self.config.violation_window).await?;
        if count as u32 >= self.config.violation_threshold {
            self.store
                .set_ex(&blocked_ip_key(ip), "1", self.config.block_duration)
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "ratelimit_tests.rs"]
mod tests;
