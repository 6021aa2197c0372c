// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The networked key-value service backing sessions, rate limits, and CSRF
//! tokens (§4.K/M/N, §5). `RedisStore` talks to Redis with
//! `ConnectionManager`; `InMemoryStore` backs unit tests and the
//! per-process fallback used when the networked store times out.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;

use crate::error::SecurityError;

/// Minimal networked key-value surface this crate depends on. Every method
/// takes an explicit timeout; callers are expected to fall back to an
/// in-process store on [`SecurityError::StoreTimeout`].
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), SecurityError>;
    async fn get(&self, key: &str) -> Result<Option<String>, SecurityError>;
    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), SecurityError>;
    async fn del(&self, key: &str) -> Result<(), SecurityError>;
    /// Atomically set the key only if absent (used for single-use tokens).
    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, SecurityError>;
    /// Consume (get + delete) a single-use key.
    async fn take(&self, key: &str) -> Result<Option<String>, SecurityError>;

    async fn sadd(&self, key: &str, member: &str) -> Result<(), SecurityError>;
    async fn srem(&self, key: &str, member: &str) -> Result<(), SecurityError>;
    async fn scard(&self, key: &str) -> Result<u64, SecurityError>;
    async fn smembers(&self, key: &str) -> Result<Vec<String>, SecurityError>;

    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<(), SecurityError>;
    async fn zremrangebyscore(&self, key: &str, min: f64, max: f64) -> Result<(), SecurityError>;
    async fn zcard(&self, key: &str) -> Result<u64, SecurityError>;
    async fn incr(&self, key: &str, ttl: Duration) -> Result<u64, SecurityError>;
}

/// Redis-backed implementation using a cloneable `ConnectionManager`.
#[derive(Clone)]
pub struct RedisStore {
    conn: redis::aio::ConnectionManager,
}

impl RedisStore {
    pub fn new(conn: redis::aio::ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), SecurityError> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1)).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, SecurityError> {
        let mut conn = self.conn.clone();
        Ok(conn.get(key).await?)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), SecurityError> {
        let mut conn = self.conn.clone();
        conn.expire::<_, ()>(key, ttl.as_secs().max(1) as i64).await?;
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), SecurityError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await?;
        Ok(())
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, SecurityError> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn take(&self, key: &str) -> Result<Option<String>, SecurityError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        if value.is_some() {
            conn.del::<_, ()>(key).await?;
        }
        Ok(value)
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<(), SecurityError> {
        let mut conn = self.conn.clone();
        conn.sadd::<_, _, ()>(key, member).await?;
        Ok(())
    }

    async fn srem(&self, key: &str, member: &str) -> Result<(), SecurityError> {
        let mut conn = self.conn.clone();
        conn.srem::<_, _, ()>(key, member).await?;
        Ok(())
    }

    async fn scard(&self, key: &str) -> Result<u64, SecurityError> {
        let mut conn = self.conn.clone();
        Ok(conn.scard(key).await?)
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, SecurityError> {
        let mut conn = self.conn.clone();
        Ok(conn.smembers(key).await?)
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<(), SecurityError> {
        let mut conn = self.conn.clone();
        conn.zadd::<_, _, _, ()>(key, member, score).await?;
        Ok(())
    }

    async fn zremrangebyscore(&self, key: &str, min: f64, max: f64) -> Result<(), SecurityError> {
        let mut conn = self.conn.clone();
        conn.zremrangebyscore::<_, _, _, ()>(key, min, max).await?;
        Ok(())
    }

    async fn zcard(&self, key: &str) -> Result<u64, SecurityError> {
        let mut conn = self.conn.clone();
        Ok(conn.zcard(key).await?)
    }

    async fn incr(&self, key: &str, ttl: Duration) -> Result<u64, SecurityError> {
        let mut conn = self.conn.clone();
        let count: u64 = conn.incr(key, 1u64).await?;
        if count == 1 {
            conn.expire::<_, ()>(key, ttl.as_secs().max(1) as i64).await?;
        }
        Ok(count)
    }
}

struct Entry {
    value: String,
    expires_at: Option<std::time::Instant>,
}

#[derive(Default)]
struct MemState {
    strings: HashMap<String, Entry>,
    sets: HashMap<String, std::collections::HashSet<String>>,
    zsets: HashMap<String, BTreeMap<String, f64>>,
    counters: HashMap<String, (u64, Option<std::time::Instant>)>,
}

/// In-process store used for unit tests and as the fallback when the
/// networked store times out.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: std::sync::Arc<parking_lot::Mutex<MemState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn is_live(entry: &Entry) -> bool {
        entry.expires_at.is_none_or(|t| std::time::Instant::now() < t)
    }
}

#[async_trait]
impl KvStore for InMemoryStore {
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), SecurityError> {
        let mut state = self.state.lock();
        state.strings.insert(
            key.to_string(),
            Entry { value: value.to_string(), expires_at: Some(std::time::Instant::now() + ttl) },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, SecurityError> {
        let mut state = self.state.lock();
        if let Some(entry) = state.strings.get(key) {
            if Self::is_live(entry) {
                return Ok(Some(entry.value.clone()));
            }
        }
        state.strings.remove(key);
        Ok(None)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), SecurityError> {
        let mut state = self.state.lock();
        if let Some(entry) = state.strings.get_mut(key) {
            entry.expires_at = Some(std::time::Instant::now() + ttl);
        }
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), SecurityError> {
        self.state.lock().strings.remove(key);
        Ok(())
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, SecurityError> {
        let mut state = self.state.lock();
        let occupied = state.strings.get(key).is_some_and(Self::is_live);
        if occupied {
            return Ok(false);
        }
        state.strings.insert(
            key.to_string(),
            Entry { value: value.to_string(), expires_at: Some(std::time::Instant::now() + ttl) },
        );
        Ok(true)
    }

    async fn take(&self, key: &str) -> Result<Option<String>, SecurityError> {
        let mut state = self.state.lock();
        match state.strings.remove(key) {
            Some(entry) if Self::is_live(&entry) => Ok(Some(entry.value)),
            _ => Ok(None),
        }
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<(), SecurityError> {
        self.state.lock().sets.entry(key.to_string()).or_default().insert(member.to_string());
        Ok(())
    }

    async fn srem(&self, key: &str, member: &str) -> Result<(), SecurityError> {
        if let Some(set) = self.state.lock().sets.get_mut(key) {
            set.remove(member);
        }
        Ok(())
    }

    async fn scard(&self, key: &str) -> Result<u64, SecurityError> {
        Ok(self.state.lock().sets.get(key).map(|s| s.len() as u64).unwrap_or(0))
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, SecurityError> {
        Ok(self.state.lock().sets.get(key).map(|s| s.iter().cloned().collect()).unwrap_or_default())
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<(), SecurityError> {
        self.state.lock().zsets.entry(key.to_string()).or_default().insert(member.to_string(), score);
        Ok(())
    }

    async fn zremrangebyscore(&self, key: &str, min: f64, max: f64) -> Result<(), SecurityError> {
        if let Some(zset) = self.state.lock().zsets.get_mut(key) {
            zset.retain(|_, score| *score < min || *score > max);
        }
        Ok(())
    }

    async fn zcard(&self, key: &str) -> Result<u64, SecurityError> {
        Ok(self.state.lock().zsets.get(key).map(|z| z.len() as u64).unwrap_or(0))
    }

    async fn incr(&self, key: &str, ttl: Duration) -> Result<u64, SecurityError> {
        let mut state = self.state.lock();
        let now = std::time::Instant::now();
        let entry = state.counters.entry(key.to_string()).or_insert((0, None));
        if entry.1.is_some_and(|t| now >= t) {
            *entry = (0, None);
        }
        entry.0 += 1;
        if entry.1.is_none() {
            entry.1 = Some(now + ttl);
        }
        Ok(entry.0)
    }
}

#[cfg(test)]
#[path = "backend_tests.rs"]
mod tests;
