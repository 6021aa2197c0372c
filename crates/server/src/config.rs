// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

/// Log output format, selectable independently of the env-filter level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    Json,
    Text,
}

/// Configuration for the `ac-server` binary.
///
/// CLI flags override environment variables which override the defaults
/// below, following the teacher's `Config`/`MuxConfig` convention.
#[derive(Debug, Clone, clap::Parser)]
#[command(name = "ac-server", version, about = "AI coding worker control plane")]
pub struct ServerConfig {
    /// Host to bind on.
    #[arg(long, default_value = "127.0.0.1", env = "AC_SERVER_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 8080, env = "AC_SERVER_PORT")]
    pub port: u16,

    /// Redis connection URL. If unset, the in-process store is used, which
    /// does not survive a restart and does not coordinate across replicas.
    #[arg(long, env = "AC_SERVER_REDIS_URL")]
    pub redis_url: Option<String>,

    /// Log format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text, env = "AC_SERVER_LOG_FORMAT")]
    pub log_format: LogFormat,

    /// Suppresses strict security response headers and allows error
    /// `details` in responses (§7).
    #[arg(long, env = "AC_SERVER_DEV_MODE")]
    pub dev_mode: bool,

    /// Shell command template used to spawn a worker's child process when a
    /// create request does not name one explicitly.
    #[arg(long, env = "AC_SERVER_WORKER_COMMAND")]
    pub worker_command: Option<String>,

    /// Session TTL in seconds.
    #[arg(long, default_value_t = 86_400, env = "AC_SERVER_SESSION_TTL_SECS")]
    pub session_ttl_secs: u64,

    /// Maximum concurrent sessions per user; the oldest is evicted on an
    /// overage (§3 Session invariant).
    #[arg(long, default_value_t = 10, env = "AC_SERVER_MAX_SESSIONS_PER_USER")]
    pub max_sessions_per_user: u32,

    /// Per-call timeout against the networked store, in milliseconds (§5).
    #[arg(long, default_value_t = 200, env = "AC_SERVER_STORE_TIMEOUT_MS")]
    pub store_timeout_ms: u64,

    /// Global request budget per window.
    #[arg(long, default_value_t = 10_000, env = "AC_SERVER_RATE_LIMIT_GLOBAL")]
    pub rate_limit_global: u64,

    /// Per-IP request budget per window.
    #[arg(long, default_value_t = 300, env = "AC_SERVER_RATE_LIMIT_IP")]
    pub rate_limit_ip: u64,

    /// Per-endpoint request budget per window.
    #[arg(long, default_value_t = 600, env = "AC_SERVER_RATE_LIMIT_ENDPOINT")]
    pub rate_limit_endpoint: u64,

    /// Per-user request budget per window.
    #[arg(long, default_value_t = 300, env = "AC_SERVER_RATE_LIMIT_USER")]
    pub rate_limit_user: u64,

    /// Rate-limit window, in seconds, shared by every layer.
    #[arg(long, default_value_t = 60, env = "AC_SERVER_RATE_LIMIT_WINDOW_SECS")]
    pub rate_limit_window_secs: u64,

    /// Consecutive violations from one IP before it is blocked outright.
    #[arg(long, default_value_t = 10, env = "AC_SERVER_VIOLATION_THRESHOLD")]
    pub violation_threshold: u32,

    /// How long an IP stays blocked after crossing the violation threshold.
    #[arg(long, default_value_t = 900, env = "AC_SERVER_BLOCK_DURATION_SECS")]
    pub block_duration_secs: u64,

    /// CSRF token TTL in seconds.
    #[arg(long, default_value_t = 3_600, env = "AC_SERVER_CSRF_TTL_SECS")]
    pub csrf_ttl_secs: u64,

    /// Additional origins trusted by the CSRF guard, beyond the request host.
    #[arg(long, value_delimiter = ',', env = "AC_SERVER_TRUSTED_ORIGINS")]
    pub trusted_origins: Vec<String>,

    /// Audit batch size before a background flush.
    #[arg(long, default_value_t = 100, env = "AC_SERVER_AUDIT_BATCH_SIZE")]
    pub audit_batch_size: usize,

    /// Audit flush interval in seconds.
    #[arg(long, default_value_t = 10, env = "AC_SERVER_AUDIT_FLUSH_INTERVAL_SECS")]
    pub audit_flush_interval_secs: u64,
}

impl ServerConfig {
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn csrf_ttl(&self) -> Duration {
        Duration::from_secs(self.csrf_ttl_secs)
    }

    pub fn rate_limiter_config(&self) -> ac_security::RateLimiterConfig {
        use ac_security::{Layer, LayerConfig};
        let window = Duration::from_secs(self.rate_limit_window_secs);
        let mut layers = std::collections::HashMap::new();
        layers.insert(Layer::Global, LayerConfig { limit: self.rate_limit_global, window });
        layers.insert(Layer::Ip, LayerConfig { limit: self.rate_limit_ip, window });
        layers.insert(Layer::Endpoint, LayerConfig { limit: self.rate_limit_endpoint, window });
        layers.insert(Layer::User, LayerConfig { limit: self.rate_limit_user, window });
        ac_security::RateLimiterConfig {
            layers,
            violation_threshold: self.violation_threshold,
            violation_window: window,
            block_duration: Duration::from_secs(self.block_duration_secs),
        }
    }

    pub fn audit_config(&self) -> ac_security::AuditPipelineConfig {
        ac_security::AuditPipelineConfig {
            batch_size: self.audit_batch_size,
            flush_interval: Duration::from_secs(self.audit_flush_interval_secs),
            ..ac_security::AuditPipelineConfig::default()
        }
    }
}
