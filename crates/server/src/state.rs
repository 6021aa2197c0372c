// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared server state: the worker registry plus every `ac-security`
//! component wired to a common store, mirroring the teacher's `MuxState`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ac_core::error::AcError;
use ac_core::worker::{Invocation, WorkerDescriptor, WorkerId, WorkerState};
use ac_security::{AuditPipeline, CsrfGuard, InMemoryStore, KvStore, RateLimiter, RedisStore, SecurityChecker, SessionStore};
use ac_stream::StreamHandler;
use ac_supervisor::backoff::BackoffConfig;
use ac_supervisor::breaker::BreakerConfig;
use ac_supervisor::recovery::{Directive, RecoveryManager, RecoveryMetrics};
use ac_supervisor::supervisor::{StopReason, Supervisor};
use parking_lot::RwLock as SyncRwLock;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;

/// The user attached by the security gate once a session validates;
/// `None` for anonymous requests. Read by handlers via `Extension`.
#[derive(Debug, Clone, Default)]
pub struct CurrentUser {
    pub user_id: Option<String>,
    pub session_id: Option<String>,
}

/// One supervised worker plus the stream handler bound to its stdio.
pub struct WorkerEntry {
    pub id: WorkerId,
    pub workspace: String,
    pub invocation: Invocation,
    pub supervisor: Arc<Supervisor>,
    pub recovery: RecoveryManager,
    pub stream: RwLock<Option<Arc<StreamHandler>>>,
}

impl WorkerEntry {
    pub fn descriptor(&self) -> WorkerDescriptor {
        WorkerDescriptor {
            id: self.id,
            workspace: self.workspace.clone(),
            state: self.supervisor.status(),
            pid: self.supervisor.pid(),
            started_at: self.supervisor.started_at(),
            restart_count: self.supervisor.restart_count(),
            last_error: self.supervisor.last_error(),
        }
    }

    pub fn metrics(&self) -> RecoveryMetrics {
        self.recovery.metrics()
    }
}

/// Shared application state, constructed once at bootstrap and handed to
/// every request via axum's `State` extractor.
pub struct AppState {
    pub config: ServerConfig,
    pub store: Arc<dyn KvStore>,
    pub workers: RwLock<HashMap<WorkerId, Arc<WorkerEntry>>>,
    pub sessions: SessionStore,
    pub checker: SecurityChecker,
    pub rate_limiter: RateLimiter,
    /// In-process limiter consulted when the networked store times out
    /// (§5), backed by its own store so a slow Redis never throttles it too.
    pub fallback_rate_limiter: RateLimiter,
    pub csrf: CsrfGuard,
    pub audit: Arc<AuditPipeline>,
    pub shutdown: CancellationToken,
    pub security_events: SecurityEventLog,
    pub security_stats: SecurityStatistics,
}

impl AppState {
    /// Build state from config, connecting to Redis when a URL is
    /// configured and falling back to the in-process store otherwise
    /// (development mode, or tests).
    pub async fn new(config: ServerConfig) -> anyhow::Result<Arc<Self>> {
        let store: Arc<dyn KvStore> = match &config.redis_url {
            Some(url) => {
                let client = redis::Client::open(url.as_str())?;
                let conn = client.get_connection_manager().await?;
                Arc::new(RedisStore::new(conn))
            }
            None => {
                tracing::warn!("no AC_SERVER_REDIS_URL configured, using in-process store");
                Arc::new(InMemoryStore::new())
            }
        };

        let sessions = SessionStore::new(Arc::clone(&store), config.session_ttl()).with_max_sessions_per_user(config.max_sessions_per_user);
        let rate_limiter = RateLimiter::new(Arc::clone(&store), config.rate_limiter_config());
        let fallback_rate_limiter = RateLimiter::new(Arc::new(InMemoryStore::new()), config.rate_limiter_config());
        let csrf = CsrfGuard::new(Arc::clone(&store));
        let audit = AuditPipeline::new(Arc::clone(&store), config.audit_config());
        audit.spawn_flusher();

        Ok(Arc::new(Self {
            config,
            store,
            workers: RwLock::new(HashMap::new()),
            sessions,
            checker: SecurityChecker::new(),
            rate_limiter,
            fallback_rate_limiter,
            csrf,
            audit,
            shutdown: CancellationToken::new(),
            security_events: SecurityEventLog::default(),
            security_stats: SecurityStatistics::default(),
        }))
    }

    /// Create and start a new worker, wiring its stdio into a fresh
    /// `StreamHandler` and spawning the watcher task that drives recovery
    /// on unexpected exit (§4.I).
    pub async fn create_worker(
        self: &Arc<Self>,
        workspace: String,
        args: Vec<String>,
        env: HashMap<String, String>,
    ) -> Result<WorkerDescriptor, AcError> {
        let command = self
            .config
            .worker_command
            .clone()
            .ok_or_else(|| AcError::validation("no worker command configured (AC_SERVER_WORKER_COMMAND)"))?;

        let invocation = Invocation { command, args, workspace: workspace.clone(), env };

        let supervisor = Supervisor::new();
        let recovery = RecoveryManager::new(
            Arc::clone(&supervisor),
            BackoffConfig::default(),
            BreakerConfig::default(),
            5,
        );

        let entry = Arc::new(WorkerEntry {
            id: WorkerId::new(),
            workspace,
            invocation: invocation.clone(),
            supervisor,
            recovery,
            stream: RwLock::new(None),
        });

        self.spawn_and_watch(Arc::clone(&entry), invocation).await?;

        let descriptor = entry.descriptor();
        self.workers.write().await.insert(entry.id, entry);
        Ok(descriptor)
    }

    async fn spawn_and_watch(self: &Arc<Self>, entry: Arc<WorkerEntry>, invocation: Invocation) -> Result<(), AcError> {
        let (stdio, exit_rx) = entry
            .supervisor
            .start(invocation)
            .await
            .map_err(|e| AcError::new(ac_core::error::ErrorKind::Process, e.to_string()))?;
        self.wire_stdio(&entry, stdio, exit_rx).await;
        Ok(())
    }

    async fn wire_stdio(
        self: &Arc<Self>,
        entry: &Arc<WorkerEntry>,
        stdio: ac_supervisor::supervisor::WorkerStdio,
        exit_rx: tokio::sync::oneshot::Receiver<StopReason>,
    ) {
        if let (Some(stdin), Some(stdout), Some(stderr)) = (stdio.stdin, stdio.stdout, stdio.stderr) {
            let handler = StreamHandler::start(stdout, stderr, stdin, 64 * 1024);
            *entry.stream.write().await = Some(handler);
        }

        let state = Arc::clone(self);
        let watched = Arc::clone(entry);
        tokio::spawn(async move {
            if let Ok(reason) = exit_rx.await {
                state.on_worker_exit(watched, reason).await;
            }
        });
    }

    /// Reacts to a worker's termination: a commanded stop is left as-is; an
    /// unexpected crash is classified and, per the Recovery Manager's
    /// directive, retried, restarted, or left in `Error` (§4.I, §9).
    async fn on_worker_exit(self: Arc<Self>, entry: Arc<WorkerEntry>, reason: StopReason) {
        if reason == StopReason::StoppedByRequest {
            return;
        }

        let error_text = entry.supervisor.last_error().unwrap_or_default();
        match entry.recovery.handle_error(&error_text) {
            Directive::Restart => {
                let invocation = entry.invocation.clone();
                match entry.recovery.restart(invocation, Duration::from_secs(10)).await {
                    Ok((stdio, exit_rx)) => self.wire_stdio(&entry, stdio, exit_rx).await,
                    Err(e) => tracing::warn!(worker = %entry.id, error = %e, "automatic restart failed"),
                }
            }
            Directive::Retry | Directive::Ignore => {
                tracing::debug!(worker = %entry.id, "worker exited, recovery directive was non-restart");
            }
            Directive::Fail => {
                tracing::warn!(worker = %entry.id, "worker failed permanently");
            }
        }
    }

    pub async fn get_worker(&self, id: WorkerId) -> Option<Arc<WorkerEntry>> {
        self.workers.read().await.get(&id).cloned()
    }

    pub async fn list_workers(&self) -> Vec<WorkerDescriptor> {
        self.workers.read().await.values().map(|w| w.descriptor()).collect()
    }

    pub async fn stop_worker(&self, id: WorkerId, grace: Duration) -> Result<WorkerDescriptor, AcError> {
        let entry = self.get_worker(id).await.ok_or_else(|| AcError::not_found("worker not found"))?;
        entry.supervisor.stop(grace).await.map_err(|e| AcError::new(ac_core::error::ErrorKind::Process, e.to_string()))?;
        entry.supervisor.wait_for_terminal_state().await;
        Ok(entry.descriptor())
    }

    pub async fn restart_worker(self: &Arc<Self>, id: WorkerId, grace: Duration) -> Result<WorkerDescriptor, AcError> {
        let entry = self.get_worker(id).await.ok_or_else(|| AcError::not_found("worker not found"))?;
        let (stdio, exit_rx) = entry
            .recovery
            .restart(entry.invocation.clone(), grace)
            .await
            .map_err(|e| AcError::new(ac_core::error::ErrorKind::Process, e.to_string()))?;
        self.wire_stdio(&entry, stdio, exit_rx).await;
        Ok(entry.descriptor())
    }

    pub async fn delete_worker(&self, id: WorkerId, grace: Duration) -> Result<(), AcError> {
        let entry = self.workers.write().await.remove(&id).ok_or_else(|| AcError::not_found("worker not found"))?;
        if entry.supervisor.status() == WorkerState::Running {
            let _ = entry.supervisor.stop(grace).await;
        }
        if let Some(handler) = entry.stream.write().await.take() {
            handler.close().await;
        }
        Ok(())
    }
}

/// Security-event feed derived from the worker registry, used by the
/// `GET /api/v1/security/events` surface. Kept in a separate lock so the
/// stream-forwarding hot path never contends with it.
#[derive(Default)]
pub struct SecurityEventLog {
    events: SyncRwLock<Vec<serde_json::Value>>,
}

impl SecurityEventLog {
    pub fn push(&self, event: serde_json::Value) {
        let mut events = self.events.write();
        events.push(event);
        if events.len() > 1000 {
            events.remove(0);
        }
    }

    pub fn recent(&self, limit: usize) -> Vec<serde_json::Value> {
        let events = self.events.read();
        events.iter().rev().take(limit).cloned().collect()
    }
}

/// Running counters surfaced by `GET /api/v1/security/statistics`.
#[derive(Default)]
pub struct SecurityStatistics {
    pub requests_total: AtomicU64,
    pub attacks_blocked: AtomicU64,
    pub rate_limited: AtomicU64,
    pub csrf_rejected: AtomicU64,
    pub ips_blocked: AtomicU64,
}

impl SecurityStatistics {
    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "requests_total": self.requests_total.load(Ordering::Relaxed),
            "attacks_blocked": self.attacks_blocked.load(Ordering::Relaxed),
            "rate_limited": self.rate_limited.load(Ordering::Relaxed),
            "csrf_rejected": self.csrf_rejected.load(Ordering::Relaxed),
            "ips_blocked": self.ips_blocked.load(Ordering::Relaxed),
        })
    }
}
