// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ac-server: control plane for supervised AI-coding worker processes.

pub mod config;
pub mod error;
pub mod state;
pub mod transport;

use std::net::SocketAddr;

use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::state::AppState;
use crate::transport::build_router;

/// Run the control plane until shutdown.
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let dev_mode = config.dev_mode;

    let state = AppState::new(config).await?;
    let router = build_router(state.clone());

    tracing::info!(%addr, dev_mode, "ac-server listening");

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(state.shutdown.clone().cancelled_owned())
        .await?;

    Ok(())
}
