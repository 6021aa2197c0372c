// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use ac_server::config::{LogFormat, ServerConfig};
use clap::Parser;
use tracing::error;

#[tokio::main]
async fn main() {
    let config = ServerConfig::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(env_filter).init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(env_filter).init(),
    }

    if let Err(e) = ac_server::run(config).await {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}
