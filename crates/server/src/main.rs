//! Rendezvous proxy server binary
//!
//! Starts the turn-taking rendezvous proxy's HTTP surface.
//!
//! # Usage
//!
//! ```bash
//! # Start with defaults (0.0.0.0:8000)
//! turnproxy-server
//!
//! # Start with custom bind address and session cap
//! turnproxy-server --host 127.0.0.1 --port 9000 --max-sessions 500
//!
//! # With logging
//! RUST_LOG=debug turnproxy-server
//! ```
//!
//! # Environment Variables
//!
//! See [`turnproxy_http::Settings`] — every flag also accepts a
//! `TURNPROXY_*` environment variable, e.g. `TURNPROXY_PORT`,
//! `TURNPROXY_MAX_SESSIONS`, `TURNPROXY_LOG_LEVEL`.

use clap::Parser;
use tracing::{error, info};
use turnproxy_http::{Server, Settings};

fn main() -> anyhow::Result<()> {
    let settings = Settings::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(settings.log_level.clone())),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %settings.bind_address(),
        max_sessions = settings.max_sessions,
        "turnproxy starting"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("turnproxy")
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let server = Server::new(&settings).map_err(|e| {
            error!("failed to build server: {e}");
            anyhow::anyhow!(e)
        })?;

        let shutdown = server.shutdown_token();
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("received shutdown signal");
            shutdown.cancel();
        });

        let bind_address = settings.bind_address();
        server.serve(&bind_address).await.map_err(|e| {
            error!("server error: {e}");
            anyhow::anyhow!(e)
        })
    })?;

    info!("turnproxy shutdown complete");
    Ok(())
}
