//! Server Shell (spec §4.6): routing table, ambient middleware, and the
//! admin/health surface, plus the graceful-shutdown future startup/shutdown
//! wire into the TTL reaper's cancellation token.

use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use turnproxy_core::{Reaper, Registry};

use crate::config::Settings;
use crate::handler::{chat_completions, messages};
use crate::metrics::Metrics;
use crate::state::AppState;

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
}

async fn health_handler() -> impl IntoResponse {
    Json(HealthBody { status: "healthy" })
}

/// `GET /admin/sessions` — redacted registry snapshot (spec §4.2 `list`,
/// §6).
async fn admin_sessions_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.registry.list().await)
}

async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.metrics.render() {
        Ok(body) => (StatusCode::OK, body).into_response(),
        Err(err) => {
            tracing::error!(error = %err, "failed to render metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub fn build_router(state: AppState, max_payload_size: usize) -> Router {
    Router::new()
        .route("/v1/chat/completions", post(chat_completions))
        .route("/v1/messages", post(messages))
        .route("/health", get(health_handler))
        .route("/admin/sessions", get(admin_sessions_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(RequestBodyLimitLayer::new(max_payload_size)),
        )
}

/// Everything startup needs: the registry, the reaper, and the router,
/// wired so that cancelling the reaper's token also starts Axum's
/// graceful shutdown (spec §4.6: "shutdown cancels the Reaper and drains
/// in-flight handlers").
pub struct Server {
    pub router: Router,
    pub registry: Registry,
    reaper: Reaper,
    shutdown: CancellationToken,
}

impl Server {
    pub fn new(settings: &Settings) -> Result<Self, prometheus::Error> {
        let registry = Registry::new(
            settings.max_sessions,
            settings.handshake_timeout(),
            settings.turn_timeout(),
        );
        let metrics = Metrics::new()?;
        let reaper = Reaper::new(
            registry.clone(),
            settings.session_ttl(),
            settings.cleanup_interval(),
        );
        let shutdown = reaper.cancellation_token();

        let state = AppState {
            registry: registry.clone(),
            metrics,
        };
        let router = build_router(state, settings.max_payload_size);

        Ok(Self {
            router,
            registry,
            reaper,
            shutdown,
        })
    }

    /// A token that [`shutdown`](Server::trigger_shutdown) cancels;
    /// cloned into the signal handler that listens for Ctrl+C/SIGTERM.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn trigger_shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Bind and serve until the shutdown token is cancelled. Spawns the
    /// reaper alongside the listener and waits for both to stop.
    pub async fn serve(self, bind_address: &str) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind(bind_address).await?;
        tracing::info!(bind_address, "turnproxy listening");

        let reaper_handle = tokio::spawn(self.reaper.run());
        let shutdown = self.shutdown.clone();

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                tracing::info!("graceful shutdown triggered, draining in-flight requests");
            })
            .await?;

        // The reaper watches the same token, so it has already stopped (or
        // is about to); give it a moment to unwind before returning.
        let _ = tokio::time::timeout(Duration::from_secs(5), reaper_handle).await;
        Ok(())
    }
}
