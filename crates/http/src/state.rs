//! Shared state handed to every Axum handler: the registry the core
//! dispatches through, plus the metrics collector each request reports to.

use turnproxy_core::Registry;

use crate::metrics::Metrics;

/// Cloneable handle installed as Axum router state (mirrors the teacher's
/// `ServerState` in `transports/http/src/server.rs`, generalized from one
/// field to two).
#[derive(Clone)]
pub struct AppState {
    pub registry: Registry,
    pub metrics: Metrics,
}
