//! Prometheus metrics exposed at `GET /metrics` (spec §4.6, §6 — optional
//! counters over the rendezvous pipeline).

use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

#[derive(Clone)]
pub struct Metrics {
    requests_total: CounterVec,
    request_duration_seconds: HistogramVec,
    active_sessions: IntGauge,
    registry: Arc<Registry>,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests_total = CounterVec::new(
            Opts::new(
                "turnproxy_requests_total",
                "Total rendezvous requests processed, labeled by outcome",
            ),
            &["outcome"],
        )?;

        let request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "turnproxy_request_duration_seconds",
                "Time a request spent in the handler, including any suspension",
            )
            .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0, 60.0]),
            &["outcome"],
        )?;

        let active_sessions = IntGauge::new(
            "turnproxy_active_sessions",
            "Number of sessions currently held by the registry",
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(request_duration_seconds.clone()))?;
        registry.register(Box::new(active_sessions.clone()))?;

        Ok(Self {
            requests_total,
            request_duration_seconds,
            active_sessions,
            registry: Arc::new(registry),
        })
    }

    /// Record one completed request. `outcome` is a short label such as
    /// `"ok"`, `"timeout"`, `"invalid_request"`, `"capacity_exceeded"`.
    pub fn record_request(&self, outcome: &str, duration: std::time::Duration) {
        self.requests_total.with_label_values(&[outcome]).inc();
        self.request_duration_seconds
            .with_label_values(&[outcome])
            .observe(duration.as_secs_f64());
    }

    pub fn set_active_sessions(&self, count: usize) {
        self.active_sessions.set(count as i64);
    }

    /// Render the current state in Prometheus's text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let families = self.registry.gather();
        let mut buf = Vec::new();
        TextEncoder::new().encode(&families, &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}
