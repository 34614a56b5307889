//! Runtime configuration: the settings table from spec §6, loaded from
//! CLI flags with environment-variable fallbacks via `clap`'s `env`
//! attribute (the teacher's own CLI pattern, e.g.
//! `tools/pack-pipeline/src/main.rs`) layered over the plain
//! `HTTP_BIND_ADDRESS`/`RUST_LOG` style of `crates/services/http-server`.

use std::time::Duration;

use clap::Parser;

/// Rendezvous proxy settings. Every field accepts a `TURNPROXY_*`
/// environment variable as well as its CLI flag; the flag wins if both
/// are present.
#[derive(Parser, Debug, Clone)]
#[command(name = "turnproxy-server")]
#[command(author, version)]
#[command(about = "Human-in-the-loop rendezvous proxy with an OpenAI-compatible surface")]
pub struct Settings {
    /// Bind address host.
    #[arg(long, env = "TURNPROXY_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Bind address port.
    #[arg(long, env = "TURNPROXY_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Deadline for the first (handshake) request's suspension.
    #[arg(long, env = "TURNPROXY_HANDSHAKE_TIMEOUT_SECONDS", default_value_t = 30.0)]
    pub handshake_timeout_seconds: f64,

    /// Deadline for every subsequent turn's suspension.
    #[arg(long, env = "TURNPROXY_TURN_TIMEOUT_SECONDS", default_value_t = 30.0)]
    pub turn_timeout_seconds: f64,

    /// Idle age after which the reaper evicts a session.
    #[arg(long, env = "TURNPROXY_SESSION_TTL_SECONDS", default_value_t = 3600.0)]
    pub session_ttl_seconds: f64,

    /// Reaper sweep period.
    #[arg(long, env = "TURNPROXY_CLEANUP_INTERVAL_SECONDS", default_value_t = 60.0)]
    pub cleanup_interval_seconds: f64,

    /// Hard cap on concurrently live sessions.
    #[arg(long, env = "TURNPROXY_MAX_SESSIONS", default_value_t = 100)]
    pub max_sessions: usize,

    /// Inbound request body cap in bytes, enforced before the handler.
    #[arg(long, env = "TURNPROXY_MAX_PAYLOAD_SIZE", default_value_t = 1_048_576)]
    pub max_payload_size: usize,

    /// `tracing_subscriber::EnvFilter` directive. Also honors `RUST_LOG`
    /// if set, matching the teacher's service binaries.
    #[arg(long, env = "TURNPROXY_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Settings {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.handshake_timeout_seconds)
    }

    pub fn turn_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.turn_timeout_seconds)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs_f64(self.session_ttl_seconds)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs_f64(self.cleanup_interval_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_table() {
        let settings = Settings::parse_from(["turnproxy-server"]);
        assert_eq!(settings.bind_address(), "0.0.0.0:8000");
        assert_eq!(settings.handshake_timeout(), Duration::from_secs(30));
        assert_eq!(settings.session_ttl(), Duration::from_secs(3600));
        assert_eq!(settings.max_sessions, 100);
        assert_eq!(settings.max_payload_size, 1_048_576);
    }

    #[test]
    fn cli_flags_override_defaults() {
        let settings =
            Settings::parse_from(["turnproxy-server", "--port", "9000", "--max-sessions", "5"]);
        assert_eq!(settings.port, 9000);
        assert_eq!(settings.max_sessions, 5);
    }
}
