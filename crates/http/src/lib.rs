//! OpenAI-compatible HTTP transport for the rendezvous proxy: request
//! decoding, the chat endpoint handler, and the Axum server shell built
//! around [`turnproxy_core`]'s Session/Registry/Reaper.

pub mod config;
pub mod error;
pub mod extract;
pub mod handler;
pub mod metrics;
pub mod protocols;
pub mod router;
pub mod state;

pub use config::Settings;
pub use error::HandlerError;
pub use extract::AppJson;
pub use router::{build_router, Server};
pub use state::AppState;
