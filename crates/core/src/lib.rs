//! Core rendezvous primitives for the turn-taking proxy: the session state
//! machine, the registry that owns sessions by id, and the background TTL
//! reaper that evicts idle ones.

mod error;
mod reaper;
mod registry;
mod session;

pub use error::{Error, Result};
pub use reaper::Reaper;
pub use registry::Registry;
pub use session::{Session, SessionMetadata, Side};
