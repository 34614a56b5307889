//! Error types for the rendezvous core

use thiserror::Error;

/// Result type alias for rendezvous core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while a request is being paired with its counterpart.
///
/// These map to the taxonomy in the handler layer: a [`Error::Timeout`]
/// or [`Error::Closed`] both surface as a timeout-class HTTP response,
/// [`Error::Cancelled`] never reaches the wire at all.
#[derive(Debug, Error)]
pub enum Error {
    /// No matching counterpart action occurred within the applicable deadline.
    #[error("timed out waiting for counterpart")]
    Timeout,

    /// The caller aborted (client disconnected) while suspended.
    #[error("request cancelled")]
    Cancelled,

    /// The session was evicted while this request was suspended.
    #[error("session closed")]
    Closed,

    /// The registry is already holding `max_sessions` live sessions.
    #[error("session capacity exceeded")]
    CapacityExceeded,
}
