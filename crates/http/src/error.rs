//! HTTP-facing error taxonomy: maps rendezvous-core failures and wire
//! validation problems onto the status/body scheme every handler shares.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use turnproxy_core::Error as CoreError;

/// Errors a handler can surface to the client.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Envelope failed schema validation or `messages` was empty.
    #[error("{0}")]
    InvalidRequest(String),

    /// The registry is already holding `max_sessions` live sessions.
    #[error("session capacity exceeded")]
    CapacityExceeded,

    /// No matching counterpart action occurred within the deadline, or the
    /// session was evicted while this request was suspended — both are
    /// reported identically to the caller (spec §7).
    #[error("timed out waiting for counterpart")]
    Timeout,

    /// The client disconnected before its turn completed. Never actually
    /// reaches the wire (there is no client left to answer), kept only so
    /// the mapping from [`CoreError`] is exhaustive.
    #[error("request cancelled")]
    Cancelled,

    /// Anything unexpected; logged with its message, returned opaque.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<CoreError> for HandlerError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Timeout | CoreError::Closed => HandlerError::Timeout,
            CoreError::Cancelled => HandlerError::Cancelled,
            CoreError::CapacityExceeded => HandlerError::CapacityExceeded,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    message: String,
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    param: Option<&'static str>,
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match &self {
            HandlerError::InvalidRequest(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "invalid_request_error", msg.clone())
            }
            HandlerError::CapacityExceeded => (
                StatusCode::SERVICE_UNAVAILABLE,
                "server_error",
                self.to_string(),
            ),
            HandlerError::Timeout => {
                (StatusCode::REQUEST_TIMEOUT, "timeout_error", self.to_string())
            }
            HandlerError::Cancelled => {
                tracing::debug!("client disconnected before its turn completed");
                (StatusCode::REQUEST_TIMEOUT, "timeout_error", self.to_string())
            }
            HandlerError::Internal(msg) => {
                tracing::error!(error = %msg, "unhandled server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "server_error", msg.clone())
            }
        };

        let body = ErrorBody {
            error: ErrorDetail {
                message,
                kind,
                code: None,
                param: None,
            },
        };

        (status, Json(body)).into_response()
    }
}
