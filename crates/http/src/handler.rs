//! Chat Endpoint Handler (spec §4.4): decode one wire envelope, drive the
//! Session through the registry, re-encode the counterpart's payload, map
//! failures to HTTP status via [`HandlerError`].
//!
//! Both protocol adapters (OpenAI, Anthropic) funnel through
//! [`rendezvous`], which is the only place the registry gets touched —
//! everything adapter-specific lives in `protocols::{openai, anthropic}`.

use std::convert::Infallible;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::stream;
use tracing::Instrument;
use uuid::Uuid;

use turnproxy_core::Registry;

use crate::error::HandlerError;
use crate::extract::AppJson;
use crate::protocols::base::ProtocolRequest;
use crate::protocols::{anthropic, openai, ProtocolResponse};
use crate::state::AppState;

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// Obtain the session, run one rendezvous step, and return the
/// counterpart's payload. The only function in this crate that touches
/// the registry — spec §4.4 steps 4 and 5.
async fn rendezvous(
    registry: &Registry,
    parsed: ProtocolRequest,
) -> Result<ProtocolResponse, HandlerError> {
    let session = registry.get_or_create(&parsed.session_id).await?;
    let content = session.process_request(parsed.content, parsed.side).await?;
    Ok(ProtocolResponse {
        content,
        model: parsed.model,
    })
}

/// `POST /v1/chat/completions`.
pub async fn chat_completions(
    State(state): State<AppState>,
    AppJson(req): AppJson<openai::ChatCompletionRequest>,
) -> Result<Response, HandlerError> {
    let correlation_id = Uuid::new_v4();
    let span = tracing::info_span!("chat_completions", %correlation_id);

    async move {
        let started = Instant::now();

        let parsed = match openai::parse_request(req) {
            Ok(parsed) => parsed,
            Err(err) => {
                state.metrics.record_request("invalid_request", started.elapsed());
                return Err(err);
            }
        };
        let stream = parsed.stream;
        let prompt_content = parsed.content.clone();

        let result = rendezvous(&state.registry, parsed).await;
        state.metrics.set_active_sessions(state.registry.count().await);

        let resp = match result {
            Ok(resp) => resp,
            Err(err) => {
                state
                    .metrics
                    .record_request(outcome_label(&err), started.elapsed());
                return Err(err);
            }
        };
        state.metrics.record_request("ok", started.elapsed());

        let created = now_unix();
        if stream {
            Ok(sse_response(resp, created))
        } else {
            Ok(Json(openai::format_response(resp, &prompt_content, created)).into_response())
        }
    }
    .instrument(span)
    .await
}

fn sse_response(resp: ProtocolResponse, created: i64) -> Response {
    let final_chunk = openai::format_final_chunk(&resp, created);
    let chunk = openai::format_chunk(&resp, created);

    let events: Vec<Result<Event, Infallible>> = vec![
        Ok(Event::default().data(serde_json::to_string(&chunk).unwrap_or_default())),
        Ok(Event::default().data(serde_json::to_string(&final_chunk).unwrap_or_default())),
        Ok(Event::default().data("[DONE]")),
    ];

    Sse::new(stream::iter(events)).keep_alive(KeepAlive::default()).into_response()
}

fn outcome_label(err: &HandlerError) -> &'static str {
    match err {
        HandlerError::InvalidRequest(_) => "invalid_request",
        HandlerError::CapacityExceeded => "capacity_exceeded",
        HandlerError::Timeout => "timeout",
        HandlerError::Cancelled => "cancelled",
        HandlerError::Internal(_) => "server_error",
    }
}

/// `POST /v1/messages` — the supplemental Anthropic-shaped adapter (spec
/// §9 "plural protocol adapters"). Same rendezvous core, different wire
/// shape; always answers synchronously (no streaming framing defined for
/// this adapter).
pub async fn messages(
    State(state): State<AppState>,
    AppJson(req): AppJson<anthropic::MessagesRequest>,
) -> Result<Response, HandlerError> {
    let correlation_id = Uuid::new_v4();
    let span = tracing::info_span!("messages", %correlation_id);

    async move {
        let started = Instant::now();
        let parsed = anthropic::parse_request(req)?;
        let prompt_content = parsed.content.clone();

        let result = rendezvous(&state.registry, parsed).await;
        state.metrics.set_active_sessions(state.registry.count().await);

        let resp = match result {
            Ok(resp) => resp,
            Err(err) => {
                state
                    .metrics
                    .record_request(outcome_label(&err), started.elapsed());
                return Err(err);
            }
        };
        state.metrics.record_request("ok", started.elapsed());

        Ok(Json(anthropic::format_response(resp, &prompt_content)).into_response())
    }
    .instrument(span)
    .await
}
