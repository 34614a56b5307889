//! OpenAI Chat Completions wire shapes: request/response/chunk envelopes
//! and the conversion to and from [`ProtocolRequest`]/[`ProtocolResponse`].

use serde::{Deserialize, Serialize};

use crate::error::HandlerError;
use crate::protocols::base::{count_tokens, parse_model, ProtocolRequest, ProtocolResponse};

#[derive(Debug, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub stream: bool,
    // Accepted and ignored (spec §4.4): the core performs no generation.
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Decode a request envelope into the protocol-agnostic shape, rejecting
/// anything that fails the schema-level checks from spec §4.4 step 1.
pub fn parse_request(req: ChatCompletionRequest) -> Result<ProtocolRequest, HandlerError> {
    let last = req
        .messages
        .last()
        .ok_or_else(|| HandlerError::InvalidRequest("messages must not be empty".into()))?;

    let (session_id, side) = parse_model(&req.model);
    if session_id.is_empty() {
        return Err(HandlerError::InvalidRequest("model must not be empty".into()));
    }

    Ok(ProtocolRequest {
        model: req.model,
        session_id,
        side,
        content: last.content.clone(),
        stream: req.stream,
    })
}

#[derive(Debug, Serialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: &'static str,
    pub created: i64,
    pub model: String,
    pub choices: Vec<Choice>,
    pub usage: Usage,
}

#[derive(Debug, Serialize)]
pub struct Choice {
    pub index: u32,
    pub message: ResponseMessage,
    pub finish_reason: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ResponseMessage {
    pub role: &'static str,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

/// Build the non-streaming response envelope (spec §4.5).
///
/// `prompt_tokens` counts the inbound content that triggered this
/// response's delivery, not the returned payload.
pub fn format_response(
    resp: ProtocolResponse,
    prompt_content: &str,
    created: i64,
) -> ChatCompletionResponse {
    let prompt_tokens = count_tokens(prompt_content);
    let completion_tokens = count_tokens(&resp.content);
    ChatCompletionResponse {
        id: format!("chatcmpl-{created}-{}", resp.model),
        object: "chat.completion",
        created,
        model: resp.model,
        choices: vec![Choice {
            index: 0,
            message: ResponseMessage {
                role: "assistant",
                content: resp.content,
            },
            finish_reason: "stop",
        }],
        usage: Usage {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        },
    }
}

#[derive(Debug, Serialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: &'static str,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Serialize)]
pub struct ChunkChoice {
    pub index: u32,
    pub delta: Delta,
    pub finish_reason: Option<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct Delta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// The single content chunk emitted for a streaming response. Spec §6
/// permits emitting the whole counterpart payload as one chunk; there is
/// no incremental generation to actually stream.
pub fn format_chunk(resp: &ProtocolResponse, created: i64) -> ChatCompletionChunk {
    ChatCompletionChunk {
        id: format!("chatcmpl-{created}-{}", resp.model),
        object: "chat.completion.chunk",
        created,
        model: resp.model.clone(),
        choices: vec![ChunkChoice {
            index: 0,
            delta: Delta {
                content: Some(resp.content.clone()),
            },
            finish_reason: None,
        }],
    }
}

/// The closing chunk with `finish_reason: "stop"`, sent just before the
/// `data: [DONE]` sentinel.
pub fn format_final_chunk(resp: &ProtocolResponse, created: i64) -> ChatCompletionChunk {
    ChatCompletionChunk {
        id: format!("chatcmpl-{created}-{}", resp.model),
        object: "chat.completion.chunk",
        created,
        model: resp.model.clone(),
        choices: vec![ChunkChoice {
            index: 0,
            delta: Delta { content: None },
            finish_reason: Some("stop"),
        }],
    }
}
