//! Anthropic Messages API wire shapes.
//!
//! Supplemental adapter (spec §9 "plural protocol adapters"): same
//! rendezvous semantics, different envelope. `model` still overloads the
//! session id exactly as it does for the OpenAI adapter.

use serde::{Deserialize, Serialize};

use crate::error::HandlerError;
use crate::protocols::base::{count_tokens, parse_model, ProtocolRequest, ProtocolResponse};

#[derive(Debug, Deserialize)]
pub struct MessagesRequest {
    pub model: String,
    pub messages: Vec<AnthropicMessage>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub system: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AnthropicMessage {
    pub role: String,
    pub content: String,
}

pub fn parse_request(req: MessagesRequest) -> Result<ProtocolRequest, HandlerError> {
    let last = req
        .messages
        .last()
        .ok_or_else(|| HandlerError::InvalidRequest("messages must not be empty".into()))?;

    for message in &req.messages {
        if message.role != "user" && message.role != "assistant" {
            return Err(HandlerError::InvalidRequest(format!(
                "unsupported role: {}",
                message.role
            )));
        }
    }

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
pub struct MessagesResponse {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub role: &'static str,
    pub content: Vec<ContentBlock>,
    pub model: String,
    pub stop_reason: &'static str,
    pub stop_sequence: Option<String>,
    pub usage: Usage,
}

#[derive(Debug, Serialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct Usage {
    pub input_tokens: usize,
    pub output_tokens: usize,
}

pub fn format_response(resp: ProtocolResponse, prompt_content: &str) -> MessagesResponse {
    let id_suffix: String = resp.model.chars().take(8).collect();
    MessagesResponse {
        id: format!("msg-{id_suffix}"),
        kind: "message",
        role: "assistant",
        content: vec![ContentBlock {
            kind: "text",
            text: resp.content.clone(),
        }],
        model: resp.model,
        stop_reason: "end_turn",
        stop_sequence: None,
        usage: Usage {
            input_tokens: count_tokens(prompt_content),
            output_tokens: count_tokens(&resp.content),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_system_role_message() {
        let req = MessagesRequest {
            model: "s1".into(),
            messages: vec![AnthropicMessage { role: "system".into(), content: "x".into() }],
            stream: false,
            max_tokens: None,
            system: None,
        };
        assert!(matches!(parse_request(req), Err(HandlerError::InvalidRequest(_))));
    }

    #[test]
    fn id_suffix_never_panics_on_short_model() {
        let resp = ProtocolResponse { content: "hi".into(), model: "ab".into() };
        let formatted = format_response(resp, "hello");
        assert_eq!(formatted.id, "msg-ab");
    }
}
