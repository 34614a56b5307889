//! Shared envelope-independent types and the `model` overloading trick
//! every protocol adapter rides on.
//!
//! Using the chat-completions `model` field as a session identifier is
//! deliberate: it lets a rendezvous session ride inside an unmodified
//! client SDK. It is never interpreted as an actual model name.

use turnproxy_core::Side;

/// A protocol-agnostic view of an inbound rendezvous request, after the
/// wire envelope has been decoded and `model` has been split.
pub struct ProtocolRequest {
    /// The `model` field exactly as the client sent it — echoed back
    /// verbatim into the response's `model` field (spec §8: the codec
    /// round-trip preserves the declared model string unchanged, `|A`/`|B`
    /// suffix and all).
    pub model: String,
    pub session_id: String,
    pub side: Option<Side>,
    pub content: String,
    pub stream: bool,
}

/// A protocol-agnostic view of the counterpart payload, before it is
/// re-encoded into a wire-specific response shape.
pub struct ProtocolResponse {
    pub content: String,
    pub model: String,
}

/// Split `model` into `(session_id, side)`.
///
/// `"<id>|A"` / `"<id>|B"` declare an explicit side; any other suffix, or
/// no suffix at all, is treated as an opaque session id with no side hint
/// (spec §4.4 step 2: an unrecognized suffix is not an error, it just
/// folds back into the bare-id case).
pub fn parse_model(model: &str) -> (String, Option<Side>) {
    match model.rsplit_once('|') {
        Some((id, "A")) if !id.is_empty() => (id.to_string(), Some(Side::A)),
        Some((id, "B")) if !id.is_empty() => (id.to_string(), Some(Side::B)),
        _ => (model.to_string(), None),
    }
}

/// Token count for billing fields, counted in Unicode code points.
///
/// Spec §4.5/§9 leaves the unit to the implementer and asks only for
/// consistency within a response; code points are the cheapest accurate
/// count that does not require a tokenizer dependency.
pub fn count_tokens(text: &str) -> usize {
    text.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_model_has_no_side() {
        assert_eq!(parse_model("s1"), ("s1".to_string(), None));
    }

    #[test]
    fn suffix_a_and_b_are_recognized() {
        assert_eq!(parse_model("s1|A"), ("s1".to_string(), Some(Side::A)));
        assert_eq!(parse_model("s1|B"), ("s1".to_string(), Some(Side::B)));
    }

    #[test]
    fn unrecognized_suffix_falls_back_to_whole_string() {
        assert_eq!(parse_model("s1|C"), ("s1|C".to_string(), None));
        assert_eq!(parse_model("weird|"), ("weird|".to_string(), None));
    }

    #[test]
    fn token_count_is_code_points_not_bytes() {
        assert_eq!(count_tokens("caf\u{e9}"), 4);
        assert_eq!(count_tokens(""), 0);
    }
}
