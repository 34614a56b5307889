//! Wire-envelope adapters. Each module owns the request/response shapes
//! for one protocol and converts to/from the shared [`base`] types the
//! handler layer actually drives the rendezvous with.

pub mod anthropic;
pub mod base;
pub mod openai;

pub use base::{count_tokens, parse_model, ProtocolRequest, ProtocolResponse};
