//! Platform message envelopes (XML exchange format)

mod message;
mod reply;

pub use message::{InboundMessage, MsgKind, parse_inbound};
pub use reply::{TextReply, compose_text_reply};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("malformed envelope: {0}")]
    Malformed(String),
    #[error("reply serialization failed: {0}")]
    Serialize(String),
}
