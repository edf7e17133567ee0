//! Raw codec - payload bytes passed through untouched.
//!
//! Used when the caller owns the schema encoding (for example generated
//! protobuf types) and only needs the framing. Payloads are shared through
//! `bytes::Bytes`, so cloning a message never copies its body.
//!
//! # Example
//!
//! ```
//! use signer_link::codec::{MessageCodec, RawCodec, RawMessage};
//! use signer_link::protocol::MessageType;
//! use bytes::Bytes;
//!
//! let bytes = Bytes::from_static(b"zero copy");
//! let message = RawCodec.deserialize(MessageType::Success, &bytes).unwrap();
//! assert_eq!(message.payload, bytes);
//! ```

use bytes::Bytes;
use prost::Message;

use super::{MessageCodec, RequestFactory};
use crate::client::SessionId;
use crate::error::Result;
use crate::protocol::MessageType;

/// Message whose payload is kept as opaque bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    /// Type written in the frame header.
    pub message_type: MessageType,
    /// Schema-encoded body.
    pub payload: Bytes,
}

impl RawMessage {
    /// Create a message from a type and a payload.
    pub fn new(message_type: MessageType, payload: impl Into<Bytes>) -> Self {
        Self {
            message_type,
            payload: payload.into(),
        }
    }

    /// Create a message with an empty body.
    pub fn empty(message_type: MessageType) -> Self {
        Self::new(message_type, Bytes::new())
    }
}

/// Codec that does not transform payloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawCodec;

impl MessageCodec for RawCodec {
    type Message = RawMessage;

    #[inline]
    fn message_type(&self, message: &RawMessage) -> MessageType {
        message.message_type
    }

    #[inline]
    fn serialize(&self, message: &RawMessage) -> Result<Vec<u8>> {
        Ok(message.payload.to_vec())
    }

    #[inline]
    fn deserialize(&self, message_type: MessageType, payload: &[u8]) -> Result<RawMessage> {
        Ok(RawMessage::new(message_type, Bytes::copy_from_slice(payload)))
    }
}

/// Body of a `Ping` request.
#[derive(Clone, PartialEq, Message)]
pub struct PingBody {
    #[prost(string, tag = "1")]
    pub message: String,
}

/// Body of an `Initialize` request.
#[derive(Clone, PartialEq, Message)]
pub struct InitializeBody {
    #[prost(bytes = "vec", tag = "1")]
    pub session_id: Vec<u8>,
}

impl RequestFactory for RawCodec {
    fn ping(&self, text: &str) -> RawMessage {
        let body = PingBody {
            message: text.to_owned(),
        };
        RawMessage::new(MessageType::Ping, body.encode_to_vec())
    }

    fn initialize(&self, session_id: &SessionId) -> RawMessage {
        let body = InitializeBody {
            session_id: session_id.as_bytes().to_vec(),
        };
        RawMessage::new(MessageType::Initialize, body.encode_to_vec())
    }
}
