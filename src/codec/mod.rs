//! Codec module - structured message serialization.
//!
//! The framing layer never looks inside a payload. A [`MessageCodec`] owns
//! that concern: it names the [`MessageType`] of a message, turns a message
//! into payload bytes and parses payload bytes back into a message.
//!
//! - [`RawCodec`] - opaque bytes tagged with their message type
//! - [`MsgPackCodec`] - serde types encoded with `rmp-serde`
//!
//! # Example
//!
//! ```
//! use signer_link::codec::{MessageCodec, RawCodec, RawMessage};
//! use signer_link::protocol::MessageType;
//!
//! let message = RawMessage::new(MessageType::Ping, &b"hello"[..]);
//! let payload = RawCodec.serialize(&message).unwrap();
//! let decoded = RawCodec.deserialize(MessageType::Ping, &payload).unwrap();
//! assert_eq!(decoded, message);
//! ```

mod msgpack;
mod raw;

use std::fmt;

pub use msgpack::{MsgPackCodec, SignerMessage, SignerRequests};
pub use raw::{InitializeBody, PingBody, RawCodec, RawMessage};

use crate::client::SessionId;
use crate::error::Result;
use crate::protocol::MessageType;

/// Converts structured messages to and from frame payloads.
pub trait MessageCodec: Send + Sync + 'static {
    /// Decoded message. Shared between listeners, so it must be cheap to
    /// clone or be wrapped by the caller.
    type Message: Clone + fmt::Debug + Send + Sync + 'static;

    /// Message type written in the frame header for `message`.
    fn message_type(&self, message: &Self::Message) -> MessageType;

    /// Serialize a message into payload bytes.
    fn serialize(&self, message: &Self::Message) -> Result<Vec<u8>>;

    /// Parse payload bytes into a message of the given type.
    ///
    /// `message_type` may be [`MessageType::Unknown`].
    fn deserialize(&self, message_type: MessageType, payload: &[u8]) -> Result<Self::Message>;
}

/// Builds the requests the client facades send on the caller's behalf.
pub trait RequestFactory: MessageCodec {
    /// `PING` carrying a text the device echoes back.
    fn ping(&self, text: &str) -> Self::Message;

    /// `INITIALIZE` tagged with the client's session id.
    fn initialize(&self, session_id: &SessionId) -> Self::Message;
}
