//! MsgPack codec using `rmp-serde`.
//!
//! Serializes any serde type that knows its own [`MessageType`]. Structs are
//! written with `to_vec_named` (struct-as-map) so that field order changes on
//! either side do not silently corrupt messages.
//!
//! # Example
//!
//! ```
//! use signer_link::codec::{MessageCodec, MsgPackCodec, SignerMessage};
//! use signer_link::protocol::MessageType;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
//! struct Success {
//!     message: String,
//! }
//!
//! impl SignerMessage for Success {
//!     fn message_type(&self) -> MessageType {
//!         MessageType::Success
//!     }
//! }
//!
//! let codec = MsgPackCodec::<Success>::new();
//! let msg = Success { message: "ok".to_string() };
//! let payload = codec.serialize(&msg).unwrap();
//! let decoded = codec.deserialize(MessageType::Success, &payload).unwrap();
//! assert_eq!(decoded, msg);
//! ```

use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{MessageCodec, RequestFactory};
use crate::client::SessionId;
use crate::error::{DecodeError, Result};
use crate::protocol::MessageType;

/// A serde message that knows which header code it travels under.
pub trait SignerMessage {
    /// Type written in the frame header.
    fn message_type(&self) -> MessageType;
}

/// Message sets that can express the facade requests.
pub trait SignerRequests: SignerMessage + Sized {
    /// Build a `PING` request.
    fn ping(text: &str) -> Self;

    /// Build an `INITIALIZE` request.
    fn initialize(session_id: &SessionId) -> Self;
}

/// MessagePack codec for a message set `T`.
pub struct MsgPackCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> MsgPackCodec<T> {
    /// Create a codec for `T`.
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for MsgPackCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for MsgPackCodec<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for MsgPackCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MsgPackCodec")
            .field("message", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T> MessageCodec for MsgPackCodec<T>
where
    T: SignerMessage + Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync + 'static,
{
    type Message = T;

    fn message_type(&self, message: &T) -> MessageType {
        message.message_type()
    }

    fn serialize(&self, message: &T) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(message)?)
    }

    fn deserialize(&self, message_type: MessageType, payload: &[u8]) -> Result<T> {
        let message: T = rmp_serde::from_slice(payload)?;
        let actual = message.message_type();
        if actual != message_type {
            return Err(DecodeError::Malformed {
                message_type,
                reason: format!("payload decodes as {}", actual),
            }
            .into());
        }
        Ok(message)
    }
}

impl<T> RequestFactory for MsgPackCodec<T>
where
    T: SignerRequests + Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync + 'static,
{
    fn ping(&self, text: &str) -> T {
        T::ping(text)
    }

    fn initialize(&self, session_id: &SessionId) -> T {
        T::initialize(session_id)
    }
}
