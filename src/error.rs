//! Error types for signer-link.

use std::time::Duration;

use thiserror::Error;

use crate::config::ConfigError;
use crate::listener::ListenerId;
use crate::protocol::MessageType;

/// A single frame could not be turned into a message.
///
/// Raised inside the read loop, where it ends the loop and is reported to
/// listeners as a `FAILURE` system event rather than returned to a caller.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The stream ended before the declared payload length was read.
    #[error("Short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },

    /// The payload could not be parsed as the message its header announced.
    #[error("Malformed {message_type} payload: {reason}")]
    Malformed {
        message_type: MessageType,
        reason: String,
    },

    /// The header announced a payload larger than the configured limit.
    #[error("Payload size {size} exceeds maximum {max}")]
    Oversized { size: u32, max: u32 },
}

/// Main error type for all signer-link operations.
#[derive(Debug, Error)]
pub enum SignerError {
    /// I/O error during socket or device operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The host or device could not be reached.
    #[error("Failed to connect to {target}: {source}")]
    Connect {
        target: String,
        #[source]
        source: std::io::Error,
    },

    /// No attached HID device matched the configured identifiers.
    #[error(
        "No matching device attached (vendor {vendor_id:#06x}, product {product_id:#06x}, serial {serial_number:?})"
    )]
    DeviceNotFound {
        vendor_id: u16,
        product_id: u16,
        serial_number: Option<String>,
    },

    /// Error reported by the HID backend.
    #[error("HID error: {0}")]
    Hid(String),

    /// Frame level decode failure.
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// An outbound payload does not fit the frame's `u32` length field.
    #[error("Payload of {0} bytes does not fit in a frame")]
    PayloadTooLarge(usize),

    /// A HID report announced more than 63 valid bytes.
    #[error("HID report length {0} exceeds 63")]
    FrameTooLong(u8),

    /// The peer closed the stream cleanly.
    #[error("End of stream")]
    EndOfStream,

    /// Operation attempted before `connect()` succeeded or after `close()`.
    #[error("Not connected")]
    NotConnected,

    /// `connect()` called on an engine that is already connecting or connected.
    #[error("Already connected")]
    AlreadyConnected,

    /// The listener is already registered.
    #[error("Listener {0} is already registered")]
    DuplicateListener(ListenerId),

    /// The listener was never registered or has already been removed.
    #[error("Listener {0} is not registered")]
    UnknownListener(ListenerId),

    /// No event arrived within the allowed time.
    #[error("Timed out after {0:?} waiting for an event")]
    Timeout(Duration),

    /// MsgPack serialization error.
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MsgPack deserialization error.
    #[error("MsgPack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    /// Invalid configuration values.
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Configuration file could not be parsed.
    #[error("Configuration parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration could not be written as TOML.
    #[error("Configuration serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Result type alias using SignerError.
pub type Result<T> = std::result::Result<T, SignerError>;
