//! Wire format encoding and decoding.
//!
//! Implements the 8-byte frame header:
//! ```text
//! ┌──────────┬─────────────┬──────────┐
//! │ Magic    │ Header code │ Length   │
//! │ "##"     │ 2 bytes     │ 4 bytes  │
//! │ 2 bytes  │ uint16 BE   │ uint32 BE│
//! └──────────┴─────────────┴──────────┘
//! ```
//!
//! All multi-byte integers are Big Endian. The payload follows immediately.

use super::MessageType;
use crate::error::DecodeError;

/// Magic marker opening every frame.
pub const MAGIC: [u8; 2] = *b"##";

/// Header size in bytes, magic included (fixed, exactly 8).
pub const HEADER_SIZE: usize = 8;

/// Default maximum payload size (16 MiB).
pub const DEFAULT_MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

/// Decoded header from wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Message type code.
    pub header_code: u16,
    /// Payload length in bytes.
    pub payload_length: u32,
}

impl Header {
    /// Create a new header.
    pub fn new(header_code: u16, payload_length: u32) -> Self {
        Self {
            header_code,
            payload_length,
        }
    }

    /// Create a header for a message type.
    pub fn for_type(message_type: MessageType, payload_length: u32) -> Self {
        Self::new(message_type.code(), payload_length)
    }

    /// Message type named by the header code (never fails).
    #[inline]
    pub fn message_type(&self) -> MessageType {
        MessageType::from_code(self.header_code)
    }

    /// Encode header to bytes (Big Endian), magic included.
    ///
    /// # Example
    ///
    /// ```
    /// use signer_link::protocol::Header;
    ///
    /// let header = Header::new(2, 100);
    /// let bytes = header.encode();
    /// assert_eq!(&bytes[..2], b"##");
    /// assert_eq!(bytes.len(), 8);
    /// ```
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        self.encode_into(&mut buf);
        buf
    }

    /// Encode header into an existing buffer.
    ///
    /// # Panics
    ///
    /// Panics if buffer is smaller than `HEADER_SIZE` (8 bytes).
    pub fn encode_into(&self, buf: &mut [u8]) {
        debug_assert!(buf.len() >= HEADER_SIZE);
        buf[0..2].copy_from_slice(&MAGIC);
        buf[2..4].copy_from_slice(&self.header_code.to_be_bytes());
        buf[4..8].copy_from_slice(&self.payload_length.to_be_bytes());
    }

    /// Decode header from bytes (Big Endian).
    ///
    /// The two magic bytes are skipped without being checked.
    /// Returns `None` if buffer is too short.
    ///
    /// # Example
    ///
    /// ```
    /// use signer_link::protocol::{Header, MessageType};
    ///
    /// let bytes = [b'#', b'#', 0, 2, 0, 0, 0, 100];
    /// let header = Header::decode(&bytes).unwrap();
    /// assert_eq!(header.message_type(), MessageType::Success);
    /// assert_eq!(header.payload_length, 100);
    /// ```
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE {
            return None;
        }
        Some(Self {
            header_code: u16::from_be_bytes([buf[2], buf[3]]),
            payload_length: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
        })
    }

    /// Check the payload length against a limit.
    pub fn validate(&self, max_payload_size: u32) -> Result<(), DecodeError> {
        if self.payload_length > max_payload_size {
            return Err(DecodeError::Oversized {
                size: self.payload_length,
                max: max_payload_size,
            });
        }
        Ok(())
    }
}

/// Check whether the first two bytes carry the magic marker.
#[inline]
pub fn has_magic(buf: &[u8]) -> bool {
    buf.len() >= 2 && buf[..2] == MAGIC
}
