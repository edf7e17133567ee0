//! Frame struct and the frame codec.
//!
//! A [`Frame`] is one complete wire unit: magic, header code, length and
//! payload. [`FrameCodec`] writes frames and turns them back into structured
//! messages through a [`MessageCodec`].
//!
//! # Example
//!
//! ```
//! use signer_link::protocol::{FrameCodec, MessageType, HEADER_SIZE};
//!
//! let bytes = FrameCodec::encode(MessageType::Ping, b"hello").unwrap();
//! assert_eq!(&bytes[..2], b"##");
//! assert_eq!(bytes.len(), HEADER_SIZE + 5);
//! ```

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::wire_format::{Header, HEADER_SIZE};
use super::MessageType;
use crate::codec::MessageCodec;
use crate::error::{DecodeError, Result, SignerError};

/// A complete protocol frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Decoded header.
    pub header: Header,
    /// Payload bytes (zero-copy via `bytes::Bytes`).
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame from header and payload.
    pub fn new(header: Header, payload: Bytes) -> Self {
        Self { header, payload }
    }

    /// Create a frame for a message type, deriving the length from the payload.
    ///
    /// # Errors
    ///
    /// [`SignerError::PayloadTooLarge`] if the payload does not fit the `u32`
    /// length field.
    pub fn with_payload(message_type: MessageType, payload: impl Into<Bytes>) -> Result<Self> {
        let payload = payload.into();
        Ok(Self {
            header: Header::for_type(message_type, payload_length(payload.len())?),
            payload,
        })
    }

    /// Message type named by the header.
    #[inline]
    pub fn message_type(&self) -> MessageType {
        self.header.message_type()
    }

    /// Raw header code.
    #[inline]
    pub fn header_code(&self) -> u16 {
        self.header.header_code
    }

    /// Get a reference to the payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Get the payload length.
    #[inline]
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Serialize the frame, header first.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_SIZE + self.payload.len());
        buf.extend_from_slice(&self.header.encode());
        buf.extend_from_slice(&self.payload);
        buf
    }
}

/// Payload length as written in the header.
fn payload_length(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| SignerError::PayloadTooLarge(len))
}

/// Length-prefixed frame codec.
///
/// Stateless: every method works on complete values. Write timing is left to
/// the transport.
pub struct FrameCodec;

impl FrameCodec {
    /// Encode a payload as a complete frame.
    ///
    /// Writes the magic, the big-endian header code of `message_type`, the
    /// big-endian payload length, then the payload verbatim.
    ///
    /// # Errors
    ///
    /// [`SignerError::PayloadTooLarge`] if the payload does not fit the `u32`
    /// length field.
    pub fn encode(message_type: MessageType, payload: &[u8]) -> Result<Vec<u8>> {
        let header = Header::for_type(message_type, payload_length(payload.len())?);
        let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
        buf.extend_from_slice(&header.encode());
        buf.extend_from_slice(payload);
        Ok(buf)
    }

    /// Serialize a structured message and encode it as a frame.
    ///
    /// Returns the message type alongside the frame bytes.
    pub fn encode_message<C: MessageCodec>(
        codec: &C,
        message: &C::Message,
    ) -> Result<(MessageType, Vec<u8>)> {
        let message_type = codec.message_type(message);
        let payload = codec.serialize(message)?;
        Ok((message_type, Self::encode(message_type, &payload)?))
    }

    /// Parse the payload of a frame into a structured message.
    ///
    /// Unknown header codes are passed to the codec as
    /// [`MessageType::Unknown`]. Any other codec failure is reported as
    /// [`DecodeError::Malformed`].
    pub fn decode<C: MessageCodec>(
        codec: &C,
        frame: &Frame,
    ) -> std::result::Result<C::Message, DecodeError> {
        let message_type = frame.message_type();
        codec
            .deserialize(message_type, frame.payload())
            .map_err(|e| match e {
                SignerError::Decode(inner) => inner,
                other => DecodeError::Malformed {
                    message_type,
                    reason: other.to_string(),
                },
            })
    }

    /// Read exactly one frame from an async reader.
    ///
    /// Returns `Ok(None)` if the reader ends cleanly on a frame boundary.
    /// Ending anywhere inside a frame is [`DecodeError::ShortRead`].
    pub async fn read_frame<R>(reader: &mut R, max_payload_size: u32) -> Result<Option<Frame>>
    where
        R: AsyncRead + Unpin,
    {
        let mut header_buf = [0u8; HEADER_SIZE];
        let got = read_full(reader, &mut header_buf).await?;
        if got == 0 {
            return Ok(None);
        }
        if got < HEADER_SIZE {
            return Err(DecodeError::ShortRead {
                expected: HEADER_SIZE,
                actual: got,
            }
            .into());
        }

        let header = Header::decode(&header_buf).ok_or(DecodeError::ShortRead {
            expected: HEADER_SIZE,
            actual: got,
        })?;
        header.validate(max_payload_size)?;

        let expected = header.payload_length as usize;
        let mut payload = vec![0u8; expected];
        let got = read_full(reader, &mut payload).await?;
        if got < expected {
            return Err(DecodeError::ShortRead {
                expected,
                actual: got,
            }
            .into());
        }

        Ok(Some(Frame::new(header, Bytes::from(payload))))
    }

    /// Read one frame and parse it into a structured message.
    pub async fn read_message<R, C>(
        reader: &mut R,
        codec: &C,
        max_payload_size: u32,
    ) -> Result<Option<(MessageType, C::Message)>>
    where
        R: AsyncRead + Unpin,
        C: MessageCodec,
    {
        match Self::read_frame(reader, max_payload_size).await? {
            Some(frame) => {
                let message = Self::decode(codec, &frame)?;
                Ok(Some((frame.message_type(), message)))
            }
            None => Ok(None),
        }
    }
}

/// Fill `buf` from the reader, stopping early only at end of stream.
async fn read_full<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
