//! Frame buffer for accumulating partial reads.
//!
//! Transports hand over bytes in whatever pieces the socket or the HID
//! reassembler produced. The buffer runs a small state machine:
//! - `WaitingForHeader`: need at least 8 bytes
//! - `WaitingForPayload`: header parsed, need N more payload bytes
//!
//! # Example
//!
//! ```
//! use signer_link::protocol::{FrameBuffer, FrameCodec, MessageType};
//!
//! let mut buffer = FrameBuffer::new();
//! let bytes = FrameCodec::encode(MessageType::Success, b"ok").unwrap();
//!
//! assert!(buffer.push(&bytes[..3]).unwrap().is_empty());
//! let frames = buffer.push(&bytes[3..]).unwrap();
//! assert_eq!(frames[0].message_type(), MessageType::Success);
//! ```

use bytes::{Bytes, BytesMut};
use tracing::warn;

use super::wire_format::{has_magic, Header, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE};
use super::Frame;
use crate::error::DecodeError;

type Result<T> = std::result::Result<T, DecodeError>;

/// State machine for frame parsing.
#[derive(Debug, Clone)]
enum State {
    /// Waiting for complete header (need 8 bytes).
    WaitingForHeader,
    /// Header parsed, waiting for payload bytes.
    WaitingForPayload { header: Header },
}

/// Buffer for accumulating incoming bytes and extracting complete frames.
///
/// Owned by exactly one read loop; never shared between tasks.
#[derive(Debug)]
pub struct FrameBuffer {
    buffer: BytesMut,
    state: State,
    max_payload_size: u32,
}

impl FrameBuffer {
    /// Create a new frame buffer with the default payload limit (16 MiB).
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD_SIZE)
    }

    /// Create a new frame buffer with a custom payload limit.
    pub fn with_max_payload(max_payload_size: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(4 * 1024),
            state: State::WaitingForHeader,
            max_payload_size,
        }
    }

    /// Push data into the buffer and extract all complete frames.
    ///
    /// Partial data is kept for the next push.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Oversized`] if a header announces a payload
    /// larger than the limit. The buffer should be discarded afterwards.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Frame>> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.try_extract_one()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    /// Signal that the stream ended.
    ///
    /// Succeeds only on a frame boundary; leftover bytes mean the peer
    /// stopped mid-frame.
    pub fn finish(&mut self) -> Result<()> {
        let outcome = match &self.state {
            State::WaitingForHeader if self.buffer.is_empty() => Ok(()),
            State::WaitingForHeader => Err(DecodeError::ShortRead {
                expected: HEADER_SIZE,
                actual: self.buffer.len(),
            }),
            State::WaitingForPayload { header } => Err(DecodeError::ShortRead {
                expected: header.payload_length as usize,
                actual: self.buffer.len(),
            }),
        };
        self.clear();
        outcome
    }

    fn try_extract_one(&mut self) -> Result<Option<Frame>> {
        loop {
            match &self.state {
                State::WaitingForHeader => {
                    let Some(header) = Header::decode(&self.buffer) else {
                        return Ok(None);
                    };
                    if !has_magic(&self.buffer) {
                        warn!(
                            "frame magic mismatch: {:02x}{:02x}",
                            self.buffer[0], self.buffer[1]
                        );
                    }
                    header.validate(self.max_payload_size)?;

                    let _ = self.buffer.split_to(HEADER_SIZE);

                    if header.payload_length == 0 {
                        return Ok(Some(Frame::new(header, Bytes::new())));
                    }
                    self.state = State::WaitingForPayload { header };
                }

                State::WaitingForPayload { header } => {
                    let remaining = header.payload_length as usize;
                    if self.buffer.len() < remaining {
                        return Ok(None);
                    }

                    let header = *header;
                    let payload = self.buffer.split_to(remaining).freeze();
                    self.state = State::WaitingForHeader;
                    return Ok(Some(Frame::new(header, payload)));
                }
            }
        }
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear the buffer and reset state.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = State::WaitingForHeader;
    }

    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match &self.state {
            State::WaitingForHeader => "WaitingForHeader",
            State::WaitingForPayload { .. } => "WaitingForPayload",
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{FrameCodec, MessageType};

    #[test]
    fn test_single_complete_frame() {
        let mut buffer = FrameBuffer::new();
        let bytes = FrameCodec::encode(MessageType::Success, b"hello").unwrap();

        let frames = buffer.push(&bytes).unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].message_type(), MessageType::Success);
        assert_eq!(frames[0].payload(), b"hello");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_multiple_frames_in_one_push() {
        let mut buffer = FrameBuffer::new();

        let mut combined = FrameCodec::encode(MessageType::ButtonRequest, b"").unwrap();
        combined.extend(FrameCodec::encode(MessageType::Features, b"second").unwrap());
        combined.extend(FrameCodec::encode(MessageType::Success, b"third").unwrap());

        let frames = buffer.push(&combined).unwrap();

        let types: Vec<_> = frames.iter().map(Frame::message_type).collect();
        assert_eq!(
            types,
            vec![
                MessageType::ButtonRequest,
                MessageType::Features,
                MessageType::Success
            ]
        );
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_fragmented_header() {
        let mut buffer = FrameBuffer::new();
        let bytes = FrameCodec::encode(MessageType::Ping, b"test").unwrap();

        assert!(buffer.push(&bytes[..5]).unwrap().is_empty());
        assert_eq!(buffer.state_name(), "WaitingForHeader");

        let frames = buffer.push(&bytes[5..]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].message_type(), MessageType::Ping);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_fragmented_payload() {
        let mut buffer = FrameBuffer::new();
        let payload = b"this is a longer payload that will be fragmented";
        let bytes = FrameCodec::encode(MessageType::TxRequest, payload).unwrap();

        let partial_len = HEADER_SIZE + 10;
        assert!(buffer.push(&bytes[..partial_len]).unwrap().is_empty());
        assert_eq!(buffer.state_name(), "WaitingForPayload");

        let frames = buffer.push(&bytes[partial_len..]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload(), payload);
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut buffer = FrameBuffer::new();
        let bytes = FrameCodec::encode(MessageType::Address, b"hi").unwrap();

        let mut all_frames = Vec::new();
        for byte in &bytes {
            all_frames.extend(buffer.push(&[*byte]).unwrap());
        }

        assert_eq!(all_frames.len(), 1);
        assert_eq!(all_frames[0].payload(), b"hi");
    }

    #[test]
    fn test_max_payload_validation() {
        let mut buffer = FrameBuffer::with_max_payload(100);
        let header = Header::new(2, 1000).encode();

        let result = buffer.push(&header);
        assert!(matches!(
            result,
            Err(DecodeError::Oversized {
                size: 1000,
                max: 100
            })
        ));
    }

    #[test]
    fn test_bad_magic_still_parses() {
        let mut buffer = FrameBuffer::new();
        let mut bytes = FrameCodec::encode(MessageType::Success, b"x").unwrap();
        bytes[0] = b'?';

        let frames = buffer.push(&bytes).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload(), b"x");
    }

    #[test]
    fn test_finish_on_boundary() {
        let mut buffer = FrameBuffer::new();
        buffer
            .push(&FrameCodec::encode(MessageType::Success, b"").unwrap())
            .unwrap();
        assert!(buffer.finish().is_ok());
    }

    #[test]
    fn test_finish_mid_payload_is_short_read() {
        let mut buffer = FrameBuffer::new();
        let bytes = FrameCodec::encode(MessageType::Success, b"hello").unwrap();
        buffer.push(&bytes[..HEADER_SIZE + 3]).unwrap();

        let result = buffer.finish();
        assert!(matches!(
            result,
            Err(DecodeError::ShortRead {
                expected: 5,
                actual: 3
            })
        ));
        assert!(buffer.is_empty());
        assert_eq!(buffer.state_name(), "WaitingForHeader");
    }

    #[test]
    fn test_finish_mid_header_is_short_read() {
        let mut buffer = FrameBuffer::new();
        buffer.push(b"##\x00").unwrap();
        assert!(matches!(
            buffer.finish(),
            Err(DecodeError::ShortRead {
                expected: 8,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_clear_resets_state() {
        let mut buffer = FrameBuffer::new();
        let bytes = FrameCodec::encode(MessageType::Success, b"test").unwrap();
        buffer.push(&bytes[..HEADER_SIZE]).unwrap();
        assert_eq!(buffer.state_name(), "WaitingForPayload");

        buffer.clear();

        assert_eq!(buffer.state_name(), "WaitingForHeader");
        assert!(buffer.is_empty());
    }
}
