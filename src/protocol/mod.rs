//! Protocol module - wire format, framing, and message types.
//!
//! This module implements the binary framing shared by both transports:
//! - 8-byte header (`"##"` magic, header code, payload length)
//! - Frame buffer for accumulating partial reads
//! - Frame codec bridging frames and structured messages
//! - Registry of message types and their header codes

mod frame;
mod frame_buffer;
mod message_type;
mod wire_format;

pub use frame::{Frame, FrameCodec};
pub use frame_buffer::FrameBuffer;
pub use message_type::MessageType;
pub use wire_format::{has_magic, Header, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE, MAGIC};
