//! # signer-link
//!
//! Client protocol engine for hardware signers reached over TCP or USB HID.
//!
//! Every message travels in a frame: the `##` magic, a big-endian `u16`
//! message type, a big-endian `u32` payload length and the payload. Over USB
//! the frames are additionally cut into 64-byte HID reports.
//!
//! ## Architecture
//!
//! - **Transport** ([`transport`]): opens the link and moves raw bytes
//! - **Engine** ([`engine`]): owns the link, runs the read loop, decodes frames
//! - **Listeners** ([`listener`]): bounded per-consumer event queues
//! - **Facades** ([`client`]): blocking and non-blocking call styles
//!
//! ## Example
//!
//! ```no_run
//! use signer_link::{BlockingClient, ClientConfig, RawCodec};
//!
//! #[tokio::main]
//! async fn main() -> signer_link::Result<()> {
//!     let config = ClientConfig::load("signer.toml")?;
//!     let mut client = BlockingClient::from_config(&config, RawCodec).await?;
//!
//!     client.connect().await?;
//!     let reply = client.initialize().await?;
//!     println!("device answered {}", reply);
//!
//!     client.close().await
//! }
//! ```

pub mod client;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod hid;
pub mod listener;
pub mod protocol;
pub mod transport;

pub use client::{BlockingClient, NonBlockingClient, SessionId};
pub use codec::{MessageCodec, MsgPackCodec, RawCodec, RawMessage, RequestFactory};
pub use config::{ClientConfig, EngineConfig, HidConfig, StreamConfig, TransportConfig};
pub use engine::{ConnectionEngine, ConnectionState};
pub use error::{DecodeError, Result, SignerError};
pub use event::{Event, SystemEventKind};
pub use listener::{EventReceiver, ListenerId};
pub use protocol::{Frame, FrameCodec, MessageType};
pub use transport::{HidTransport, StreamTransport, Transport};
