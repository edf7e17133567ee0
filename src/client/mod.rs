//! Client facades - sequential and polling presentations of one connection.
//!
//! Both facades wrap a shared [`ConnectionEngine`] and own one listener
//! queue. They add no protocol logic:
//! - [`BlockingClient`] sends a request, then waits for the next event
//! - [`NonBlockingClient`] sends and returns; the caller polls its queue
//!
//! # Example
//!
//! ```no_run
//! use signer_link::client::BlockingClient;
//! use signer_link::codec::RawCodec;
//! use signer_link::config::EngineConfig;
//! use signer_link::transport::StreamTransport;
//!
//! # async fn run() -> signer_link::Result<()> {
//! let mut client = BlockingClient::new(
//!     StreamTransport::to("localhost", 3000),
//!     RawCodec,
//!     EngineConfig::default(),
//! )
//! .await?;
//!
//! println!("{}", client.connect().await?);
//! println!("{}", client.ping("hello").await?);
//! client.close().await?;
//! # Ok(())
//! # }
//! ```

mod blocking;
mod non_blocking;
mod session;

pub use blocking::BlockingClient;
pub use non_blocking::NonBlockingClient;
pub use session::{SessionId, SESSION_ID_LEN};

use crate::codec::MessageCodec;
use crate::config::ClientConfig;
use crate::engine::ConnectionEngine;
use crate::error::Result;
use crate::transport::{self, BoxedTransport};

/// Engine over a transport picked from configuration.
pub type ConfiguredEngine<C> = ConnectionEngine<BoxedTransport, C>;

/// Validate `config` and build a disconnected engine for it.
pub fn engine_from_config<C: MessageCodec>(
    config: &ClientConfig,
    codec: C,
) -> Result<ConfiguredEngine<C>> {
    config.validate()?;
    let transport = transport::from_config(&config.transport)?;
    Ok(ConnectionEngine::new(transport, codec, config.engine.clone()))
}
