//! Connection engine and its read loop.
//!
//! The [`ConnectionEngine`] owns one transport for one logical connection.
//! Its lifecycle only moves forward:
//! 1. `Disconnected` - created, nothing opened yet
//! 2. `Connecting` - `connect()` is opening the transport
//! 3. `Connected` - the read loop is running, sends are accepted
//! 4. `Closed` - `close()` was called; terminal
//!
//! A failed `connect()` falls back to `Disconnected` and may be retried. A
//! fatal read error leaves the engine `Connected` but stops the read loop and
//! reports `FAILURE` to every listener; reconnecting is up to the caller.
//!
//! # Example
//!
//! ```no_run
//! use signer_link::codec::RawCodec;
//! use signer_link::config::EngineConfig;
//! use signer_link::engine::ConnectionEngine;
//! use signer_link::listener::ListenerId;
//! use signer_link::transport::StreamTransport;
//!
//! # async fn run() -> signer_link::Result<()> {
//! let engine = ConnectionEngine::new(
//!     StreamTransport::to("localhost", 3000),
//!     RawCodec,
//!     EngineConfig::default(),
//! );
//! let mut events = engine.add_listener(ListenerId::next()).await?;
//! engine.connect().await?;
//!
//! while let Some(event) = events.recv().await {
//!     println!("{}", event);
//! }
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::codec::MessageCodec;
use crate::config::EngineConfig;
use crate::error::{Result, SignerError};
use crate::event::{Event, SystemEventKind};
use crate::listener::{EventReceiver, ListenerId, ListenerRegistry};
use crate::protocol::{Frame, FrameBuffer, FrameCodec, MessageType};
use crate::transport::{Received, Transport, TransportReader, TransportWriter};

/// Lifecycle state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Drives one transport: a background read loop publishing events to
/// listeners, and outbound sends from any task.
pub struct ConnectionEngine<T: Transport, C: MessageCodec> {
    transport: tokio::sync::Mutex<T>,
    writer: tokio::sync::Mutex<Option<T::Writer>>,
    codec: Arc<C>,
    listeners: Arc<ListenerRegistry<C::Message>>,
    state: parking_lot::Mutex<ConnectionState>,
    read_task: parking_lot::Mutex<Option<JoinHandle<()>>>,
    shutdown: CancellationToken,
    config: EngineConfig,
}

impl<T: Transport, C: MessageCodec> ConnectionEngine<T, C> {
    /// Create a disconnected engine.
    pub fn new(transport: T, codec: C, config: EngineConfig) -> Self {
        let shutdown = CancellationToken::new();
        let listeners = ListenerRegistry::new(config.queue_capacity, shutdown.clone());
        Self {
            transport: tokio::sync::Mutex::new(transport),
            writer: tokio::sync::Mutex::new(None),
            codec: Arc::new(codec),
            listeners: Arc::new(listeners),
            state: parking_lot::Mutex::new(ConnectionState::Disconnected),
            read_task: parking_lot::Mutex::new(None),
            shutdown,
            config,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Codec used for every frame on this connection.
    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Register a listener; it sees every event dispatched from now on.
    ///
    /// # Errors
    ///
    /// [`SignerError::DuplicateListener`] if `id` is taken,
    /// [`SignerError::NotConnected`] after `close()`.
    pub async fn add_listener(&self, id: ListenerId) -> Result<EventReceiver<C::Message>> {
        if self.state() == ConnectionState::Closed {
            return Err(SignerError::NotConnected);
        }
        self.listeners.add(id).await
    }

    /// Unregister a listener and discard its queue.
    pub async fn remove_listener(&self, id: ListenerId) -> Result<()> {
        self.listeners.remove(id).await
    }

    /// Number of registered listeners.
    pub async fn listener_count(&self) -> usize {
        self.listeners.len().await
    }

    /// Open the transport and start the read loop.
    ///
    /// Listeners receive `CONNECTED` before any protocol event.
    ///
    /// # Errors
    ///
    /// The transport's open error (the engine stays `Disconnected`),
    /// [`SignerError::AlreadyConnected`] while connecting or connected,
    /// [`SignerError::NotConnected`] after `close()`.
    pub async fn connect(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            match *state {
                ConnectionState::Disconnected => *state = ConnectionState::Connecting,
                ConnectionState::Connecting | ConnectionState::Connected => {
                    return Err(SignerError::AlreadyConnected)
                }
                ConnectionState::Closed => return Err(SignerError::NotConnected),
            }
        }

        let (target, opened) = {
            let mut transport = self.transport.lock().await;
            (transport.target(), transport.open().await)
        };
        let (reader, writer) = match opened {
            Ok(halves) => halves,
            Err(e) => {
                let mut state = self.state.lock();
                if *state == ConnectionState::Connecting {
                    *state = ConnectionState::Disconnected;
                }
                warn!("Failed to connect to {}: {}", target, e);
                return Err(e);
            }
        };

        *self.writer.lock().await = Some(writer);
        if !self.transition(ConnectionState::Connecting, ConnectionState::Connected) {
            // Closed while the transport was opening.
            let writer = self.writer.lock().await.take();
            if let Some(mut writer) = writer {
                let _ = writer.close().await;
            }
            return Err(SignerError::NotConnected);
        }
        info!("Connected to {}", target);

        self.listeners
            .dispatch(&Event::System(SystemEventKind::Connected))
            .await;
        if self.shutdown.is_cancelled() {
            return Err(SignerError::NotConnected);
        }

        let read_loop = ReadLoop {
            codec: Arc::clone(&self.codec),
            listeners: Arc::clone(&self.listeners),
            shutdown: self.shutdown.clone(),
            max_payload_size: self.config.max_payload_size,
            eof_poll_interval: self.config.eof_poll_interval_duration(),
        };
        let handle = tokio::spawn(read_loop.run(reader));
        *self.read_task.lock() = Some(handle);

        Ok(())
    }

    /// Move from `from` to `to`; false if the state was not `from`.
    fn transition(&self, from: ConnectionState, to: ConnectionState) -> bool {
        let mut state = self.state.lock();
        if *state != from {
            return false;
        }
        *state = to;
        true
    }

    /// Serialize `message`, frame it and write it to the transport.
    ///
    /// # Errors
    ///
    /// [`SignerError::NotConnected`] unless the engine is `Connected`; any
    /// serialization or transport write error.
    pub async fn send_message(&self, message: &C::Message) -> Result<()> {
        if !self.is_connected() {
            return Err(SignerError::NotConnected);
        }
        let (message_type, bytes) = FrameCodec::encode_message(self.codec.as_ref(), message)?;
        self.send_frame(message_type, &bytes).await
    }

    /// Write an already serialized payload under `message_type`.
    pub async fn send_raw(&self, message_type: MessageType, payload: &[u8]) -> Result<()> {
        if !self.is_connected() {
            return Err(SignerError::NotConnected);
        }
        let bytes = FrameCodec::encode(message_type, payload)?;
        self.send_frame(message_type, &bytes).await
    }

    async fn send_frame(&self, message_type: MessageType, bytes: &[u8]) -> Result<()> {
        let mut writer = self.writer.lock().await;
        let writer = writer.as_mut().ok_or(SignerError::NotConnected)?;
        writer.send(bytes).await?;
        debug!("> {}", message_type);
        Ok(())
    }

    /// Stop the read loop, close the transport and discard every listener.
    ///
    /// Waits at most the configured grace period for the read loop, then
    /// aborts it. Listeners get a best-effort `DISCONNECTED`. Calling this
    /// again is a no-op.
    pub async fn close(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            if *state == ConnectionState::Closed {
                return Ok(());
            }
            *state = ConnectionState::Closed;
        }
        self.shutdown.cancel();

        let handle = self.read_task.lock().take();
        if let Some(mut handle) = handle {
            let grace = self.config.shutdown_grace_duration();
            if tokio::time::timeout(grace, &mut handle).await.is_err() {
                warn!("Read loop did not stop within {:?}, aborting", grace);
                handle.abort();
            }
        }

        let writer = self.writer.lock().await.take();
        let result = match writer {
            Some(mut writer) => writer.close().await,
            None => Ok(()),
        };
        if let Err(e) = &result {
            warn!("Error while closing transport: {}", e);
        }

        self.listeners
            .try_dispatch(&Event::System(SystemEventKind::Disconnected))
            .await;
        self.listeners.clear().await;
        info!("Disconnected");

        result
    }
}

impl<T: Transport, C: MessageCodec> Drop for ConnectionEngine<T, C> {
    fn drop(&mut self) {
        self.shutdown.cancel();
        if let Some(handle) = self.read_task.get_mut().take() {
            handle.abort();
        }
    }
}

/// State moved into the background read task.
struct ReadLoop<C: MessageCodec> {
    codec: Arc<C>,
    listeners: Arc<ListenerRegistry<C::Message>>,
    shutdown: CancellationToken,
    max_payload_size: u32,
    eof_poll_interval: Duration,
}

impl<C: MessageCodec> ReadLoop<C> {
    /// Receive until shutdown or the first fatal error.
    async fn run<R: TransportReader>(self, mut reader: R) {
        let mut frames = FrameBuffer::with_max_payload(self.max_payload_size);
        let mut at_eof = false;

        loop {
            let received = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                received = reader.receive() => received,
            };

            let outcome = match received {
                Ok(Received::Data(bytes)) => {
                    at_eof = false;
                    self.handle_data(&mut frames, &bytes).await
                }
                Ok(Received::Idle) => Ok(()),
                Ok(Received::EndOfStream) => match frames.finish() {
                    Ok(()) => {
                        if !at_eof {
                            at_eof = true;
                            info!("Peer closed the stream");
                            self.emit(SystemEventKind::Eof).await;
                        }
                        tokio::select! {
                            _ = self.shutdown.cancelled() => break,
                            _ = tokio::time::sleep(self.eof_poll_interval) => {}
                        }
                        Ok(())
                    }
                    Err(e) => Err(e.into()),
                },
                Err(e) => Err(e),
            };

            if let Err(e) = outcome {
                if self.shutdown.is_cancelled() {
                    break;
                }
                error!("Read loop error: {}", e);
                self.emit(SystemEventKind::Failure).await;
                break;
            }
        }

        debug!("Read loop stopped");
    }

    /// Decode every complete frame in `bytes` and dispatch it in order.
    async fn handle_data(&self, frames: &mut FrameBuffer, bytes: &[u8]) -> Result<()> {
        for frame in frames.push(bytes)? {
            self.dispatch_frame(&frame).await?;
        }
        Ok(())
    }

    async fn dispatch_frame(&self, frame: &Frame) -> Result<()> {
        let message_type = frame.message_type();
        let message = FrameCodec::decode(self.codec.as_ref(), frame)?;

        if message_type == MessageType::Failure {
            warn!("< {} {:?}", message_type, message);
        } else {
            debug!("< {}", message_type);
        }

        self.listeners
            .dispatch(&Event::protocol(message_type, message))
            .await;
        Ok(())
    }

    async fn emit(&self, kind: SystemEventKind) {
        self.listeners.dispatch(&Event::System(kind)).await;
    }
}
