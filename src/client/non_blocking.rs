//! Polling facade: sends return at once, events are read from the queue.

use std::sync::Arc;
use std::time::Duration;

use super::{engine_from_config, SessionId};
use crate::codec::RequestFactory;
use crate::config::{ClientConfig, EngineConfig};
use crate::engine::ConnectionEngine;
use crate::error::Result;
use crate::event::Event;
use crate::listener::{EventReceiver, ListenerId};
use crate::transport::{BoxedTransport, Transport};

/// Facade for callers that must not wait on device I/O.
pub struct NonBlockingClient<T: Transport, C: RequestFactory> {
    engine: Arc<ConnectionEngine<T, C>>,
    events: EventReceiver<C::Message>,
    session_id: SessionId,
}

impl<T: Transport, C: RequestFactory> NonBlockingClient<T, C> {
    /// Build an engine for `transport` and attach to it.
    pub async fn new(transport: T, codec: C, config: EngineConfig) -> Result<Self> {
        Self::attach(Arc::new(ConnectionEngine::new(transport, codec, config))).await
    }

    /// Register a fresh listener on an existing engine.
    pub async fn attach(engine: Arc<ConnectionEngine<T, C>>) -> Result<Self> {
        let events = engine.add_listener(ListenerId::next()).await?;
        Ok(Self {
            engine,
            events,
            session_id: SessionId::generate(),
        })
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn listener_id(&self) -> ListenerId {
        self.events.id()
    }

    pub fn engine(&self) -> &Arc<ConnectionEngine<T, C>> {
        &self.engine
    }

    /// Connect; `CONNECTED` is queued for this client.
    pub async fn connect(&self) -> Result<()> {
        self.engine.connect().await
    }

    /// Send `message` without waiting for a reply.
    pub async fn send(&self, message: &C::Message) -> Result<()> {
        self.engine.send_message(message).await
    }

    pub async fn ping(&self, text: &str) -> Result<()> {
        self.send(&self.engine.codec().ping(text)).await
    }

    pub async fn initialize(&self) -> Result<()> {
        self.send(&self.engine.codec().initialize(&self.session_id))
            .await
    }

    /// Wait up to `timeout` for the next event.
    pub async fn poll_event(&mut self, timeout: Duration) -> Result<Event<C::Message>> {
        self.events.recv_timeout(timeout).await
    }

    /// Wait for the next event; `None` once the engine is closed and the
    /// queue is drained.
    pub async fn next_event(&mut self) -> Option<Event<C::Message>> {
        self.events.recv().await
    }

    /// Next event if one is queued.
    pub fn try_event(&mut self) -> Option<Event<C::Message>> {
        self.events.try_recv()
    }

    /// Every event queued right now, oldest first.
    pub fn drain(&mut self) -> Vec<Event<C::Message>> {
        self.events.drain()
    }

    /// Events waiting in the queue.
    pub fn pending(&self) -> usize {
        self.events.len()
    }

    /// Close the underlying engine.
    pub async fn close(&self) -> Result<()> {
        self.engine.close().await
    }
}

impl<C: RequestFactory> NonBlockingClient<BoxedTransport, C> {
    /// Engine and facade from a [`ClientConfig`].
    pub async fn from_config(config: &ClientConfig, codec: C) -> Result<Self> {
        Self::attach(Arc::new(engine_from_config(config, codec)?)).await
    }
}
