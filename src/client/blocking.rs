//! Sequential facade: each call sends, then waits for the next event.

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

/// Facade for scripted, one-request-at-a-time use.
///
/// Every outbound call returns the next event on this client's queue, which
/// is not necessarily the reply to that call: an `EOF` or `FAILURE` that
/// arrives first is returned instead.
pub struct BlockingClient<T: Transport, C: RequestFactory> {
    engine: Arc<ConnectionEngine<T, C>>,
    events: EventReceiver<C::Message>,
    session_id: SessionId,
    response_timeout: Duration,
}

impl<T: Transport, C: RequestFactory> BlockingClient<T, C> {
    /// Build an engine for `transport` and attach to it.
    pub async fn new(transport: T, codec: C, config: EngineConfig) -> Result<Self> {
        Self::attach(Arc::new(ConnectionEngine::new(transport, codec, config))).await
    }

    /// Register a fresh listener on an existing engine.
    pub async fn attach(engine: Arc<ConnectionEngine<T, C>>) -> Result<Self> {
        let events = engine.add_listener(ListenerId::next()).await?;
        let response_timeout = engine.config().response_timeout_duration();
        Ok(Self {
            engine,
            events,
            session_id: SessionId::generate(),
            response_timeout,
        })
    }

    /// Override how long each call waits for its event.
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
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

    /// Connect and return the first event, normally `CONNECTED`.
    pub async fn connect(&mut self) -> Result<Event<C::Message>> {
        self.engine.connect().await?;
        self.next_event().await
    }

    /// Send `message` and wait for the next event.
    pub async fn call(&mut self, message: &C::Message) -> Result<Event<C::Message>> {
        self.engine.send_message(message).await?;
        self.next_event().await
    }

    pub async fn ping(&mut self, text: &str) -> Result<Event<C::Message>> {
        let message = self.engine.codec().ping(text);
        self.call(&message).await
    }

    /// Send `INITIALIZE` with this client's session id.
    pub async fn initialize(&mut self) -> Result<Event<C::Message>> {
        let message = self.engine.codec().initialize(&self.session_id);
        self.call(&message).await
    }

    /// Wait for the next event without sending anything.
    ///
    /// # Errors
    ///
    /// [`SignerError::Timeout`](crate::SignerError::Timeout) after the
    /// response timeout, [`SignerError::NotConnected`](crate::SignerError::NotConnected)
    /// once the queue is closed.
    pub async fn next_event(&mut self) -> Result<Event<C::Message>> {
        self.events.recv_timeout(self.response_timeout).await
    }

    /// Drop events already queued; returns how many.
    pub fn discard_pending(&mut self) -> usize {
        self.events.drain().len()
    }

    /// Close the underlying engine.
    pub async fn close(&self) -> Result<()> {
        self.engine.close().await
    }
}

impl<C: RequestFactory> BlockingClient<BoxedTransport, C> {
    /// Engine and facade from a [`ClientConfig`].
    pub async fn from_config(config: &ClientConfig, codec: C) -> Result<Self> {
        Self::attach(Arc::new(engine_from_config(config, codec)?)).await
    }
}
