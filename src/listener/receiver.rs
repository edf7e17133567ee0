//! Receiving end of one listener queue.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

use super::ListenerId;
use crate::error::{Result, SignerError};
use crate::event::Event;

/// Bounded FIFO of events for a single listener.
///
/// Events arrive in exactly the order the read loop decoded them. Once the
/// listener is removed or the engine closes, already queued events can still
/// be read; after that every receive reports the queue as closed.
#[derive(Debug)]
pub struct EventReceiver<M> {
    id: ListenerId,
    rx: mpsc::Receiver<Event<M>>,
}

impl<M> EventReceiver<M> {
    pub(super) fn new(id: ListenerId, rx: mpsc::Receiver<Event<M>>) -> Self {
        Self { id, rx }
    }

    /// Id this queue is registered under.
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Wait for the next event.
    ///
    /// Returns `None` once the queue is closed and empty.
    pub async fn recv(&mut self) -> Option<Event<M>> {
        self.rx.recv().await
    }

    /// Wait for the next event for at most `timeout`.
    ///
    /// # Errors
    ///
    /// [`SignerError::Timeout`] if nothing arrived in time,
    /// [`SignerError::NotConnected`] if the queue is closed and empty.
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Result<Event<M>> {
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(Some(event)) => Ok(event),
            Ok(None) => Err(SignerError::NotConnected),
            Err(_) => Err(SignerError::Timeout(timeout)),
        }
    }

    /// Take the next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<Event<M>> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Take every event currently queued, oldest first.
    pub fn drain(&mut self) -> Vec<Event<M>> {
        let mut events = Vec::with_capacity(self.rx.len());
        while let Some(event) = self.try_recv() {
            events.push(event);
        }
        events
    }

    /// Number of queued events.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Check whether the sending side is gone.
    pub fn is_closed(&self) -> bool {
        self.rx.is_closed()
    }
}
