//! Listener registry for fanning events out to every consumer.
//!
//! Each registration owns a bounded queue. Dispatch walks the registered set
//! under a read lock and pushes a clone of the event into every queue in
//! registration order, waiting whenever a queue is full. A slow consumer
//! therefore throttles delivery to all consumers; nothing is dropped or
//! reordered.
//!
//! Membership changes take the write lock, so they never interleave with a
//! dispatch pass. Removal first cancels the listener's slot, which releases a
//! dispatch that is blocked on that listener's full queue and lets the write
//! lock be acquired.
//!
//! A slot whose token is cancelled or whose receiver was dropped counts as
//! removed from that moment on, even if it is still linked. Dead slots are
//! unlinked by the next `add`, `dispatch` or `try_dispatch`.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::{EventReceiver, ListenerId};
use crate::error::{Result, SignerError};
use crate::event::Event;

struct Slot<M> {
    tx: mpsc::Sender<Event<M>>,
    closed: CancellationToken,
}

impl<M> Slot<M> {
    fn is_live(&self) -> bool {
        !self.closed.is_cancelled() && !self.tx.is_closed()
    }
}

type Entries<M> = Vec<(ListenerId, Arc<Slot<M>>)>;

/// Thread-safe set of listeners belonging to one connection.
pub struct ListenerRegistry<M> {
    entries: RwLock<Entries<M>>,
    /// Close tokens, reachable while a dispatch holds the read lock.
    tokens: parking_lot::Mutex<HashMap<ListenerId, CancellationToken>>,
    capacity: usize,
    shutdown: CancellationToken,
}

impl<M> ListenerRegistry<M> {
    /// Create an empty registry.
    ///
    /// `shutdown` aborts any dispatch that is waiting on a full queue.
    pub fn new(capacity: usize, shutdown: CancellationToken) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            tokens: parking_lot::Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
            shutdown,
        }
    }

    /// Queue capacity given to new listeners.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Register a listener and return its queue.
    ///
    /// # Errors
    ///
    /// [`SignerError::DuplicateListener`] if `id` is already registered.
    pub async fn add(&self, id: ListenerId) -> Result<EventReceiver<M>> {
        let mut entries = self.entries.write().await;
        self.unlink_dead(&mut entries);
        if entries.iter().any(|(existing, _)| *existing == id) {
            return Err(SignerError::DuplicateListener(id));
        }

        let (tx, rx) = mpsc::channel(self.capacity);
        let closed = CancellationToken::new();
        self.tokens.lock().insert(id, closed.clone());
        entries.push((id, Arc::new(Slot { tx, closed })));

        debug!("listener {} added", id);
        Ok(EventReceiver::new(id, rx))
    }

    /// Unregister a listener and discard its queue.
    ///
    /// The listener stops receiving as soon as this is called, even if the
    /// returned future is dropped before it unlinks the slot.
    ///
    /// # Errors
    ///
    /// [`SignerError::UnknownListener`] if `id` is not registered.
    pub async fn remove(&self, id: ListenerId) -> Result<()> {
        let token = self
            .tokens
            .lock()
            .get(&id)
            .filter(|token| !token.is_cancelled())
            .cloned()
            .ok_or(SignerError::UnknownListener(id))?;
        token.cancel();

        let mut entries = self.entries.write().await;
        self.unlink_dead(&mut entries);

        debug!("listener {} removed", id);
        Ok(())
    }

    /// Check whether `id` is registered.
    pub async fn contains(&self, id: ListenerId) -> bool {
        self.entries
            .read()
            .await
            .iter()
            .any(|(existing, slot)| *existing == id && slot.is_live())
    }

    /// Number of registered listeners.
    pub async fn len(&self) -> usize {
        self.entries
            .read()
            .await
            .iter()
            .filter(|(_, slot)| slot.is_live())
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop every dead slot and its token.
    fn unlink_dead(&self, entries: &mut Entries<M>) {
        let mut tokens = self.tokens.lock();
        entries.retain(|(id, slot)| {
            if slot.is_live() {
                return true;
            }
            tokens.remove(id);
            trace!("listener {} unlinked", id);
            false
        });
    }

    /// Take the write lock and drop dead slots.
    async fn prune(&self) {
        let mut entries = self.entries.write().await;
        self.unlink_dead(&mut entries);
    }

    /// Push `event` into every listener queue, waiting on full queues.
    ///
    /// Returns the number of queues that accepted the event. Stops early if
    /// the registry's shutdown token is cancelled.
    pub async fn dispatch(&self, event: &Event<M>) -> usize {
        let entries = self.entries.read().await;
        let mut delivered = 0;
        let mut stale = false;

        for (id, slot) in entries.iter() {
            if !slot.is_live() {
                stale = true;
                continue;
            }
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    trace!("dispatch aborted by shutdown");
                    return delivered;
                }
                _ = slot.closed.cancelled() => {
                    trace!("listener {} closed during dispatch", id);
                    stale = true;
                }
                sent = slot.tx.send(event.clone()) => match sent {
                    Ok(()) => delivered += 1,
                    Err(_) => {
                        trace!("listener {} dropped its receiver", id);
                        stale = true;
                    }
                },
            }
        }
        drop(entries);

        if stale {
            self.prune().await;
        }
        delivered
    }

    /// Push `event` into every queue that has room, without waiting.
    pub async fn try_dispatch(&self, event: &Event<M>) -> usize {
        let entries = self.entries.read().await;
        let delivered = entries
            .iter()
            .filter(|(_, slot)| slot.is_live())
            .filter(|(id, slot)| match slot.tx.try_send(event.clone()) {
                Ok(()) => true,
                Err(_) => {
                    trace!("listener {} skipped: queue full or closed", id);
                    false
                }
            })
            .count();
        let stale = entries.iter().any(|(_, slot)| !slot.is_live());
        drop(entries);

        if stale {
            self.prune().await;
        }
        delivered
    }

    /// Remove every listener, closing their queues.
    pub async fn clear(&self) {
        for token in self.tokens.lock().values() {
            token.cancel();
        }
        let mut entries = self.entries.write().await;
        entries.clear();
        self.tokens.lock().clear();
    }
}
