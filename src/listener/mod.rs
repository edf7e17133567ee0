//! Listener module - per-consumer event queues and their registry.
//!
//! Provides:
//! - [`ListenerRegistry`] - the set of consumers of one connection
//! - [`EventReceiver`] - the receiving end of one consumer's bounded queue
//! - [`ListenerId`] - identity used to register and remove consumers
//!
//! # Example
//!
//! ```
//! use signer_link::listener::{ListenerId, ListenerRegistry};
//! use signer_link::event::{Event, SystemEventKind};
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let registry = ListenerRegistry::<()>::new(32, CancellationToken::new());
//! let mut rx = registry.add(ListenerId::from(1)).await.unwrap();
//!
//! registry.dispatch(&Event::System(SystemEventKind::Connected)).await;
//! assert!(rx.try_recv().unwrap().is(SystemEventKind::Connected));
//! # }
//! ```

mod receiver;
mod registry;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

pub use receiver::EventReceiver;
pub use registry::ListenerRegistry;

/// Default capacity of every listener queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 32;

/// Identity of a registered consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

// Generated ids start high so they never collide with small hand-picked ones.
static NEXT_ID: AtomicU64 = AtomicU64::new(1 << 32);

impl ListenerId {
    /// Allocate a fresh id, unique within the process.
    pub fn next() -> Self {
        ListenerId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Numeric value of the id.
    #[inline]
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for ListenerId {
    fn from(id: u64) -> Self {
        ListenerId(id)
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
