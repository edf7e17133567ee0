//! Events delivered to listeners.
//!
//! Events are built only by the connection engine's read loop and lifecycle
//! operations. Once dispatched they are immutable: every listener receives a
//! clone, and protocol messages are shared behind an `Arc`.

use std::fmt;
use std::sync::Arc;

use crate::protocol::MessageType;

/// Connection lifecycle signal synthesized by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemEventKind {
    /// The transport opened and the read loop started.
    Connected,
    /// The connection was closed locally.
    Disconnected,
    /// The peer closed the stream cleanly.
    Eof,
    /// The read loop hit a transport or decode error and stopped.
    Failure,
}

impl fmt::Display for SystemEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SystemEventKind::Connected => "CONNECTED",
            SystemEventKind::Disconnected => "DISCONNECTED",
            SystemEventKind::Eof => "EOF",
            SystemEventKind::Failure => "FAILURE",
        };
        f.write_str(name)
    }
}

/// An event observed by a listener.
#[derive(Debug)]
pub enum Event<M> {
    /// A message decoded from an inbound frame.
    Protocol {
        message_type: MessageType,
        message: Arc<M>,
    },
    /// A lifecycle signal.
    System(SystemEventKind),
}

// Manual impl: cloning only bumps the `Arc`, so `M` need not be `Clone`.
impl<M> Clone for Event<M> {
    fn clone(&self) -> Self {
        match self {
            Event::Protocol {
                message_type,
                message,
            } => Event::Protocol {
                message_type: *message_type,
                message: Arc::clone(message),
            },
            Event::System(kind) => Event::System(*kind),
        }
    }
}

impl<M> Event<M> {
    /// Wrap a decoded message.
    pub fn protocol(message_type: MessageType, message: M) -> Self {
        Event::Protocol {
            message_type,
            message: Arc::new(message),
        }
    }

    /// Message type of a protocol event.
    pub fn message_type(&self) -> Option<MessageType> {
        match self {
            Event::Protocol { message_type, .. } => Some(*message_type),
            Event::System(_) => None,
        }
    }

    /// Decoded message of a protocol event.
    pub fn message(&self) -> Option<&M> {
        match self {
            Event::Protocol { message, .. } => Some(message.as_ref()),
            Event::System(_) => None,
        }
    }

    /// Kind of a system event.
    pub fn system_kind(&self) -> Option<SystemEventKind> {
        match self {
            Event::System(kind) => Some(*kind),
            Event::Protocol { .. } => None,
        }
    }

    #[inline]
    pub fn is_system(&self) -> bool {
        matches!(self, Event::System(_))
    }

    /// Check whether this is the given system event.
    #[inline]
    pub fn is(&self, kind: SystemEventKind) -> bool {
        self.system_kind() == Some(kind)
    }
}

impl<M> fmt::Display for Event<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Protocol { message_type, .. } => write!(f, "{}", message_type),
            Event::System(kind) => write!(f, "SYSTEM({})", kind),
        }
    }
}
