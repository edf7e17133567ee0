//! Client session identifier.

use std::fmt;

/// Length of a session id in bytes.
pub const SESSION_ID_LEN: usize = 8;

/// Random id sent with `INITIALIZE` so the device can tell sessions apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId([u8; SESSION_ID_LEN]);

impl SessionId {
    /// Fresh random id.
    pub fn generate() -> Self {
        SessionId(rand::random())
    }

    pub fn from_bytes(bytes: [u8; SESSION_ID_LEN]) -> Self {
        SessionId(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SESSION_ID_LEN] {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}
