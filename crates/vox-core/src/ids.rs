//! Connection identity.
//!
//! IDs are `conn_<uuid v7>` strings, so they sort by creation time and are
//! recognisable in logs.

use std::fmt;

use uuid::Uuid;

/// Identity of one live realtime session. Unique per upgrade, not per username.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Generate a fresh, time-ordered ID.
    pub fn new() -> Self {
        Self(format!("conn_{}", Uuid::now_v7()))
    }

    /// Borrow the underlying string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
