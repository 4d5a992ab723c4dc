//! Text envelopes the relay pushes to clients.
//!
//! Audio travels as opaque binary frames and never passes through this
//! module. Control traffic is JSON tagged by `type`.

use serde::{Deserialize, Serialize};

/// A server-to-client control message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Presence snapshot: every username currently recorded as joined.
    #[serde(rename = "userUpdate")]
    UserUpdate {
        /// Usernames in store order. Duplicates are preserved.
        users: Vec<String>,
    },
}

impl ServerMessage {
    /// Build a presence snapshot.
    pub fn user_update(users: Vec<String>) -> Self {
        Self::UserUpdate { users }
    }

    /// Serialize to the JSON text sent on the wire.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
