//! # vox-store
//!
//! Durable record of which usernames are currently joined.
//!
//! - [`PresenceStore`]: the async seam the relay talks to
//! - [`SqlitePresenceStore`]: `rusqlite`-backed, one row per join
//! - [`MemoryPresenceStore`]: process-local, for tests and ephemeral deployments
//!
//! Usernames are not unique: two joins under the same name produce two
//! entries, and a removal deletes only the oldest one.

#![deny(unsafe_code)]

pub mod error;
pub mod memory;
pub mod schema;
pub mod sqlite;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::MemoryPresenceStore;
pub use sqlite::SqlitePresenceStore;
pub use store::PresenceStore;
