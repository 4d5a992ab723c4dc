//! The presence store seam.

use async_trait::async_trait;

use crate::error::Result;

/// Durable set of joined usernames (a multiset: duplicates allowed).
///
/// The relay calls [`add`](Self::add) and [`remove`](Self::remove) from
/// request handlers, [`list`](Self::list) from the presence notifier, and
/// [`ping`](Self::ping) / [`disconnect`](Self::disconnect) around the server
/// lifecycle. None of these run on the audio broadcast path.
#[async_trait]
pub trait PresenceStore: Send + Sync {
    /// Short backend name for logs.
    fn backend(&self) -> &'static str;

    /// Liveness check used at startup. A failure aborts the process.
    async fn ping(&self) -> Result<()>;

    /// Record one join for `username`.
    async fn add(&self, username: &str) -> Result<()>;

    /// Remove one entry for `username` (the oldest). Returns `false` if none existed.
    async fn remove(&self, username: &str) -> Result<bool>;

    /// Every recorded username in insertion order.
    async fn list(&self) -> Result<Vec<String>>;

    /// Release resources. Idempotent; later calls other than `disconnect` fail
    /// with [`StoreError::Closed`](crate::StoreError::Closed).
    async fn disconnect(&self) -> Result<()>;
}
