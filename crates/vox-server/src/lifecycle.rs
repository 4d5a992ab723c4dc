//! Graceful shutdown coordination via `CancellationToken`.
//!
//! Shutdown runs in a fixed order:
//! 1. Stop admitting joins
//! 2. Close and remove every member (each outbound pump drains, sends a close
//!    frame, and exits)
//! 3. Wait the grace period
//! 4. Cancel the token: the notifier stops and the listener begins its
//!    graceful stop, bounded by a timeout. Exceeding it is fatal.
//! 5. Disconnect the presence store. A failure here is logged only.

use std::io;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use vox_store::PresenceStore;

use crate::room::Room;

/// Fatal shutdown failures.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// The listener did not stop within the configured bound.
    #[error("listener did not stop within {0:?}")]
    ListenerTimeout(Duration),
    /// The listener task failed.
    #[error("listener failed: {0}")]
    Listener(String),
}

/// Timing for [`ShutdownCoordinator::drain`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShutdownPlan {
    /// Pause between closing mailboxes and stopping the listener.
    pub grace: Duration,
    /// Bound on listener shutdown.
    pub listener_timeout: Duration,
}

impl Default for ShutdownPlan {
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(2),
            listener_timeout: Duration::from_secs(5),
        }
    }
}

/// What a completed shutdown did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Connections closed in step 2.
    pub connections_closed: usize,
    /// Whether the store disconnected cleanly.
    pub store_disconnected: bool,
}

/// Background tasks owned by a running server.
pub struct RunningTasks {
    /// The HTTP listener.
    pub listener: JoinHandle<io::Result<()>>,
    /// The presence notifier.
    pub notifier: JoinHandle<()>,
}

/// Coordinates graceful shutdown across all server tasks.
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Get a clone of the cancellation token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Cancel the token without the ordered drain.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether a shutdown has been initiated.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Run the ordered shutdown sequence.
    ///
    /// The store is disconnected even when the listener times out; the
    /// timeout is still returned as an error.
    pub async fn drain(
        &self,
        room: &Room,
        store: &dyn PresenceStore,
        tasks: RunningTasks,
        plan: ShutdownPlan,
    ) -> Result<ShutdownReport, LifecycleError> {
        room.stop_accepting();
        let connections_closed = room.close_all();
        info!(connections_closed, grace_ms = plan.grace.as_millis(), "room closed, waiting grace period");

        tokio::time::sleep(plan.grace).await;

        // One bound covers both joins.
        let deadline = Instant::now() + plan.listener_timeout;
        self.shutdown();
        if tokio::time::timeout_at(deadline, tasks.notifier)
            .await
            .is_err()
        {
            warn!("presence notifier did not stop in time");
        }

        let listener = match tokio::time::timeout_at(deadline, tasks.listener).await {
            Err(_) => Err(LifecycleError::ListenerTimeout(plan.listener_timeout)),
            Ok(Err(join)) => Err(LifecycleError::Listener(join.to_string())),
            Ok(Ok(Err(io))) => Err(LifecycleError::Listener(io.to_string())),
            Ok(Ok(Ok(()))) => {
                info!("listener stopped");
                Ok(())
            }
        };

        let store_disconnected = match store.disconnect().await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, backend = store.backend(), "failed to disconnect presence store");
                false
            }
        };

        listener.map(|()| ShutdownReport {
            connections_closed,
            store_disconnected,
        })
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::connection::{Connection, ConnectionState};
    use vox_store::{MemoryPresenceStore, StoreError};

    fn fast_plan() -> ShutdownPlan {
        ShutdownPlan {
            grace: Duration::from_millis(10),
            listener_timeout: Duration::from_millis(200),
        }
    }

    fn tasks_following(token: &CancellationToken) -> RunningTasks {
        let listener_token = token.clone();
        let notifier_token = token.clone();
        RunningTasks {
            listener: tokio::spawn(async move {
                listener_token.cancelled().await;
                Ok(())
            }),
            notifier: tokio::spawn(async move { notifier_token.cancelled().await }),
        }
    }

    #[test]
    fn token_propagation() {
        let coord = ShutdownCoordinator::new();
        let token = coord.token();
        assert!(!token.is_cancelled());
        coord.shutdown();
        coord.shutdown();
        assert!(token.is_cancelled());
        assert!(coord.is_shutting_down());
    }

    #[test]
    fn default_plan_matches_relay_defaults() {
        let plan = ShutdownPlan::default();
        assert_eq!(plan.grace, Duration::from_secs(2));
        assert_eq!(plan.listener_timeout, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn drain_closes_members_then_stops_tasks() {
        let (room, _changes) = Room::new();
        let (a, _ra) = Connection::new("A", 4);
        let (c, _rc) = Connection::new("C", 4);
        room.join(&a).unwrap();
        room.join(&c).unwrap();
        let store = MemoryPresenceStore::new();

        let coord = ShutdownCoordinator::new();
        let tasks = tasks_following(&coord.token());
        let report = coord.drain(&room, &store, tasks, fast_plan()).await.unwrap();

        assert_eq!(report.connections_closed, 2);
        assert!(report.store_disconnected);
        assert!(room.is_empty());
        assert!(!room.is_accepting());
        assert_eq!(a.state(), ConnectionState::Closing);
        assert_eq!(c.state(), ConnectionState::Closing);
        assert!(matches!(store.ping().await, Err(StoreError::Closed)));
    }

    #[tokio::test]
    async fn listener_timeout_is_fatal_but_store_still_closes() {
        let (room, _changes) = Room::new();
        let store = Arc::new(MemoryPresenceStore::new());
        let coord = ShutdownCoordinator::new();

        let tasks = RunningTasks {
            listener: tokio::spawn(async {
                tokio::time::sleep(Duration::from_secs(300)).await;
                Ok(())
            }),
            notifier: tokio::spawn(async {}),
        };

        let err = coord
            .drain(&room, store.as_ref(), tasks, fast_plan())
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::ListenerTimeout(_)));
        assert!(store.ping().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn notifier_and_listener_share_one_deadline() {
        let (room, _changes) = Room::new();
        let store = MemoryPresenceStore::new();
        let coord = ShutdownCoordinator::new();
        let tasks = RunningTasks {
            listener: tokio::spawn(async {
                std::future::pending::<()>().await;
                Ok(())
            }),
            notifier: tokio::spawn(std::future::pending::<()>()),
        };
        let plan = fast_plan();

        let started = Instant::now();
        let err = coord.drain(&room, &store, tasks, plan).await.unwrap_err();
        let elapsed = started.elapsed();

        assert!(matches!(err, LifecycleError::ListenerTimeout(_)));
        assert!(
            elapsed < plan.grace + plan.listener_timeout * 3 / 2,
            "shutdown took {elapsed:?}"
        );
        assert!(store.ping().await.is_err());
    }

    #[tokio::test]
    async fn listener_io_error_is_reported() {
        let (room, _changes) = Room::new();
        let store = MemoryPresenceStore::new();
        let coord = ShutdownCoordinator::new();
        let tasks = RunningTasks {
            listener: tokio::spawn(async { Err(io::Error::other("accept failed")) }),
            notifier: tokio::spawn(async {}),
        };

        let err = coord.drain(&room, &store, tasks, fast_plan()).await.unwrap_err();
        assert!(err.to_string().contains("accept failed"));
    }
}
