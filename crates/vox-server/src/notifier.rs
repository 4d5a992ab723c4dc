//! Presence snapshots pushed on membership change.

use std::sync::Arc;

use axum::extract::ws::Utf8Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};
use vox_core::ServerMessage;
use vox_store::PresenceStore;

use crate::mailbox::Frame;
use crate::room::{BroadcastReport, MembershipChange, Room};

/// Consumes membership changes and broadcasts `userUpdate` snapshots.
///
/// Every join or leave yields exactly one `userUpdate`. The username list is
/// read from the presence store as soon as the change is dequeued; no other
/// change is handled in between.
pub struct PresenceNotifier {
    room: Arc<Room>,
    store: Arc<dyn PresenceStore>,
    changes: mpsc::UnboundedReceiver<MembershipChange>,
    shutdown: CancellationToken,
}

impl PresenceNotifier {
    /// Create a notifier bound to `room`'s change stream.
    pub fn new(
        room: Arc<Room>,
        store: Arc<dyn PresenceStore>,
        changes: mpsc::UnboundedReceiver<MembershipChange>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            room,
            store,
            changes,
            shutdown,
        }
    }

    /// Run until the shutdown token fires or the change stream ends.
    ///
    /// Changes are handled one at a time in the order the room applied them,
    /// and each produces its own snapshot.
    pub async fn run(mut self) {
        loop {
            let change = tokio::select! {
                () = self.shutdown.cancelled() => break,
                change = self.changes.recv() => match change {
                    Some(change) => change,
                    None => break,
                },
            };

            debug!(?change, "membership changed");
            let _ = self.publish().await;
        }
        debug!("presence notifier stopped");
    }

    /// Fetch the current snapshot and broadcast it to every member.
    ///
    /// Returns `None` if the store could not be read; that snapshot is skipped.
    #[instrument(skip(self))]
    pub async fn publish(&self) -> Option<BroadcastReport> {
        let users = match self.store.list().await {
            Ok(users) => users,
            Err(e) => {
                warn!(error = %e, "failed to read presence, skipping snapshot");
                return None;
            }
        };

        let json = match ServerMessage::user_update(users).to_json() {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "failed to serialize presence snapshot");
                return None;
            }
        };

        let report = self
            .room
            .broadcast(&Frame::Presence(Utf8Bytes::from(json)), None);
        debug!(delivered = report.delivered, evicted = report.evicted, "presence snapshot sent");
        Some(report)
    }
}
