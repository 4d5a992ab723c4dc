//! The room: single membership registry and fan-out point.
//!
//! Every mutation of `members` and every broadcast iteration happens under one
//! lock, so a broadcast never observes a member whose mailbox was closed by a
//! concurrent leave. The lock is never held across an `.await`.
//!
//! Backpressure policy: delivery is a non-blocking enqueue. A target whose
//! mailbox is full (or already closed) is evicted on the spot: removed, its
//! mailbox closed, and a membership change emitted. One slow consumer never
//! delays the rest of the room.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use vox_core::ConnectionId;

use crate::connection::Connection;
use crate::mailbox::{Frame, MailboxError};

/// Why a connection left the room.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LeaveReason {
    /// Peer closed, transport failed, or the connection was closed locally.
    Disconnected,
    /// Removed by a broadcast because its mailbox could not accept a frame.
    Evicted,
}

/// Emitted after every successful join or leave.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MembershipChange {
    /// A connection became active.
    Joined {
        /// Connection handle.
        id: ConnectionId,
        /// Its username.
        username: String,
    },
    /// A connection was removed.
    Left {
        /// Connection handle.
        id: ConnectionId,
        /// Its username.
        username: String,
        /// What removed it.
        reason: LeaveReason,
    },
}

/// Outcome of one fan-out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Targets that accepted the frame.
    pub delivered: usize,
    /// Targets removed because they could not.
    pub evicted: usize,
}

/// Errors from [`Room::join`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RoomError {
    /// The room stopped accepting joins.
    #[error("room is shutting down")]
    ShuttingDown,
    /// The connection closed before it could join.
    #[error("connection already closed")]
    ConnectionClosed,
}

struct Membership {
    members: HashMap<ConnectionId, Arc<Connection>>,
    accepting: bool,
}

/// The single shared room.
pub struct Room {
    inner: Mutex<Membership>,
    changes: mpsc::UnboundedSender<MembershipChange>,
}

impl Room {
    /// Create an empty room and the receiver for its membership changes.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MembershipChange>) {
        let (changes, rx) = mpsc::unbounded_channel();
        let room = Self {
            inner: Mutex::new(Membership {
                members: HashMap::new(),
                accepting: true,
            }),
            changes,
        };
        (room, rx)
    }

    /// Insert `conn` and mark it `Active`.
    pub fn join(&self, conn: &Arc<Connection>) -> Result<(), RoomError> {
        let mut inner = self.inner.lock();
        if !inner.accepting {
            return Err(RoomError::ShuttingDown);
        }
        if !conn.activate() {
            return Err(RoomError::ConnectionClosed);
        }
        let _ = inner.members.insert(conn.id().clone(), conn.clone());
        debug!(conn_id = %conn.id(), username = conn.username(), members = inner.members.len(), "joined room");
        self.emit(MembershipChange::Joined {
            id: conn.id().clone(),
            username: conn.username().to_owned(),
        });
        Ok(())
    }

    /// Remove `conn` if present and close its mailbox.
    ///
    /// Idempotent. Returns `true` if this call removed it.
    pub fn leave(&self, conn: &Connection) -> bool {
        let mut inner = self.inner.lock();
        let removed = inner.members.remove(conn.id()).is_some();
        let _ = conn.close();
        if removed {
            debug!(conn_id = %conn.id(), username = conn.username(), members = inner.members.len(), "left room");
            self.emit(MembershipChange::Left {
                id: conn.id().clone(),
                username: conn.username().to_owned(),
                reason: LeaveReason::Disconnected,
            });
        }
        removed
    }

    /// Deliver `frame` to every member except `exclude`.
    ///
    /// Members that cannot accept the frame are evicted before the lock is
    /// released.
    pub fn broadcast(&self, frame: &Frame, exclude: Option<&ConnectionId>) -> BroadcastReport {
        let mut inner = self.inner.lock();
        let mut report = BroadcastReport::default();
        let mut rejected: Vec<(ConnectionId, MailboxError)> = Vec::new();

        for (id, conn) in &inner.members {
            if exclude == Some(id) {
                continue;
            }
            match conn.try_send(frame.clone()) {
                Ok(()) => report.delivered += 1,
                Err(e) => rejected.push((id.clone(), e)),
            }
        }

        for (id, cause) in rejected {
            let Some(conn) = inner.members.remove(&id) else {
                continue;
            };
            let _ = conn.close();
            report.evicted += 1;
            warn!(conn_id = %id, username = conn.username(), %cause, "evicting connection");
            self.emit(MembershipChange::Left {
                id,
                username: conn.username().to_owned(),
                reason: LeaveReason::Evicted,
            });
        }

        report
    }

    /// Refuse all further joins.
    pub fn stop_accepting(&self) {
        self.inner.lock().accepting = false;
    }

    /// Whether joins are still admitted.
    pub fn is_accepting(&self) -> bool {
        self.inner.lock().accepting
    }

    /// Remove and close every member without emitting changes.
    ///
    /// Used at shutdown, where a final presence snapshot would go nowhere.
    pub fn close_all(&self) -> usize {
        let mut inner = self.inner.lock();
        let count = inner.members.len();
        for (_, conn) in inner.members.drain() {
            let _ = conn.close();
        }
        count
    }

    /// Whether `id` is a current member.
    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.inner.lock().members.contains_key(id)
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.inner.lock().members.len()
    }

    /// Whether the room is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Sent under the membership lock so changes arrive in mutation order.
    fn emit(&self, change: MembershipChange) {
        // A closed receiver means the notifier has stopped (shutdown).
        let _ = self.changes.send(change);
    }
}
