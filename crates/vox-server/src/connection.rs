//! Per-client connection state.
//!
//! A connection moves strictly forward through
//! `Joining → Active → Closing → Closed`. Closing is entered on the first
//! [`Connection::close`] (idempotent); Closed is entered once both pumps have
//! reported exit via [`Connection::pump_exited`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use vox_core::ConnectionId;

use crate::mailbox::{Frame, Mailbox, MailboxError};

/// Number of pumps that must exit before a connection is retired.
const PUMP_COUNT: u8 = 2;

/// Lifecycle state of a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    /// Upgraded, not yet a room member.
    Joining = 0,
    /// Room member; receives broadcasts.
    Active = 1,
    /// Mailbox closed; pumps winding down.
    Closing = 2,
    /// Both pumps exited. Terminal.
    Closed = 3,
}

impl ConnectionState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Joining,
            1 => Self::Active,
            2 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

/// A connected client.
pub struct Connection {
    id: ConnectionId,
    username: String,
    mailbox: Mailbox,
    state: AtomicU8,
    pumps_running: AtomicU8,
    cancel: CancellationToken,
    connected_at: Instant,
    frames_sent: AtomicU64,
}

impl Connection {
    /// Create a connection in `Joining` state.
    ///
    /// The returned receiver is the mailbox's consumer half and belongs to the
    /// outbound pump.
    pub fn new(
        username: impl Into<String>,
        mailbox_capacity: usize,
    ) -> (Arc<Self>, mpsc::Receiver<Frame>) {
        let (mailbox, rx) = Mailbox::new(mailbox_capacity);
        let conn = Arc::new(Self {
            id: ConnectionId::new(),
            username: username.into(),
            mailbox,
            state: AtomicU8::new(ConnectionState::Joining as u8),
            pumps_running: AtomicU8::new(PUMP_COUNT),
            cancel: CancellationToken::new(),
            connected_at: Instant::now(),
            frames_sent: AtomicU64::new(0),
        });
        (conn, rx)
    }

    /// Unique handle for this session.
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Display name supplied at upgrade time.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Whether the connection is a live room member.
    pub fn is_active(&self) -> bool {
        self.state() == ConnectionState::Active
    }

    /// Enqueue a frame without waiting.
    pub fn try_send(&self, frame: Frame) -> Result<(), MailboxError> {
        self.mailbox.try_send(frame)?;
        let _ = self.frames_sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Frames accepted into the mailbox so far.
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent.load(Ordering::Relaxed)
    }

    /// Resolves once the connection starts closing.
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }

    /// `Joining → Active`. Fails if the connection already started closing.
    pub(crate) fn activate(&self) -> bool {
        self.state
            .compare_exchange(
                ConnectionState::Joining as u8,
                ConnectionState::Active as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Close the mailbox and signal both pumps.
    ///
    /// Safe to call any number of times from any task. Returns `true` only for
    /// the call that moved the connection into `Closing`.
    pub fn close(&self) -> bool {
        let mut current = self.state.load(Ordering::Acquire);
        let transitioned = loop {
            if current >= ConnectionState::Closing as u8 {
                break false;
            }
            match self.state.compare_exchange_weak(
                current,
                ConnectionState::Closing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break true,
                Err(actual) => current = actual,
            }
        };
        let _ = self.mailbox.close();
        self.cancel.cancel();
        transitioned
    }

    /// Record that one pump has exited. The last one retires the connection.
    pub fn pump_exited(&self) {
        let previous = self
            .pumps_running
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .unwrap_or(0);
        if previous == 1 {
            let _ = self.close();
            self.state
                .store(ConnectionState::Closed as u8, Ordering::Release);
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
