//! Bounded per-connection outbound queue.
//!
//! Producers never wait: [`Mailbox::try_send`] either enqueues or reports why
//! it could not. Closing drops the only sender, so the consumer drains what
//! is already queued and then observes end-of-stream.

use axum::extract::ws::{Message, Utf8Bytes};
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// One item waiting to be written to a client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    /// Opaque audio payload, written as a binary message.
    Audio(Bytes),
    /// JSON control envelope, written as a text message.
    Presence(Utf8Bytes),
}

impl Frame {
    /// Wire message for this frame.
    pub fn into_message(self) -> Message {
        match self {
            Self::Audio(data) => Message::Binary(data),
            Self::Presence(text) => Message::Text(text),
        }
    }

    /// Payload size in bytes.
    pub fn len(&self) -> usize {
        match self {
            Self::Audio(data) => data.len(),
            Self::Presence(text) => text.as_str().len(),
        }
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Why an enqueue was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum MailboxError {
    /// The consumer is behind by the full capacity.
    #[error("mailbox full")]
    Full,
    /// The mailbox was closed; nothing more will be delivered.
    #[error("mailbox closed")]
    Closed,
}

/// Producer half of a connection's queue.
pub struct Mailbox {
    tx: Mutex<Option<mpsc::Sender<Frame>>>,
    capacity: usize,
}

impl Mailbox {
    /// Create a mailbox holding at most `capacity` pending frames.
    ///
    /// A zero capacity is bumped to one.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Frame>) {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        (
            Self {
                tx: Mutex::new(Some(tx)),
                capacity,
            },
            rx,
        )
    }

    /// Enqueue without waiting.
    pub fn try_send(&self, frame: Frame) -> Result<(), MailboxError> {
        let guard = self.tx.lock();
        let Some(tx) = guard.as_ref() else {
            return Err(MailboxError::Closed);
        };
        tx.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => MailboxError::Full,
            TrySendError::Closed(_) => MailboxError::Closed,
        })
    }

    /// Close the mailbox. Returns `true` only for the call that closed it.
    pub fn close(&self) -> bool {
        self.tx.lock().take().is_some()
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.tx.lock().is_none()
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
