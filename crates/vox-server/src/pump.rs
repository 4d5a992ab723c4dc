//! The two workers that move a connection's data.
//!
//! The inbound pump reads from the socket and fans binary frames out through
//! the room. The outbound pump drains the mailbox into the socket in enqueue
//! order. Each reports its exit to the connection exactly once; the second
//! report retires it.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::connection::Connection;
use crate::mailbox::Frame;
use crate::room::Room;

/// Why the inbound pump stopped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundExit {
    /// Peer sent a close frame.
    PeerClosed,
    /// Stream ended without a close frame.
    EndOfStream,
    /// The transport reported a read error.
    ReadError(String),
    /// The connection was closed locally (leave, eviction, shutdown).
    Cancelled,
}

/// Outbound write failure.
#[derive(Debug, thiserror::Error)]
pub enum PumpError {
    /// Writing a frame to the transport failed.
    #[error("write failed: {0}")]
    Write(String),
    /// The connection was closing and the peer accepted no write within the
    /// drain timeout.
    #[error("peer stalled for {0:?} after close")]
    Stalled(Duration),
}

/// Read frames until the peer goes away or the connection closes.
///
/// Binary frames are broadcast to every other member. Text frames are
/// accepted and ignored. Control frames are handled by the transport.
pub async fn run_inbound<S, E>(mut stream: S, conn: Arc<Connection>, room: Arc<Room>) -> InboundExit
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: std::fmt::Display,
{
    let exit = loop {
        let next = tokio::select! {
            () = conn.closed() => break InboundExit::Cancelled,
            next = stream.next() => next,
        };

        match next {
            Some(Ok(Message::Binary(data))) => {
                if !conn.is_active() {
                    break InboundExit::Cancelled;
                }
                let len = data.len();
                let report = room.broadcast(&Frame::Audio(data), Some(conn.id()));
                trace!(len, delivered = report.delivered, evicted = report.evicted, "relayed audio frame");
            }
            Some(Ok(Message::Text(text))) => {
                trace!(len = text.as_str().len(), "ignoring text frame");
            }
            Some(Ok(Message::Close(_))) => break InboundExit::PeerClosed,
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
            Some(Err(e)) => break InboundExit::ReadError(e.to_string()),
            None => break InboundExit::EndOfStream,
        }
    };

    debug!(conn_id = %conn.id(), ?exit, "inbound pump stopped");
    let _ = room.leave(&conn);
    conn.pump_exited();
    exit
}

/// Drain the mailbox into the transport.
///
/// Returns `Ok` once the mailbox is closed and fully written, after a
/// best-effort close frame. While the connection is active a write may wait
/// on the peer indefinitely; once it is closing (leave, eviction, shutdown)
/// each write gets `drain_timeout`, so a peer that stopped reading cannot pin
/// the pump. Any failure removes the connection from the room.
pub async fn run_outbound<S>(
    mut sink: S,
    mut mailbox: mpsc::Receiver<Frame>,
    conn: Arc<Connection>,
    room: Arc<Room>,
    drain_timeout: Duration,
) -> Result<(), PumpError>
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    let result = drain(&mut sink, &mut mailbox, &conn, drain_timeout).await;
    match &result {
        Ok(()) => debug!(conn_id = %conn.id(), "outbound pump drained"),
        Err(e) => {
            debug!(conn_id = %conn.id(), error = %e, "outbound pump failed");
            let _ = room.leave(&conn);
        }
    }
    conn.pump_exited();
    result
}

async fn drain<S>(
    sink: &mut S,
    mailbox: &mut mpsc::Receiver<Frame>,
    conn: &Connection,
    drain_timeout: Duration,
) -> Result<(), PumpError>
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    while let Some(frame) = mailbox.recv().await {
        tokio::select! {
            biased;
            sent = sink.send(frame.into_message()) => {
                sent.map_err(|e| PumpError::Write(e.to_string()))?;
            }
            () = stalled(conn, drain_timeout) => return Err(PumpError::Stalled(drain_timeout)),
        }
    }

    // The peer may already be gone; nothing to report if so.
    let farewell = async {
        let _ = sink.send(Message::Close(None)).await;
        let _ = sink.close().await;
    };
    tokio::time::timeout(drain_timeout, farewell)
        .await
        .map_err(|_| PumpError::Stalled(drain_timeout))
}

/// Resolves `drain_timeout` after the connection starts closing.
async fn stalled(conn: &Connection, drain_timeout: Duration) {
    conn.closed().await;
    tokio::time::sleep(drain_timeout).await;
}
