//! One upgraded client, from room join through retirement.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tracing::{debug, info, instrument, warn};

use crate::connection::Connection;
use crate::pump;
use crate::server::AppState;

/// Which endpoint produced the upgrade.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Entry {
    /// `/ws`: the presence store was not touched.
    Direct,
    /// `/join`: a presence entry was added first.
    Join,
    /// `/leave`: a presence entry was removed first.
    Leave,
}

impl Entry {
    /// Whether the presence store was mutated before the upgrade.
    pub fn mutated_store(self) -> bool {
        !matches!(self, Self::Direct)
    }
}

/// Run a websocket session for an upgraded client.
///
/// 1. Creates the connection and joins the room (refused while shutting down)
/// 2. Spawns the inbound pump
/// 3. Runs the outbound pump inline until the mailbox closes or a write fails
/// 4. Waits for the inbound pump so the connection is retired before returning
#[instrument(skip_all, fields(username = %username, entry = ?entry))]
pub async fn run_session(mut socket: WebSocket, state: AppState, username: String, entry: Entry) {
    let (conn, mailbox) = Connection::new(username, state.config.mailbox_capacity);

    if let Err(e) = state.room.join(&conn) {
        if entry.mutated_store() {
            warn!(error = %e, "room refused join after presence store update; store and room diverge");
        } else {
            info!(error = %e, "room refused join");
        }
        let _ = socket.send(Message::Close(None)).await;
        return;
    }

    let conn_id = conn.id().clone();
    info!(%conn_id, "client connected");

    let (sink, stream) = socket.split();
    let inbound = tokio::spawn(pump::run_inbound(
        stream,
        Arc::clone(&conn),
        Arc::clone(&state.room),
    ));

    let outbound = pump::run_outbound(
        sink,
        mailbox,
        Arc::clone(&conn),
        Arc::clone(&state.room),
        state.config.drain_timeout,
    )
    .await;
    if let Err(e) = &outbound {
        debug!(%conn_id, error = %e, "outbound pump ended with error");
    }

    match inbound.await {
        Ok(exit) => debug!(%conn_id, ?exit, "inbound pump joined"),
        Err(e) => warn!(%conn_id, error = %e, "inbound pump task failed"),
    }

    info!(
        %conn_id,
        state = ?conn.state(),
        frames = conn.frames_sent(),
        age_ms = u64::try_from(conn.age().as_millis()).unwrap_or(u64::MAX),
        "client disconnected"
    );
}
