//! HTTP handlers for the upgrade endpoints and `/health`.
//!
//! `/join` and `/leave` mutate the presence store before upgrading. A store
//! failure answers 500 and no connection is created. `/leave` still upgrades
//! into a fresh room connection afterwards; it does not close the caller's
//! existing one.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::response::{Json, Response};
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::error::ApiError;
use crate::health::{self, HealthResponse};
use crate::server::AppState;
use crate::session::{self, Entry};

/// Query string shared by the upgrade endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct PresenceQuery {
    /// Display name; a missing parameter means the empty string.
    #[serde(default)]
    pub username: String,
}

/// GET /ws: join the room without touching the presence store.
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(query): Query<PresenceQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    ensure_accepting(&state)?;
    Ok(upgrade(ws, state, query.username, Entry::Direct))
}

/// GET /join: record the username, then upgrade.
pub async fn join_handler(
    State(state): State<AppState>,
    Query(query): Query<PresenceQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    ensure_accepting(&state)?;
    if let Err(e) = state.store.add(&query.username).await {
        error!(username = %query.username, error = %e, "failed to record join");
        return Err(e.into());
    }
    info!(username = %query.username, "join recorded");
    Ok(upgrade(ws, state, query.username, Entry::Join))
}

/// GET /leave: remove one entry for the username, then upgrade.
pub async fn leave_handler(
    State(state): State<AppState>,
    Query(query): Query<PresenceQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    ensure_accepting(&state)?;
    match state.store.remove(&query.username).await {
        Ok(removed) => info!(username = %query.username, removed, "leave recorded"),
        Err(e) => {
            error!(username = %query.username, error = %e, "failed to record leave");
            return Err(e.into());
        }
    }
    Ok(upgrade(ws, state, query.username, Entry::Leave))
}

/// GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.room.len(),
        state.room.is_accepting(),
    ))
}

fn ensure_accepting(state: &AppState) -> Result<(), ApiError> {
    if state.room.is_accepting() {
        Ok(())
    } else {
        Err(ApiError::ShuttingDown)
    }
}

fn upgrade(ws: WebSocketUpgrade, state: AppState, username: String, entry: Entry) -> Response {
    let failed_username = username.clone();
    ws.max_message_size(state.config.max_message_size)
        .on_failed_upgrade(move |e| {
            if entry.mutated_store() {
                warn!(username = %failed_username, ?entry, error = %e, "upgrade failed after presence store update; store and room diverge");
            } else {
                warn!(username = %failed_username, error = %e, "websocket upgrade failed");
            }
        })
        .on_upgrade(move |socket| session::run_session(socket, state, username, entry))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_username_is_empty() {
        let q: PresenceQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(q.username, "");
    }
}
