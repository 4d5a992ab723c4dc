//! `/health` endpoint.

use std::time::Instant;

use serde::Serialize;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// `"ok"` while admitting joins, `"draining"` once shutdown began.
    pub status: &'static str,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Current room membership.
    pub connections: usize,
}

/// Build a health response from live counters.
pub fn health_check(start_time: Instant, connections: usize, accepting: bool) -> HealthResponse {
    HealthResponse {
        status: if accepting { "ok" } else { "draining" },
        uptime_secs: start_time.elapsed().as_secs(),
        connections,
    }
}
