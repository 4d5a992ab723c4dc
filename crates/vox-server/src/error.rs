//! HTTP-boundary errors.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use vox_store::StoreError;

/// Failures a request handler turns into a status code.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The presence store rejected the mutation. No upgrade happens.
    #[error("presence store: {0}")]
    Store(#[from] StoreError),
    /// The room no longer admits joins.
    #[error("server is shutting down")]
    ShuttingDown,
}

impl ApiError {
    /// Status code for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Store details stay in the logs.
        let body = match self {
            Self::Store(_) => "Internal server error",
            Self::ShuttingDown => "Server is shutting down",
        };
        (self.status(), body).into_response()
    }
}
