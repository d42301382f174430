//! Boundary errors for the interception surface.
//!
//! A routing failure must look to the caller exactly like an ordinary
//! failed request, so everything maps to a plain HTTP error response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors surfaced by the interception surface.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    /// The inbound request could not be rebuilt against the upstream
    /// origin.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Routing failed: no live response and no usable cached entry.
    #[error(transparent)]
    Routing(#[from] vestibule_core::Error),

    /// Response assembly failed.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ServeError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServeError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServeError::Routing(_) => StatusCode::BAD_GATEWAY,
            ServeError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::debug!(%status, error = %self, "request failed");
        (status, self.to_string()).into_response()
    }
}
