//! Interception surface.
//!
//! One fallback route catches every method and path, rebuilds the request
//! against the upstream origin, and hands it to the router. No request
//! falls through to default behavior once interception is engaged.

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    extract::{Request, State},
    http::header,
    response::{IntoResponse, Response},
};
use url::Url;
use vestibule_core::ResourceRequest;

use crate::error::ServeError;
use crate::router::RequestRouter;

/// State shared by every intercepted request.
pub struct ProxyState {
    pub router: RequestRouter,
    pub origin: Url,
    pub max_body_bytes: usize,
}

/// Build the axum application: a single fallback so interception applies
/// uniformly to every method and path.
pub fn app(state: Arc<ProxyState>) -> Router {
    Router::new().fallback(intercept).with_state(state)
}

async fn intercept(State(state): State<Arc<ProxyState>>, request: Request) -> Response {
    match handle(state, request).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn handle(state: Arc<ProxyState>, request: Request) -> Result<Response, ServeError> {
    let (parts, body) = request.into_parts();

    let path_and_query = parts.uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let url = state
        .origin
        .join(path_and_query)
        .map_err(|e| ServeError::BadRequest(format!("cannot resolve {path_and_query}: {e}")))?;

    let bytes = to_bytes(body, state.max_body_bytes)
        .await
        .map_err(|e| ServeError::BadRequest(format!("failed to read request body: {e}")))?;
    let body = if bytes.is_empty() { None } else { Some(bytes.to_vec()) };

    let request = ResourceRequest::new(parts.method.as_str(), url, body);
    let served = state.router.route(&request).await?;

    tracing::debug!(
        method = %parts.method,
        path = request.path(),
        status = served.status,
        source = ?served.source,
        "served"
    );

    let mut builder = Response::builder().status(served.status);
    if let Some(content_type) = &served.content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type.as_str());
    }
    builder
        .body(Body::from(served.body))
        .map_err(|e| ServeError::Internal(e.to_string()))
}
