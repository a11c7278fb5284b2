//! Request pipeline: correlation-id propagation and request logging.
//!
//! The stages are applied in fixed order with the request-id stage outermost,
//! so every logged line carries the id it assigned or propagated.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use tracing::info;
use uuid::Uuid;

/// Correlation-id header, echoed on every response.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Correlation id threaded through request extensions for downstream
/// consumers.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Echo an inbound `X-Request-Id` or assign a fresh UUID, stash it in the
/// request extensions and stamp it on the response.
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    req.extensions_mut().insert(RequestId(id.clone()));

    let mut response = next.run(req).await;
    // The id either came from a valid header or is a UUID, so this only
    // skips the echo on a malformed inbound value.
    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Emit exactly one log line per request once the wrapped service has
/// produced its response, success or failure alike.
pub async fn log_requests(
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    req: Request,
    next: Next,
) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let id = req
        .extensions()
        .get::<RequestId>()
        .map(|r| r.0.clone())
        .unwrap_or_else(|| "unknown".to_owned());

    let response = next.run(req).await;

    info!(
        request_id = %id,
        %method,
        %path,
        %remote,
        status = response.status().as_u16(),
        "request completed"
    );
    response
}
