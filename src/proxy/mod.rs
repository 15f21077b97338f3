//! Forwarding of image-generation calls to the upstream service.
//!
//! [`forward_handler`] is the Axum handler for the generation route. It
//! extracts the call, assigns a correlation id, and hands it to the
//! [`Dispatcher`](dispatcher::Dispatcher). Submodules cover the outbound
//! seam ([`transport`]), request construction ([`headers`], [`upstream`]),
//! body handling ([`stream`]), and the per-endpoint queues ([`worker`],
//! [`dispatcher`]).

pub mod dispatcher;
pub mod headers;
pub mod stream;
pub mod transport;
pub mod upstream;
pub mod worker;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, Uri};
use axum::response::Response;

use crate::server::AppState;
use dispatcher::InboundCall;

pub const CORRELATION_HEADER: HeaderName = HeaderName::from_static("x-correlation-id");

/// Correlation id supplied by the caller, or a fresh one.
#[must_use]
pub fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(&CORRELATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map_or_else(|| uuid::Uuid::new_v4().to_string(), String::from)
}

pub async fn forward_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    method: Method,
    uri: Uri,
    req_headers: HeaderMap,
    body: Bytes,
) -> Response {
    let correlation_id = correlation_id(&req_headers);
    let path = uri
        .path_and_query()
        .map_or_else(|| uri.path().to_string(), ToString::to_string);

    tracing::info!(
        correlation_id = %correlation_id,
        method = %method,
        path = %path,
        client_ip = %addr.ip(),
        "request received"
    );

    let authorization = req_headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    let call = InboundCall {
        method,
        path,
        body,
        authorization,
        correlation_id: correlation_id.clone(),
    };
    let mut response = state.dispatcher.handle(call).await;

    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        response.headers_mut().insert(CORRELATION_HEADER, value);
    }
    response
}
