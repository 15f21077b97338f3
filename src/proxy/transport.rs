//! The outbound HTTP seam.
//!
//! [`Transport`] sends one fully-formed request and hands back the status,
//! headers, and a lazily-read body ([`ByteStream`]). Both the login call and
//! the image-generation calls go through it, so tests can script upstream
//! behavior by swapping in their own implementation.
//!
//! [`HyperTransport`] is the production implementation on top of the pooled
//! hyper client from [`crate::server::build_http_client`]. The legacy hyper
//! client never follows redirects, and the response body is streamed frame
//! by frame rather than collected.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use http::header::CONTENT_TYPE;
use http::{HeaderMap, Request, StatusCode};
use http_body_util::{BodyExt, Full};

use crate::error::CallError;
use crate::server::HttpClient;

/// Finite, non-restartable sequence of body bytes tied to an open response.
///
/// Dropping it releases the underlying connection.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, CallError>> + Send>>;

pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ByteStream,
}

impl RawResponse {
    /// The declared `Content-Type`, or `""` when absent or not valid UTF-8.
    #[must_use]
    pub fn content_type(&self) -> &str {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
    }
}

impl std::fmt::Debug for RawResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

// async_trait is required here because Transport is used as Arc<dyn Transport>
// and native async fn in traits does not support dyn dispatch.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: Request<Bytes>) -> Result<RawResponse, CallError>;
}

pub struct HyperTransport {
    client: HttpClient,
    timeout: Option<Duration>,
}

impl HyperTransport {
    /// `timeout` bounds the wait for response headers; `None` waits forever.
    #[must_use]
    pub const fn new(client: HttpClient, timeout: Option<Duration>) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl Transport for HyperTransport {
    async fn send(&self, request: Request<Bytes>) -> Result<RawResponse, CallError> {
        let pending = self.client.request(request.map(Full::new));

        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, pending).await.map_err(|_| {
                CallError::Transport(format!(
                    "no response from upstream within {}ms",
                    limit.as_millis()
                ))
            })?,
            None => pending.await,
        };
        let response = result.map_err(|e| CallError::Transport(describe(&e)))?;

        let (parts, body) = response.into_parts();
        let body = body
            .into_data_stream()
            .map_err(|e| CallError::Transport(format!("body read error: {e}")));

        Ok(RawResponse {
            status: parts.status,
            headers: parts.headers,
            body: Box::pin(body),
        })
    }
}

/// Render an error with its source chain; hyper's top-level messages alone
/// ("client error (Connect)") hide the actual cause.
fn describe(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
