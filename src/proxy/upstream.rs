//! Upstream client: one HTTP call against one named endpoint.
//!
//! [`UpstreamClient::call`] attaches the fixed header set, the endpoint's
//! `Accept` value, and the credential manager's current token, then sends
//! the request through the [`Transport`]. A 2xx response comes back with
//! its body still unread; anything else becomes [`CallError::Upstream`]
//! with the status preserved so the worker can tell an expired token (401)
//! from other failures. The client never mutates credential state.

use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, Method, Request, StatusCode};

use super::headers;
use super::stream;
use super::transport::{RawResponse, Transport};
use crate::auth::CredentialManager;
use crate::config::model::{Endpoint, UpstreamSettings};
use crate::error::{CallError, GatewayError};

/// Upper bound on upstream error text echoed back to the caller.
const MAX_ERROR_DETAIL: usize = 1024;

/// One call to forward: method, path with query, raw body.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: Method,
    pub path: String,
    pub body: Bytes,
}

pub struct UpstreamClient {
    transport: Arc<dyn Transport>,
    credentials: Arc<CredentialManager>,
    base_headers: HeaderMap,
}

impl UpstreamClient {
    pub fn new(
        settings: &UpstreamSettings,
        transport: Arc<dyn Transport>,
        credentials: Arc<CredentialManager>,
    ) -> Result<Self, GatewayError> {
        Ok(Self {
            transport,
            credentials,
            base_headers: headers::base_headers(settings)?,
        })
    }

    pub async fn call(
        &self,
        endpoint: &Endpoint,
        request: &UpstreamRequest,
    ) -> Result<RawResponse, CallError> {
        let token = self
            .credentials
            .current_token()
            .await
            .ok_or_else(|| CallError::Auth("no access token has been acquired".into()))?;

        let url = endpoint.url_for(&request.path);
        let mut builder = Request::builder()
            .method(request.method.clone())
            .uri(url.as_str());
        if let Some(outbound) = builder.headers_mut() {
            outbound.extend(headers::for_endpoint(&self.base_headers, endpoint, &token)?);
        }
        let outbound = builder
            .body(request.body.clone())
            .map_err(|e| CallError::Transport(format!("invalid upstream request: {e}")))?;

        tracing::debug!(endpoint = %endpoint.name, method = %request.method, url = %url, "calling upstream");
        let response = self.transport.send(outbound).await?;
        if response.status.is_success() {
            return Ok(response);
        }

        let status = response.status;
        // The error body is best-effort detail; a broken one still leaves the status.
        // Only the echoable prefix is read.
        let detail = stream::collect_prefix(response.body, MAX_ERROR_DETAIL * 4)
            .await
            .map(|body| String::from_utf8_lossy(&body).trim().to_string())
            .unwrap_or_default();
        Err(CallError::Upstream {
            status,
            message: error_message(status, &url, &detail),
        })
    }
}

fn error_message(status: StatusCode, url: &str, detail: &str) -> String {
    let kind = if status.is_client_error() {
        "Client Error"
    } else if status.is_server_error() {
        "Server Error"
    } else {
        "Unexpected Status"
    };
    let reason = status.canonical_reason().unwrap_or("");
    let mut message = format!("{} {kind}: {reason} for url: {url}", status.as_u16());
    if !detail.is_empty() {
        message.push_str(": ");
        message.extend(detail.chars().take(MAX_ERROR_DETAIL));
    }
    message
}
