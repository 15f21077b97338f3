//! Fixed outbound header set for upstream calls.
//!
//! [`base_headers`] builds the headers every upstream call carries
//! (content type, origin/referer markers, browser user agent) once at
//! startup. [`for_endpoint`] layers the per-endpoint `Accept` and the
//! per-call `Authorization` on top.

use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, ORIGIN, REFERER, USER_AGENT};
use http::{HeaderMap, HeaderValue};

use crate::config::model::{Endpoint, UpstreamSettings};
use crate::error::CallError;

pub fn base_headers(
    settings: &UpstreamSettings,
) -> Result<HeaderMap, http::header::InvalidHeaderValue> {
    let origin = HeaderValue::from_str(&settings.origin)?;

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ORIGIN, origin.clone());
    headers.insert(REFERER, origin);
    headers.insert(USER_AGENT, HeaderValue::from_str(&settings.user_agent)?);
    Ok(headers)
}

pub fn for_endpoint(
    base: &HeaderMap,
    endpoint: &Endpoint,
    token: &str,
) -> Result<HeaderMap, CallError> {
    let mut headers = base.clone();

    let accept = HeaderValue::from_str(&endpoint.accept).map_err(|_| {
        CallError::Transport(format!(
            "endpoint {} has an invalid accept value",
            endpoint.name
        ))
    })?;
    headers.insert(ACCEPT, accept);

    let mut bearer = HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|_| CallError::Auth("access token is not a valid header value".into()))?;
    bearer.set_sensitive(true);
    headers.insert(AUTHORIZATION, bearer);

    Ok(headers)
}
