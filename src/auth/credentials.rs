//! Upstream bearer-token lifecycle.
//!
//! [`CredentialManager`] owns the login key (derived once from the account
//! password) and the current access token. Workers read the token at call
//! time, so a refresh performed by one worker is seen by every later call.
//! Concurrent refreshes are allowed to race: tokens are interchangeable
//! bearer values and the last write wins.

use std::sync::Arc;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::Request;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::key::derive_key;
use crate::error::{CallError, GatewayError};
use crate::proxy::stream;
use crate::proxy::transport::Transport;

/// Upstream account credentials.
pub struct Account {
    pub username: String,
    pub password: SecretString,
}

impl Account {
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    key: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    #[serde(rename = "accessToken")]
    access_token: String,
}

pub struct CredentialManager {
    username: String,
    key: SecretString,
    login_url: String,
    transport: Arc<dyn Transport>,
    token: RwLock<Option<String>>,
}

impl CredentialManager {
    /// Derive the login key for `account`. No network call is made.
    pub fn new(
        account: &Account,
        login_url: impl Into<String>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, GatewayError> {
        let key = derive_key(&account.username, account.password.expose_secret())?;
        Ok(Self {
            username: account.username.clone(),
            key: SecretString::from(key),
            login_url: login_url.into(),
            transport,
            token: RwLock::new(None),
        })
    }

    /// The token calls should use right now, if one has been acquired.
    pub async fn current_token(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    /// Exchange the login key for a fresh bearer token. Does not store it.
    pub async fn acquire_token(&self) -> Result<String, CallError> {
        let payload = serde_json::to_vec(&LoginRequest {
            key: self.key.expose_secret(),
        })
        .map_err(|e| CallError::Auth(e.to_string()))?;

        let request = Request::post(self.login_url.as_str())
            .header(CONTENT_TYPE, "application/json")
            .body(Bytes::from(payload))
            .map_err(|e| CallError::Auth(format!("invalid login request: {e}")))?;

        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| CallError::Auth(e.to_string()))?;
        let status = response.status;
        let body = stream::collect(response.body)
            .await
            .map_err(|e| CallError::Auth(e.to_string()))?;

        if !status.is_success() {
            return Err(CallError::Auth(format!(
                "login rejected with status {status}: {}",
                String::from_utf8_lossy(&body).trim()
            )));
        }

        let parsed: LoginResponse = serde_json::from_slice(&body)
            .map_err(|e| CallError::Auth(format!("unexpected login response: {e}")))?;
        Ok(parsed.access_token)
    }

    /// Acquire a new token and make it current.
    pub async fn refresh(&self) -> Result<String, CallError> {
        let token = self.acquire_token().await?;
        *self.token.write().await = Some(token.clone());
        tracing::info!(username = %self.username, "access token acquired");
        Ok(token)
    }

    /// Current token, acquiring one first if none is held yet.
    pub async fn ensure_token(&self) -> Result<String, CallError> {
        match self.current_token().await {
            Some(token) => Ok(token),
            None => self.refresh().await,
        }
    }
}

impl std::fmt::Debug for CredentialManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialManager")
            .field("username", &self.username)
            .field("login_url", &self.login_url)
            .finish_non_exhaustive()
    }
}
