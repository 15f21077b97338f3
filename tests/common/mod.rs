//! Shared fixtures: a scripted upstream standing in for the network, and
//! an in-process server bound to an ephemeral port.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue, Method, Request, StatusCode};

use imagegate::auth::{Account, AllowList};
use imagegate::config::model::{Config, Endpoint, UpstreamSettings, OCTET_STREAM, ZIP_ARCHIVE};
use imagegate::error::CallError;
use imagegate::proxy::dispatcher::WorkerPool;
use imagegate::proxy::transport::{RawResponse, Transport};
use imagegate::server::{self, AppState};

pub const LOGIN_URL: &str = "https://login.example.net/user/login";
pub const CALLER_TOKEN: &str = "caller-secret";
/// Same inbound limit `imagegate run` uses by default.
pub const MAX_BODY: usize = 10 * 1024 * 1024;

/// One scripted upstream answer.
#[derive(Clone)]
pub enum Reply {
    Respond {
        status: StatusCode,
        content_type: Option<&'static str>,
        body: Vec<u8>,
        /// Body is handed out in pieces of this size.
        piece: usize,
        delay: Duration,
    },
    Fail(&'static str),
}

impl Reply {
    pub fn json(status: StatusCode, body: &str) -> Self {
        Self::Respond {
            status,
            content_type: Some("application/json"),
            body: body.as_bytes().to_vec(),
            piece: usize::MAX,
            delay: Duration::ZERO,
        }
    }

    pub fn text(status: StatusCode, body: &str) -> Self {
        Self::Respond {
            status,
            content_type: Some("text/plain"),
            body: body.as_bytes().to_vec(),
            piece: usize::MAX,
            delay: Duration::ZERO,
        }
    }

    pub fn binary(content_type: &'static str, body: Vec<u8>, piece: usize) -> Self {
        Self::Respond {
            status: StatusCode::OK,
            content_type: Some(content_type),
            body,
            piece,
            delay: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn delayed(self, by: Duration) -> Self {
        match self {
            Self::Respond {
                status,
                content_type,
                body,
                piece,
                ..
            } => Self::Respond {
                status,
                content_type,
                body,
                piece,
                delay: by,
            },
            other => other,
        }
    }
}

/// What the upstream saw for one non-login call.
#[derive(Debug, Clone)]
pub struct Seen {
    pub method: Method,
    pub uri: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Answers logins with `tok-1`, `tok-2`, ... and every other call with the
/// next scripted [`Reply`], falling back to `{"ok":true}`.
pub struct ScriptedUpstream {
    script: Mutex<VecDeque<Reply>>,
    seen: Mutex<Vec<Seen>>,
    logins: AtomicUsize,
    login_fails: Mutex<bool>,
}

impl ScriptedUpstream {
    pub fn new(script: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            seen: Mutex::new(Vec::new()),
            logins: AtomicUsize::new(0),
            login_fails: Mutex::new(false),
        })
    }

    pub fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    pub fn set_login_fails(&self, fails: bool) {
        *self.login_fails.lock().unwrap() = fails;
    }

    fn login(&self) -> Result<RawResponse, CallError> {
        if *self.login_fails.lock().unwrap() {
            return Ok(raw(
                StatusCode::UNAUTHORIZED,
                Some("text/plain"),
                b"bad key".to_vec(),
                usize::MAX,
            ));
        }
        let n = self.logins.fetch_add(1, Ordering::SeqCst) + 1;
        let body = format!(r#"{{"accessToken":"tok-{n}"}}"#).into_bytes();
        Ok(raw(StatusCode::CREATED, Some("application/json"), body, usize::MAX))
    }
}

fn raw(
    status: StatusCode,
    content_type: Option<&'static str>,
    body: Vec<u8>,
    piece: usize,
) -> RawResponse {
    let mut headers = HeaderMap::new();
    if let Some(ct) = content_type {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(ct));
    }
    let pieces: Vec<Result<Bytes, CallError>> = body
        .chunks(piece.max(1))
        .map(|c| Ok(Bytes::copy_from_slice(c)))
        .collect();
    RawResponse {
        status,
        headers,
        body: Box::pin(futures::stream::iter(pieces)),
    }
}

#[async_trait]
impl Transport for ScriptedUpstream {
    async fn send(&self, request: Request<Bytes>) -> Result<RawResponse, CallError> {
        if request.uri() == LOGIN_URL {
            return self.login();
        }

        self.seen.lock().unwrap().push(Seen {
            method: request.method().clone(),
            uri: request.uri().to_string(),
            headers: request.headers().clone(),
            body: request.body().clone(),
        });

        let reply = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Reply::json(StatusCode::OK, r#"{"ok":true}"#));

        match reply {
            Reply::Respond {
                status,
                content_type,
                body,
                piece,
                delay,
            } => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok(raw(status, content_type, body, piece))
            }
            Reply::Fail(reason) => Err(CallError::Transport(reason.to_string())),
        }
    }
}

pub fn two_endpoint_config() -> Config {
    Config {
        endpoints: vec![
            Endpoint {
                name: "api".into(),
                url: "https://api.example.net".into(),
                accept: ZIP_ARCHIVE.into(),
            },
            Endpoint {
                name: "image".into(),
                url: "https://image.example.net".into(),
                accept: OCTET_STREAM.into(),
            },
        ],
        upstream: UpstreamSettings {
            login_url: LOGIN_URL.into(),
            ..UpstreamSettings::default()
        },
    }
}

pub fn single_endpoint_config() -> Config {
    let mut config = two_endpoint_config();
    config.endpoints.truncate(1);
    config
}

pub struct TestGate {
    pub addr: SocketAddr,
    pub state: Arc<AppState>,
    pub upstream: Arc<ScriptedUpstream>,
    pub workers: Option<WorkerPool>,
    shutdown: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestGate {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// POST to the generation route with the accepted caller token.
    pub async fn generate(&self, query: &str, body: &str) -> reqwest::Response {
        reqwest::Client::new()
            .post(self.url(&format!("/ai/generate-image{query}")))
            .header(AUTHORIZATION, format!("Bearer {CALLER_TOKEN}"))
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()
            .await
            .unwrap()
    }

    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for TestGate {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Start a gate over `config` whose upstream follows `script`. Logs in once
/// up front, like `imagegate run` does.
pub async fn start(config: Config, script: Vec<Reply>) -> TestGate {
    let upstream = ScriptedUpstream::new(script);
    let (state, workers) = server::build_state(
        &config,
        &Account::new("artist@example.org", "hunter2"),
        AllowList::parse(&format!("{CALLER_TOKEN},other-caller")),
        upstream.clone(),
        "test",
    )
    .unwrap();
    state.credentials.refresh().await.unwrap();

    let router = server::build_router(state.clone(), MAX_BODY);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        })
        .await
        .unwrap();
    });

    TestGate {
        addr,
        state,
        upstream,
        workers: Some(workers),
        shutdown: Some(shutdown_tx),
    }
}
