//! Axum server setup, shared application state, and graceful shutdown.
//!
//! Contains [`AppState`] (the `Arc`-shared state holding the dispatcher,
//! credentials, stats, and uptime), [`build_state`] which wires the
//! upstream client and starts the endpoint workers, [`build_router`] for
//! the Axum router with middleware layers, [`build_http_client`] for the
//! connection-pooled hyper client, and [`shutdown_signal`] for
//! SIGTERM / Ctrl+C handling.

use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{Account, AllowList, CredentialManager};
use crate::config::model::Config;
use crate::error::GatewayError;
use crate::health::health_handler;
use crate::proxy;
use crate::proxy::dispatcher::{Dispatcher, WorkerPool};
use crate::proxy::transport::Transport;
use crate::proxy::upstream::UpstreamClient;

/// Route serving image generation.
pub const GENERATE_PATH: &str = "/ai/generate-image";

#[derive(Debug)]
pub struct Stats {
    pub forwarded: AtomicU64,
    pub failed: AtomicU64,
    pub rejected: AtomicU64,
    pub token_refreshes: AtomicU64,
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl Stats {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            forwarded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            token_refreshes: AtomicU64::new(0),
        }
    }
}

pub type HttpsConnector =
    hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>;
pub type HttpClient = Client<HttpsConnector, http_body_util::Full<bytes::Bytes>>;

pub struct AppState {
    pub dispatcher: Dispatcher,
    pub credentials: Arc<CredentialManager>,
    pub stats: Arc<Stats>,
    pub start_time: Instant,
    pub config_source: String,
}

#[must_use]
pub fn build_http_client() -> HttpClient {
    // With more than one rustls crypto provider compiled in, rustls cannot
    // pick one on its own.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let https = hyper_rustls::HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_or_http()
        .enable_http1()
        .build();
    Client::builder(TokioExecutor::new())
        .pool_idle_timeout(Duration::from_secs(30))
        .build(https)
}

/// Derive the login key, build the upstream client, and start one worker
/// per configured endpoint.
///
/// No network call is made here; the first token is acquired by the caller
/// or lazily by the first job.
pub fn build_state(
    config: &Config,
    account: &Account,
    allow_list: AllowList,
    transport: Arc<dyn Transport>,
    config_source: impl Into<String>,
) -> Result<(Arc<AppState>, WorkerPool), GatewayError> {
    let credentials = Arc::new(CredentialManager::new(
        account,
        config.upstream.login_url.clone(),
        transport.clone(),
    )?);
    let upstream = Arc::new(UpstreamClient::new(
        &config.upstream,
        transport,
        credentials.clone(),
    )?);
    let stats = Arc::new(Stats::new());

    let (dispatcher, workers) = Dispatcher::start(
        config.endpoints.clone(),
        upstream,
        credentials.clone(),
        allow_list,
        stats.clone(),
    );

    let state = Arc::new(AppState {
        dispatcher,
        credentials,
        stats,
        start_time: Instant::now(),
        config_source: config_source.into(),
    });
    Ok((state, workers))
}

pub fn build_router(state: Arc<AppState>, max_body: usize) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route(
            GENERATE_PATH,
            get(proxy::forward_handler)
                .post(proxy::forward_handler)
                .put(proxy::forward_handler)
                .delete(proxy::forward_handler),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::disable())
                .layer(RequestBodyLimitLayer::new(max_body)),
        )
        .with_state(state)
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
}
