//! `GET /health` endpoint handler.
//!
//! Returns a [`HealthResponse`] JSON payload containing the server
//! version, uptime, config source, whether an upstream token is held,
//! per-endpoint queue depth, and cumulative request statistics.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::server::AppState;

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub config_source: String,
    pub token_present: bool,
    pub endpoints: Vec<EndpointHealth>,
    pub stats: StatsResponse,
}

#[derive(Serialize, Deserialize)]
pub struct EndpointHealth {
    pub name: String,
    pub url: String,
    pub pending: usize,
}

#[derive(Serialize, Deserialize)]
pub struct StatsResponse {
    pub requests_forwarded: u64,
    pub requests_failed: u64,
    pub requests_rejected: u64,
    pub token_refreshes: u64,
}

pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let endpoints = state
        .dispatcher
        .lanes()
        .map(|lane| EndpointHealth {
            name: lane.endpoint.name.clone(),
            url: lane.endpoint.url.clone(),
            pending: lane.pending(),
        })
        .collect();

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        config_source: state.config_source.clone(),
        token_present: state.credentials.current_token().await.is_some(),
        endpoints,
        stats: StatsResponse {
            requests_forwarded: state.stats.forwarded.load(Ordering::Relaxed),
            requests_failed: state.stats.failed.load(Ordering::Relaxed),
            requests_rejected: state.stats.rejected.load(Ordering::Relaxed),
            token_refreshes: state.stats.token_refreshes.load(Ordering::Relaxed),
        },
    })
}
