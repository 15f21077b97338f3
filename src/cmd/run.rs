//! `imagegate run`: start the proxy server.
//!
//! Loads configuration, derives the login key, starts one worker per
//! upstream endpoint, and serves the Axum router until SIGTERM / Ctrl+C.
//! On shutdown the workers finish whatever is already queued before the
//! process exits.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{Account, AllowList};
use crate::cli::RunArgs;
use crate::config;
use crate::error::GatewayError;
use crate::logging;
use crate::proxy::transport::HyperTransport;
use crate::server;

pub async fn execute(args: RunArgs) -> Result<(), GatewayError> {
    let log_format = logging::resolve_format(args.pretty, args.json);
    // Dropping the guard flushes the file sink, so it lives until return.
    let _log_guard = logging::init(&args.log_level, log_format, args.log_dir.as_deref())?;

    let (config, source_name) = config::load(args.config.as_deref()).await?;

    let allow_list = AllowList::parse(&args.server_tokens);
    if allow_list.is_empty() {
        tracing::warn!("SERVER_TOKENS is empty, every call will be rejected with 401");
    }

    let timeout =
        (args.upstream_timeout_ms > 0).then(|| Duration::from_millis(args.upstream_timeout_ms));
    let transport = Arc::new(HyperTransport::new(server::build_http_client(), timeout));

    let account = Account::new(args.username, args.password);
    let (state, workers) =
        server::build_state(&config, &account, allow_list, transport, source_name)?;

    // Calls made before the first token arrives acquire one lazily.
    if let Err(e) = state.credentials.refresh().await {
        tracing::warn!(error = %e, "initial login failed, will retry on first call");
    }

    let router = server::build_router(state.clone(), args.max_body);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(
        addr = %addr,
        endpoints = config.endpoints.len(),
        config_source = %state.config_source,
        "imagegate started"
    );

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(server::shutdown_signal())
    .await?;

    state.dispatcher.shutdown();
    workers.join().await;

    tracing::info!("imagegate stopped");
    Ok(())
}
