//! Structured logging setup using the `tracing` ecosystem.
//!
//! Configures a `tracing-subscriber` with either JSON output (for
//! production) or pretty-printed output (for TTY / local dev). Format
//! is auto-detected from the terminal but can be forced via `--json`
//! or `--pretty`.
//!
//! With `--log-dir` a second JSON layer writes to daily-rotated
//! `imagegate.<date>.log` files, keeping the newest [`MAX_LOG_FILES`].
//! Writes go through a background thread; the returned [`WorkerGuard`]
//! flushes it when dropped and must live as long as the process logs.

use std::path::Path;

use tracing::Subscriber;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::Targets;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer};

use crate::cli::LogLevel;
use crate::error::GatewayError;

pub const LOG_FILE_PREFIX: &str = "imagegate";
pub const MAX_LOG_FILES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[must_use]
pub fn resolve_format(pretty: bool, json: bool) -> LogFormat {
    if json {
        LogFormat::Json
    } else if pretty || std::io::IsTerminal::is_terminal(&std::io::stdout()) {
        LogFormat::Pretty
    } else {
        LogFormat::Json
    }
}

/// Level filter for our own events. Dependencies are held at `warn` so that
/// `debug` does not drown in hyper and rustls connection chatter.
fn filter(level: &LogLevel) -> Targets {
    Targets::new()
        .with_default(tracing::Level::WARN.min(level.to_tracing_level()))
        .with_target(env!("CARGO_CRATE_NAME"), level.to_tracing_level())
        .with_target("tower_http", level.to_tracing_level())
}

/// Non-blocking writer over a daily-rotated file in `dir`.
pub fn file_writer(dir: &Path) -> Result<(NonBlocking, WorkerGuard), GatewayError> {
    std::fs::create_dir_all(dir)?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .max_log_files(MAX_LOG_FILES)
        .build(dir)
        .map_err(|source| GatewayError::LogDir {
            path: dir.to_path_buf(),
            source,
        })?;
    Ok(tracing_appender::non_blocking(appender))
}

fn file_layer<S>(writer: Option<NonBlocking>) -> Option<impl Layer<S>>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    writer.map(|w| {
        fmt::layer()
            .json()
            .with_target(false)
            .with_ansi(false)
            .with_writer(w)
    })
}

pub fn init(
    level: &LogLevel,
    format: LogFormat,
    log_dir: Option<&Path>,
) -> Result<Option<WorkerGuard>, GatewayError> {
    let filter = filter(level);
    let (file, guard) = match log_dir {
        Some(dir) => {
            let (writer, guard) = file_writer(dir)?;
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_target(false))
                .with(file_layer(file))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().pretty())
                .with(file_layer(file))
                .init();
        }
    }

    Ok(guard)
}
