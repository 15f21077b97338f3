//! Unified error types for imagegate.
//!
//! [`GatewayError`] covers process-level failures (config discovery,
//! parsing, validation, IO, startup). [`CallError`] is the per-call
//! taxonomy: every failure while forwarding one inbound call ends up as a
//! `CallError`, which maps onto the status code returned to the caller.
//! [`ValidationError`] carries a single config validation finding.

use std::path::PathBuf;

use http::StatusCode;

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub scope: String,
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "  {}: {}: {}", self.scope, self.field, self.message)?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, " ({suggestion})")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

fn format_errors(errors: &[ValidationError]) -> String {
    use std::fmt::Write;
    let mut buf = String::new();
    for (i, e) in errors.iter().enumerate() {
        if i > 0 {
            buf.push('\n');
        }
        // write! to String is infallible (only fails on OOM which is unrecoverable)
        let _ = write!(buf, "{e}");
    }
    buf
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum GatewayError {
    #[error("Config file not found: {}", path.display())]
    ConfigFileNotFound { path: PathBuf },

    #[error("Config parse error in {path}:\n  {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Config validation failed:\n{}", format_errors(.errors))]
    ConfigValidation { errors: Vec<ValidationError> },

    #[error("Unsupported config format: '{0}'")]
    UnsupportedFormat(String),

    #[error("Invalid address: {0}")]
    AddressParse(#[from] std::net::AddrParseError),

    #[error("Invalid URI: {source}")]
    UriParse {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("HTTP request failed: {source}")]
    HttpRequest {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Invalid upstream header value: {0}")]
    InvalidHeader(#[from] http::header::InvalidHeaderValue),

    #[error("Could not derive the upstream login key: {0}")]
    KeyDerivation(String),

    #[error("Cannot write logs to {}: {source}", path.display())]
    LogDir {
        path: PathBuf,
        #[source]
        source: tracing_appender::rolling::InitError,
    },

    #[error("File already exists: {}", path.display())]
    FileExists { path: PathBuf },

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("Health check failed with status {0}")]
    HealthCheckFailed(StatusCode),
}

/// Failure of a single forwarded call.
///
/// Workers never propagate these past the job boundary: each one is turned
/// into a failed outcome and delivered through the job's response channel.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CallError {
    /// Caller's bearer token missing or not on the allow-list.
    #[error("Unauthorized")]
    Unauthorized,

    /// Login against the upstream failed.
    #[error("authentication against upstream failed: {0}")]
    Auth(String),

    /// Upstream answered with a non-2xx status.
    #[error("{message}")]
    Upstream { status: StatusCode, message: String },

    /// Network-level failure: connect, TLS, timeout, broken body.
    #[error("upstream request failed: {0}")]
    Transport(String),

    /// The response channel yielded nothing usable.
    #[error("An internal error occurred.")]
    Internal,
}

impl CallError {
    /// Status code surfaced to the caller for this failure.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Upstream { status, .. } => *status,
            Self::Auth(_) | Self::Transport(_) | Self::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Short classification used as the `kind` field in log events.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::Auth(_) => "auth",
            Self::Upstream { .. } => "upstream",
            Self::Transport(_) => "transport",
            Self::Internal => "internal",
        }
    }

    #[must_use]
    pub fn is_upstream_unauthorized(&self) -> bool {
        matches!(self, Self::Upstream { status, .. } if *status == StatusCode::UNAUTHORIZED)
    }
}
