//! Command-line interface definitions using clap derive macros.
//!
//! Contains the top-level [`Cli`] parser, the [`Commands`] enum for
//! subcommands (run, init, validate, health), and their associated
//! argument structs. Every `run` flag has an environment variable
//! equivalent for container deployments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(
    name = "imagegate",
    version,
    about = "Authenticating reverse proxy for image generation",
    propagate_version = true,
    after_help = "\x1b[1mQuick start:\x1b[0m\n  \
        imagegate init                       Write a starter config\n  \
        imagegate run                        Start with ./imagegate.yaml or defaults\n  \
        imagegate run -c gate.yaml           Start with a specific config"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the proxy server
    Run(Box<RunArgs>),

    /// Generate a starter config file
    Init(InitArgs),

    /// Validate a config file without starting
    Validate(ValidateArgs),

    /// Check health of a running instance
    Health(HealthArgs),
}

#[derive(Args)]
#[command(after_help = "\x1b[1mExamples:\x1b[0m\n  \
        imagegate run                                  Auto-detect config\n  \
        imagegate run -c gate.yaml -p 8080 --pretty    Local dev mode\n  \
        SERVER_TOKENS=a,b imagegate run                Accept two caller tokens")]
pub struct RunArgs {
    /// Config file path (.yaml, .json, .toml)
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Listen port
    #[arg(short, long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    /// Listen address
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    pub host: String,

    // -- Credentials --
    /// Upstream account username
    #[arg(long, env = "NOVELAI_USERNAME", help_heading = "Credentials")]
    pub username: String,

    /// Upstream account password
    #[arg(
        long,
        env = "NOVELAI_PASSWORD",
        hide_env_values = true,
        help_heading = "Credentials"
    )]
    pub password: String,

    /// Comma-delimited bearer tokens accepted from callers
    #[arg(
        long,
        env = "SERVER_TOKENS",
        default_value = "",
        hide_env_values = true,
        hide_default_value = true,
        help_heading = "Credentials"
    )]
    pub server_tokens: String,

    // -- Logging --
    /// Log level
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// Force pretty (human-readable) log output
    #[arg(long)]
    pub pretty: bool,

    /// Force JSON log output (overrides TTY detection)
    #[arg(long, conflicts_with = "pretty")]
    pub json: bool,

    /// Also write JSON logs to daily-rotated files in this directory
    #[arg(long, env = "LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    // -- Tuning --
    /// Upstream response timeout in milliseconds (0 disables)
    #[arg(
        long,
        env = "UPSTREAM_TIMEOUT_MS",
        default_value_t = 300_000,
        help_heading = "Tuning"
    )]
    pub upstream_timeout_ms: u64,

    /// Max request body size in bytes
    #[arg(
        long,
        env = "MAX_BODY_SIZE",
        default_value_t = 10_485_760,
        help_heading = "Tuning"
    )]
    pub max_body: usize,
}

#[derive(Args)]
#[command(after_help = "\x1b[1mExamples:\x1b[0m\n  \
        imagegate init                           Default endpoints as YAML\n  \
        imagegate init -f toml -o gate.toml      TOML at a custom path")]
pub struct InitArgs {
    /// Output format
    #[arg(short, long, default_value = "yaml")]
    pub format: ConfigFormat,

    /// Output file path
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct ValidateArgs {
    /// Config file to validate
    #[arg(default_value = "imagegate.yaml")]
    pub config: PathBuf,

    /// Output format
    #[arg(long, default_value = "text")]
    pub format: ValidateFormat,
}

#[derive(Args)]
pub struct HealthArgs {
    /// URL of the running instance
    #[arg(default_value = "http://localhost:5000")]
    pub url: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    #[must_use]
    pub const fn to_tracing_level(&self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

#[derive(Clone, Debug, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

impl ConfigFormat {
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Yaml => "yaml",
            Self::Json => "json",
            Self::Toml => "toml",
        }
    }
}

#[derive(Clone, Debug, ValueEnum)]
pub enum ValidateFormat {
    Text,
    Json,
}
