//! Imagegate is an authenticating reverse proxy for image generation.
//!
//! Callers present one of a fixed set of bearer tokens; accepted calls are
//! spread round-robin over the configured upstream endpoints, each served
//! by its own worker queue. Workers hold the upstream account's access
//! token, log in again once when the upstream rejects it, and relay the
//! result either buffered or as a chunked stream for binary payloads.
//!
//! # Architecture
//!
//! - [`cli`] -- Command-line argument parsing with clap derive macros.
//! - [`cmd`] -- Subcommand dispatch and execution (run, init, validate, health).
//! - [`config`] -- Config file discovery, parsing, and validation.
//! - [`error`] -- Unified error types using `thiserror`.
//! - [`auth`] -- Login-key derivation, upstream token lifecycle, and the
//!   caller allow-list.
//! - [`health`] -- `GET /health` endpoint handler returning runtime diagnostics.
//! - [`logging`] -- Structured tracing setup with JSON and pretty-print output.
//! - [`proxy`] -- Outbound transport, per-endpoint workers, and round-robin
//!   dispatch.
//! - [`server`] -- Axum server setup, shared application state, HTTP client, and
//!   graceful shutdown.
//!
//! # Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `yaml` | YAML config file support _(enabled by default)_ |
//! | `json` | JSON config file support |
//! | `toml` | TOML config file support |
//! | `file-backends` | All file format backends |
//! | `full` | All features |

// Binary crate: public functions are internal, not consumed by external users.
#![allow(clippy::missing_errors_doc)]

pub mod auth;
pub mod cli;
pub mod cmd;
pub mod config;
pub mod error;
pub mod health;
pub mod logging;
pub mod proxy;
pub mod server;
