//! Per-endpoint worker.
//!
//! One [`Worker`] owns one endpoint's queue for the life of the process and
//! executes its jobs strictly one at a time, in arrival order. Per job:
//!
//! ```text
//! Received ─► Calling ─┬─► Classifying ─────────────────────────► Delivered
//!                      └─► (401) Retrying: refresh ─► Calling ─► Classifying ─► Delivered
//! ```
//!
//! The retry budget is one refresh per job. Every path, failures included,
//! ends with exactly one [`Outcome`] written to the job's response channel.
//! A [`Message::Shutdown`] on the queue is the only way out of the loop.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use tokio::sync::{mpsc, oneshot};

use super::stream::{self, CHUNK_SIZE};
use super::transport::{ByteStream, RawResponse};
use super::upstream::{UpstreamClient, UpstreamRequest};
use crate::auth::CredentialManager;
use crate::config::model::{Endpoint, OCTET_STREAM, ZIP_ARCHIVE};
use crate::error::CallError;
use crate::server::Stats;

/// Result of executing one job.
pub enum Outcome {
    Buffered {
        body: Bytes,
        status: StatusCode,
        content_type: String,
    },
    Streamed {
        source: ByteStream,
        content_type: String,
    },
    Failed {
        message: String,
        status: StatusCode,
    },
}

impl Outcome {
    #[must_use]
    pub fn failed(error: &CallError) -> Self {
        Self::Failed {
            message: error.to_string(),
            status: error.status(),
        }
    }
}

impl std::fmt::Debug for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buffered {
                body,
                status,
                content_type,
            } => f
                .debug_struct("Buffered")
                .field("status", status)
                .field("content_type", content_type)
                .field("len", &body.len())
                .finish(),
            Self::Streamed { content_type, .. } => f
                .debug_struct("Streamed")
                .field("content_type", content_type)
                .finish_non_exhaustive(),
            Self::Failed { message, status } => f
                .debug_struct("Failed")
                .field("status", status)
                .field("message", message)
                .finish(),
        }
    }
}

pub struct Job {
    pub request: UpstreamRequest,
    pub correlation_id: String,
    pub reply: oneshot::Sender<Outcome>,
}

pub enum Message {
    Job(Job),
    /// Sentinel: stop after everything queued ahead of it.
    Shutdown,
}

/// Endpoint plus its queue bookkeeping, shared by dispatcher and worker.
#[derive(Debug)]
pub struct Lane {
    pub endpoint: Endpoint,
    pending: AtomicUsize,
}

impl Lane {
    #[must_use]
    pub const fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            pending: AtomicUsize::new(0),
        }
    }

    /// Jobs enqueued and not yet delivered.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Relaxed)
    }

    pub(crate) fn enqueued(&self) {
        self.pending.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn settled(&self) {
        self.pending.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Whether a response is relayed as a stream rather than buffered.
#[must_use]
pub fn is_streamed_media_type(content_type: &str) -> bool {
    let essence = content_type.split(';').next().unwrap_or("").trim();
    essence.eq_ignore_ascii_case(OCTET_STREAM) || essence.eq_ignore_ascii_case(ZIP_ARCHIVE)
}

/// Turn a successful upstream response into an outcome.
pub async fn classify(response: RawResponse) -> Result<Outcome, CallError> {
    let content_type = response.content_type().to_string();
    if is_streamed_media_type(&content_type) {
        return Ok(Outcome::Streamed {
            source: stream::rechunk(response.body, CHUNK_SIZE),
            content_type,
        });
    }

    let body = stream::collect(response.body).await?;
    Ok(Outcome::Buffered {
        body,
        status: response.status,
        content_type,
    })
}

pub struct Worker {
    lane: Arc<Lane>,
    upstream: Arc<UpstreamClient>,
    credentials: Arc<CredentialManager>,
    stats: Arc<Stats>,
    queue: mpsc::UnboundedReceiver<Message>,
}

impl Worker {
    #[must_use]
    pub fn new(
        lane: Arc<Lane>,
        upstream: Arc<UpstreamClient>,
        credentials: Arc<CredentialManager>,
        stats: Arc<Stats>,
        queue: mpsc::UnboundedReceiver<Message>,
    ) -> Self {
        Self {
            lane,
            upstream,
            credentials,
            stats,
            queue,
        }
    }

    pub async fn run(mut self) {
        let name = self.lane.endpoint.name.clone();
        tracing::info!(endpoint = %name, url = %self.lane.endpoint.url, "worker started");

        while let Some(message) = self.queue.recv().await {
            match message {
                Message::Job(job) => self.process(job).await,
                Message::Shutdown => break,
            }
        }

        tracing::info!(endpoint = %name, "worker stopped");
    }

    async fn process(&self, job: Job) {
        let Job {
            request,
            correlation_id,
            reply,
        } = job;
        let endpoint = &self.lane.endpoint.name;

        if reply.is_closed() {
            tracing::warn!(
                correlation_id = %correlation_id,
                endpoint = %endpoint,
                "caller went away before the job started, skipping upstream call"
            );
            self.stats.failed.fetch_add(1, Ordering::Relaxed);
            self.lane.settled();
            return;
        }

        tracing::debug!(correlation_id = %correlation_id, endpoint = %endpoint, "job dequeued");
        let outcome = self.execute(&request, &correlation_id).await;

        let counter = if matches!(outcome, Outcome::Failed { .. }) {
            &self.stats.failed
        } else {
            &self.stats.forwarded
        };
        counter.fetch_add(1, Ordering::Relaxed);

        if reply.send(outcome).is_err() {
            tracing::warn!(
                correlation_id = %correlation_id,
                endpoint = %endpoint,
                "caller went away before the result was delivered"
            );
        }
        self.lane.settled();
    }

    async fn execute(&self, request: &UpstreamRequest, correlation_id: &str) -> Outcome {
        let endpoint = &self.lane.endpoint.name;

        let result = match self.attempt(request).await {
            Err(err) if err.is_upstream_unauthorized() => {
                tracing::warn!(
                    correlation_id = %correlation_id,
                    endpoint = %endpoint,
                    "upstream rejected the access token, refreshing"
                );
                self.stats.token_refreshes.fetch_add(1, Ordering::Relaxed);
                match self.credentials.refresh().await {
                    Ok(_) => self.attempt(request).await,
                    Err(err) => Err(err),
                }
            }
            other => other,
        };

        result.unwrap_or_else(|err| {
            tracing::error!(
                correlation_id = %correlation_id,
                endpoint = %endpoint,
                kind = err.kind(),
                status = err.status().as_u16(),
                error = %err,
                "upstream call failed"
            );
            Outcome::failed(&err)
        })
    }

    async fn attempt(&self, request: &UpstreamRequest) -> Result<Outcome, CallError> {
        self.credentials.ensure_token().await?;
        let response = self.upstream.call(&self.lane.endpoint, request).await?;
        classify(response).await
    }
}
