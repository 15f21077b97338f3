//! Round-robin dispatch of inbound calls onto per-endpoint worker queues.
//!
//! [`Dispatcher::start`] spawns one [`Worker`] task per endpoint and returns
//! the dispatcher together with a [`WorkerPool`] holding the task handles.
//! [`Dispatcher::dispatch`] authorizes the caller, picks the next endpoint,
//! enqueues a job with a fresh one-shot channel, and waits (suspending only
//! the calling task) for the worker's [`Outcome`].
//!
//! **Shutdown:** [`Dispatcher::shutdown`] puts the sentinel on every queue.
//! Jobs already queued ahead of it still run; anything dispatched afterwards
//! is answered with a generic internal error.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use http::Method;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::upstream::{UpstreamClient, UpstreamRequest};
use super::worker::{Job, Lane, Message, Outcome, Worker};
use crate::auth::{AllowList, CredentialManager};
use crate::config::model::Endpoint;
use crate::error::CallError;
use crate::server::Stats;

/// One inbound call as handed over by the HTTP layer.
#[derive(Debug, Clone)]
pub struct InboundCall {
    pub method: Method,
    /// Path including `?query` when present.
    pub path: String,
    pub body: Bytes,
    /// Raw `Authorization` header value.
    pub authorization: Option<String>,
    pub correlation_id: String,
}

struct LaneHandle {
    lane: Arc<Lane>,
    queue: mpsc::UnboundedSender<Message>,
}

pub struct Dispatcher {
    lanes: Vec<LaneHandle>,
    cursor: AtomicUsize,
    allow_list: AllowList,
    stats: Arc<Stats>,
    closed: AtomicBool,
}

/// Join handles of the running workers.
pub struct WorkerPool {
    workers: Vec<(String, JoinHandle<()>)>,
}

impl WorkerPool {
    #[must_use]
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Wait for every worker to leave its loop.
    pub async fn join(self) {
        for (endpoint, handle) in self.workers {
            if let Err(e) = handle.await {
                tracing::error!(endpoint = %endpoint, error = %e, "worker task failed");
            }
        }
    }
}

impl Dispatcher {
    /// Spawn one worker per endpoint. Must be called inside a Tokio runtime.
    #[must_use]
    pub fn start(
        endpoints: Vec<Endpoint>,
        upstream: Arc<UpstreamClient>,
        credentials: Arc<CredentialManager>,
        allow_list: AllowList,
        stats: Arc<Stats>,
    ) -> (Self, WorkerPool) {
        let mut lanes = Vec::with_capacity(endpoints.len());
        let mut workers = Vec::with_capacity(endpoints.len());

        for endpoint in endpoints {
            let name = endpoint.name.clone();
            let lane = Arc::new(Lane::new(endpoint));
            let (queue, inbox) = mpsc::unbounded_channel();

            let worker = Worker::new(
                lane.clone(),
                upstream.clone(),
                credentials.clone(),
                stats.clone(),
                inbox,
            );
            workers.push((name, tokio::spawn(worker.run())));
            lanes.push(LaneHandle { lane, queue });
        }

        let dispatcher = Self {
            lanes,
            cursor: AtomicUsize::new(0),
            allow_list,
            stats,
            closed: AtomicBool::new(false),
        };
        (dispatcher, WorkerPool { workers })
    }

    /// Endpoints in round-robin order, with their queue bookkeeping.
    pub fn lanes(&self) -> impl Iterator<Item = &Lane> {
        self.lanes.iter().map(|handle| handle.lane.as_ref())
    }

    fn next_lane(&self) -> Option<&LaneHandle> {
        if self.lanes.is_empty() {
            return None;
        }
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % self.lanes.len();
        self.lanes.get(idx)
    }

    /// Forward one call and wait for its outcome. Never fails: every error
    /// is expressed as [`Outcome::Failed`].
    pub async fn dispatch(&self, call: InboundCall) -> Outcome {
        let InboundCall {
            method,
            path,
            body,
            authorization,
            correlation_id,
        } = call;

        if let Err(err) = self.allow_list.authorize(authorization.as_deref()) {
            self.stats.rejected.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                correlation_id = %correlation_id,
                kind = err.kind(),
                "caller token rejected"
            );
            return Outcome::failed(&err);
        }

        if self.closed.load(Ordering::Acquire) {
            return self.internal_failure(&correlation_id, "dispatcher is shutting down");
        }

        let Some(handle) = self.next_lane() else {
            return self.internal_failure(&correlation_id, "no endpoints configured");
        };
        let endpoint = &handle.lane.endpoint;
        tracing::info!(
            correlation_id = %correlation_id,
            endpoint = %endpoint.name,
            url = %endpoint.url,
            "forwarding request to worker"
        );

        let (reply, outcome) = oneshot::channel();
        let job = Job {
            request: UpstreamRequest { method, path, body },
            correlation_id: correlation_id.clone(),
            reply,
        };

        handle.lane.enqueued();
        if handle.queue.send(Message::Job(job)).is_err() {
            handle.lane.settled();
            return self.internal_failure(&correlation_id, "worker queue is closed");
        }

        match outcome.await {
            Ok(outcome) => outcome,
            Err(_) => {
                self.internal_failure(&correlation_id, "worker dropped the job without a result")
            }
        }
    }

    /// [`dispatch`](Self::dispatch) and render the outcome as an HTTP response.
    pub async fn handle(&self, call: InboundCall) -> Response {
        respond(self.dispatch(call).await)
    }

    /// Stop accepting jobs and tell every worker to exit once its queue drains.
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        for handle in &self.lanes {
            // A send error means the worker is already gone.
            let _ = handle.queue.send(Message::Shutdown);
        }
        tracing::info!(workers = self.lanes.len(), "dispatcher shutting down");
    }

    fn internal_failure(&self, correlation_id: &str, reason: &str) -> Outcome {
        let err = CallError::Internal;
        self.stats.failed.fetch_add(1, Ordering::Relaxed);
        tracing::error!(
            correlation_id = %correlation_id,
            kind = err.kind(),
            reason,
            "no result for call"
        );
        Outcome::failed(&err)
    }
}

/// Render an outcome at the HTTP boundary.
///
/// Streamed outcomes become a chunked 200 whose body is pulled from the
/// upstream connection as the caller reads it.
#[must_use]
pub fn respond(outcome: Outcome) -> Response {
    match outcome {
        Outcome::Streamed {
            source,
            content_type,
        } => build(StatusCode::OK, &content_type, Body::from_stream(source)),
        Outcome::Buffered {
            body,
            status,
            content_type,
        } => build(status, &content_type, Body::from(body)),
        Outcome::Failed { message, status } => build(status, "text/plain", Body::from(message)),
    }
}

fn build(status: StatusCode, content_type: &str, body: Body) -> Response {
    let mut builder = Response::builder().status(status);
    if !content_type.is_empty() {
        builder = builder.header(CONTENT_TYPE, content_type);
    }
    builder.body(body).unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to build response");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            CallError::Internal.to_string(),
        )
            .into_response()
    })
}
