// src/exec/logs.rs

//! Fetching a container's logs.
//!
//! A fetch reads whatever the [`LogSource`] produces for a target, optionally
//! starting at `since`, for at most [`LOG_FETCH_LIMIT`]:
//!
//! - source finishes: all collected lines, no error
//! - caller cancels: the lines collected so far, no error
//! - limit elapses: the lines collected so far plus a timeout error
//! - source fails: the lines collected so far plus a stream error
//!
//! Fetches take no target lock; they only read.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::{ExecError, StreamError};
use crate::target::TargetIdentity;

use super::capture::{CaptureBuffer, OutputSink};
use super::request::ExecResult;
use super::stream::StreamFuture;

/// Longest a single fetch may run.
pub const LOG_FETCH_LIMIT: Duration = Duration::from_secs(60);

/// What a log source is asked to read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogStreamRequest {
    pub target: TargetIdentity,
    /// Only logs written at or after this instant; everything when `None`.
    pub since: Option<SystemTime>,
}

/// Reads the logs of a container.
///
/// Implementations write log bytes into `sink` as they arrive and resolve at
/// the end of the available logs. Once `cancel` fires they should stop and
/// return [`StreamError::Aborted`].
pub trait LogSource: Send + Sync {
    fn logs(
        &self,
        request: LogStreamRequest,
        sink: OutputSink,
        cancel: CancellationToken,
    ) -> StreamFuture<'_>;
}

impl<S: LogSource + ?Sized> LogSource for Arc<S> {
    fn logs(
        &self,
        request: LogStreamRequest,
        sink: OutputSink,
        cancel: CancellationToken,
    ) -> StreamFuture<'_> {
        (**self).logs(request, sink, cancel)
    }
}

/// One request for a container's logs.
#[derive(Debug, Clone)]
pub struct LogRequest {
    pub target: TargetIdentity,
    pub since: Option<SystemTime>,
    pub cancel: CancellationToken,
}

impl LogRequest {
    pub fn new(target: TargetIdentity) -> Self {
        Self {
            target,
            since: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_since(mut self, since: SystemTime) -> Self {
        self.since = Some(since);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Fetches container logs through a [`LogSource`], bounded in time.
pub struct LogFetcher {
    source: Arc<dyn LogSource>,
    limit: Duration,
}

impl fmt::Debug for LogFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogFetcher")
            .field("limit", &self.limit)
            .finish_non_exhaustive()
    }
}

impl LogFetcher {
    pub fn new<S>(source: S) -> Self
    where
        S: LogSource + 'static,
    {
        Self::with_shared_source(Arc::new(source))
    }

    pub fn with_shared_source(source: Arc<dyn LogSource>) -> Self {
        Self {
            source,
            limit: LOG_FETCH_LIMIT,
        }
    }

    /// Replace the default one-minute limit. Zero falls back to the default.
    pub fn with_limit(mut self, limit: Duration) -> Self {
        self.limit = if limit.is_zero() { LOG_FETCH_LIMIT } else { limit };
        self
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }

    /// Read the logs for `request.target`.
    ///
    /// The collected logs are in [`ExecResult::stdout`]; `stderr` is always
    /// empty. Caller cancellation is not an error.
    pub async fn fetch(&self, request: LogRequest) -> ExecResult {
        let LogRequest {
            target,
            since,
            cancel,
        } = request;

        if let Err(err) = target.validate() {
            warn!(key = %target, error = %err, "rejecting log request");
            return ExecResult::failed(err);
        }

        let label = format!("logs {target}");
        let logs = CaptureBuffer::new();
        let sink = OutputSink::new(logs.clone(), None);

        let source_cancel = cancel.child_token();
        let _stop_source_on_drop = source_cancel.clone().drop_guard();

        info!(key = %target, since = ?since, limit_ms = self.limit.as_millis() as u64, "fetching container logs");
        let mut stream = self
            .source
            .logs(LogStreamRequest { target, since }, sink, source_cancel.clone());

        let deadline = tokio::time::sleep(self.limit);
        tokio::pin!(deadline);

        let error = tokio::select! {
            biased;
            outcome = &mut stream => match outcome {
                Ok(()) => None,
                Err(StreamError::Aborted) if cancel.is_cancelled() => None,
                Err(source) => Some(ExecError::Stream { command: label, source }),
            },
            _ = cancel.cancelled() => {
                debug!("log fetch cancelled; returning collected logs");
                None
            }
            _ = &mut deadline => {
                source_cancel.cancel();
                warn!(command = %label, "log fetch hit its time limit");
                Some(ExecError::Timeout { command: label, timeout: self.limit })
            }
        };

        ExecResult {
            stdout: logs.snapshot(),
            stderr: String::new(),
            error,
        }
    }

    /// Logs for `target` since `since`, or the error the fetch ended with.
    pub async fn fetch_logs(
        &self,
        target: TargetIdentity,
        since: Option<SystemTime>,
    ) -> Result<String, ExecError> {
        let mut request = LogRequest::new(target);
        request.since = since;
        self.fetch(request).await.into_result()
    }
}
