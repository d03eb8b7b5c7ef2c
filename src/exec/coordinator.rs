// src/exec/coordinator.rs

//! Serialized, deadline-bounded command execution.
//!
//! Per call:
//!
//! ```text
//!   validate ─▶ lock wait ─▶ locked + running ─┬─▶ completed ────┐
//!                                               ├─▶ timed out     ├─▶ unlocked
//!                                               ├─▶ cancelled     │
//!                                               └─▶ stream error ─┘
//! ```
//!
//! The target lock travels into the worker task together with the stream, so
//! it is released when the worker exits and not when the caller returns. A
//! timed-out call may return while its worker is still unwinding; the next
//! call for the same target waits for that worker.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::DEFAULT_SWEEP_INTERVAL;
use crate::errors::{ExecError, StreamError};
use crate::locks::{NamedLock, NamedLockGuard, NamedLockRegistry};
use crate::target::TargetIdentity;

use super::capture::{CaptureBuffer, OutputSink};
use super::request::{ExecRequest, ExecResult, StreamRequest, shell_argv};
use super::stream::{StreamExecutor, StreamIo};

/// Timeout applied when a request asks for less than [`MIN_TIMEOUT`].
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Smallest timeout honoured as given.
pub const MIN_TIMEOUT: Duration = Duration::from_millis(1);

/// How long a timed-out or cancelled call listens for the worker's own report.
pub const DEFAULT_CANCEL_GRACE: Duration = Duration::from_millis(25);

/// Idle lifetime of a per-target lock in the registry.
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(10);

/// Tunables for a [`Coordinator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecSettings {
    pub default_timeout: Duration,
    pub min_timeout: Duration,
    pub cancel_grace: Duration,
    /// `None` waits for a busy target indefinitely.
    pub lock_wait_timeout: Option<Duration>,
    pub lock_ttl: Duration,
    /// How often lock lookups also reclaim idle locks.
    pub lock_sweep_interval: Duration,
}

impl Default for ExecSettings {
    fn default() -> Self {
        Self {
            default_timeout: DEFAULT_TIMEOUT,
            min_timeout: MIN_TIMEOUT,
            cancel_grace: DEFAULT_CANCEL_GRACE,
            lock_wait_timeout: None,
            lock_ttl: DEFAULT_LOCK_TTL,
            lock_sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

impl ExecSettings {
    /// Timeouts below the minimum are raised to the default, never rejected.
    ///
    /// The minimum never drops below [`MIN_TIMEOUT`], so a zero timeout always
    /// means "use the default".
    pub fn effective_timeout(&self, requested: Duration) -> Duration {
        if requested < self.min_timeout.max(MIN_TIMEOUT) {
            self.default_timeout
        } else {
            requested
        }
    }
}

/// How the wait on the worker ended.
enum Ending {
    Finished(Result<(), StreamError>),
    TimedOut,
    Cancelled,
}

/// Runs commands against remote targets, one at a time per target.
///
/// Cheap to share behind an `Arc`; all state lives in the lock registry.
pub struct Coordinator {
    executor: Arc<dyn StreamExecutor>,
    locks: Arc<NamedLockRegistry>,
    settings: ExecSettings,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("locks", &self.locks)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Coordinator {
    pub fn new<E>(executor: E, settings: ExecSettings) -> Self
    where
        E: StreamExecutor + 'static,
    {
        Self::with_shared_executor(Arc::new(executor), settings)
    }

    pub fn with_shared_executor(executor: Arc<dyn StreamExecutor>, settings: ExecSettings) -> Self {
        Self {
            executor,
            locks: Arc::new(NamedLockRegistry::with_sweep_interval(
                settings.lock_ttl,
                settings.lock_sweep_interval,
            )),
            settings,
        }
    }

    /// Use `locks` instead of a private registry, e.g. to serialize with other
    /// coordinators or with callers locking keys directly.
    pub fn with_locks(mut self, locks: Arc<NamedLockRegistry>) -> Self {
        self.locks = locks;
        self
    }

    pub fn locks(&self) -> &Arc<NamedLockRegistry> {
        &self.locks
    }

    pub fn settings(&self) -> &ExecSettings {
        &self.settings
    }

    /// Lock handle for an arbitrary key in this coordinator's registry.
    pub fn named_lock(&self, key: &str) -> NamedLock {
        self.locks.get_or_create(key)
    }

    /// Run `request` and report its output and how it ended.
    ///
    /// Never fails outright: every failure is in [`ExecResult::error`] next to
    /// whatever output was captured.
    pub async fn execute(&self, request: ExecRequest) -> ExecResult {
        let ExecRequest {
            target,
            command,
            timeout,
            cancel,
            stdin,
            stdout_sink,
            stderr_sink,
        } = request;

        if let Err(err) = target.validate() {
            warn!(key = %target, error = %err, "rejecting execution request");
            return ExecResult::failed(err);
        }

        let timeout = self.settings.effective_timeout(timeout);
        let key = target.lock_key();
        let lock = self.locks.get_or_create(&key);

        debug!(key = %key, command = %command, "waiting for target lock");
        let guard = match self.acquire(&lock, &command, &cancel).await {
            Ok(guard) => guard,
            Err(err) => {
                info!(key = %key, error = %err, "execution abandoned before start");
                return ExecResult::failed(err);
            }
        };

        info!(
            key = %key,
            command = %command,
            timeout_ms = timeout.as_millis() as u64,
            "executing command"
        );

        let stdout = CaptureBuffer::new();
        let stderr = CaptureBuffer::new();
        let io = StreamIo {
            stdin,
            stdout: OutputSink::new(stdout.clone(), stdout_sink),
            stderr: OutputSink::new(stderr.clone(), stderr_sink),
        };
        let stream_request = StreamRequest {
            argv: shell_argv(&command),
            stdin_attached: io.stdin.is_some(),
            target,
        };

        // Fires on the caller's token or on our own deadline, whichever is first.
        let worker_cancel = cancel.child_token();
        // Cancels the worker if this future is dropped mid-call.
        let _stop_worker_on_drop = worker_cancel.clone().drop_guard();
        let (done_tx, mut done_rx) = oneshot::channel();
        let worker = self.spawn_worker(guard, stream_request, io, worker_cancel.clone(), done_tx);

        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        let ending = tokio::select! {
            biased;
            report = &mut done_rx => Ending::Finished(flatten_report(report)),
            _ = cancel.cancelled() => Ending::Cancelled,
            _ = &mut deadline => Ending::TimedOut,
        };

        let error = match ending {
            Ending::Finished(outcome) => {
                // The worker has reported; wait the last instant for it to
                // drop the guard so the lock is free when we return.
                await_worker(worker, &key).await;
                finished_error(outcome, &command, &cancel)
            }
            Ending::TimedOut => {
                let cause = ExecError::Timeout {
                    command: command.clone(),
                    timeout,
                };
                self.interrupted(cause, &key, &command, &worker_cancel, &mut done_rx)
                    .await
            }
            Ending::Cancelled => {
                let cause = ExecError::Cancelled {
                    command: command.clone(),
                };
                self.interrupted(cause, &key, &command, &worker_cancel, &mut done_rx)
                    .await
            }
        };

        ExecResult {
            stdout: stdout.snapshot(),
            stderr: stderr.snapshot(),
            error,
        }
    }

    /// Run `command` with the default timeout and return its stdout.
    pub async fn run_command(
        &self,
        target: TargetIdentity,
        command: impl Into<String>,
    ) -> Result<String, ExecError> {
        self.run_command_with_timeout(target, command, self.settings.default_timeout)
            .await
    }

    pub async fn run_command_with_timeout(
        &self,
        target: TargetIdentity,
        command: impl Into<String>,
        timeout: Duration,
    ) -> Result<String, ExecError> {
        self.run_command_with_cancel(target, command, timeout, CancellationToken::new())
            .await
    }

    pub async fn run_command_with_cancel(
        &self,
        target: TargetIdentity,
        command: impl Into<String>,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> Result<String, ExecError> {
        let request = ExecRequest::new(target, command)
            .with_timeout(timeout)
            .with_cancel(cancel);
        self.execute(request).await.into_result()
    }

    async fn acquire(
        &self,
        lock: &NamedLock,
        command: &str,
        cancel: &CancellationToken,
    ) -> Result<NamedLockGuard, ExecError> {
        let wait = async {
            match self.settings.lock_wait_timeout {
                Some(limit) => tokio::time::timeout(limit, lock.lock())
                    .await
                    .map_err(|_| ExecError::LockAcquisitionTimeout {
                        key: lock.key().to_string(),
                        waited: limit,
                    }),
                None => Ok(lock.lock().await),
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ExecError::Cancelled {
                command: command.to_string(),
            }),
            guard = wait => guard,
        }
    }

    fn spawn_worker(
        &self,
        guard: NamedLockGuard,
        request: StreamRequest,
        io: StreamIo,
        cancel: CancellationToken,
        done_tx: oneshot::Sender<Result<(), StreamError>>,
    ) -> JoinHandle<()> {
        let executor = Arc::clone(&self.executor);

        tokio::spawn(async move {
            let outcome = executor.stream(request, io, cancel).await;
            if let Err(err) = &outcome {
                debug!(key = %guard.key(), error = %err, "stream reported failure");
            }
            // The caller may be gone after a timeout.
            let _ = done_tx.send(outcome);
            debug!(key = %guard.key(), "worker exited; releasing target lock");
            drop(guard);
        })
    }

    /// Stop the worker after the deadline or the caller's cancellation won,
    /// and collect a stream failure that arrives within the grace period.
    async fn interrupted(
        &self,
        cause: ExecError,
        key: &str,
        command: &str,
        worker_cancel: &CancellationToken,
        done_rx: &mut oneshot::Receiver<Result<(), StreamError>>,
    ) -> Option<ExecError> {
        worker_cancel.cancel();
        warn!(key, error = %cause, "execution interrupted; signalled worker to stop");

        // `Aborted` only acknowledges the stop; anything else is a real failure.
        let late = tokio::time::timeout(self.settings.cancel_grace, done_rx).await;
        let stream_err = match late {
            Ok(report) => flatten_report(report)
                .err()
                .filter(|err| *err != StreamError::Aborted),
            Err(_) => None,
        };

        let mut errors = vec![cause];
        errors.extend(stream_err.map(|source| ExecError::Stream {
            command: command.to_string(),
            source,
        }));
        ExecError::aggregate(errors)
    }
}

fn finished_error(
    outcome: Result<(), StreamError>,
    command: &str,
    cancel: &CancellationToken,
) -> Option<ExecError> {
    let source = outcome.err()?;

    // The failure may be the stream reacting to the caller's cancellation.
    let cancelled = cancel.is_cancelled().then(|| ExecError::Cancelled {
        command: command.to_string(),
    });
    let stream_err = (source != StreamError::Aborted || cancelled.is_none()).then(|| {
        ExecError::Stream {
            command: command.to_string(),
            source,
        }
    });

    ExecError::aggregate(cancelled.into_iter().chain(stream_err))
}

fn flatten_report(
    report: Result<Result<(), StreamError>, oneshot::error::RecvError>,
) -> Result<(), StreamError> {
    report.unwrap_or_else(|_| {
        Err(StreamError::Transport(
            "worker exited without reporting an outcome".to_string(),
        ))
    })
}

async fn await_worker(worker: JoinHandle<()>, key: &str) {
    if let Err(e) = worker.await {
        warn!(key, error = %e, "execution worker failed");
    }
}
