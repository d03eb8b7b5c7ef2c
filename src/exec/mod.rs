// src/exec/mod.rs

//! Remote command execution layer.
//!
//! - [`coordinator`] owns the per-target serialization, the deadline and the
//!   error aggregation. This is what callers use.
//! - [`stream`] defines the [`StreamExecutor`] trait the coordinator drives.
//! - [`logs`] fetches container logs through a [`LogSource`], bounded in time.
//! - [`local`] runs commands and serves logs on the local host.
//! - [`capture`] accumulates output and tees it to optional live sinks.
//! - [`request`] holds the request/result types.

pub mod capture;
pub mod coordinator;
pub mod local;
pub mod logs;
pub mod request;
pub mod stream;

pub use capture::{CaptureBuffer, LiveReceiver, LiveSink, OutputSink, live_sink};
pub use coordinator::{
    Coordinator, DEFAULT_CANCEL_GRACE, DEFAULT_LOCK_TTL, DEFAULT_TIMEOUT, ExecSettings, MIN_TIMEOUT,
};
pub use local::{LocalLogSource, LocalShellExecutor};
pub use logs::{LOG_FETCH_LIMIT, LogFetcher, LogRequest, LogSource, LogStreamRequest};
pub use request::{ExecRequest, ExecResult, SHELL, StreamRequest};
pub use stream::{StreamExecutor, StreamFuture, StreamIo};
