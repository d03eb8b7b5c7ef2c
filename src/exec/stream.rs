// src/exec/stream.rs

//! Pluggable stream executor abstraction.
//!
//! The coordinator never talks to a transport directly. It hands a
//! [`StreamRequest`] and a [`StreamIo`] to a `StreamExecutor`, which opens the
//! remote command channel, writes output into the sinks as it arrives and
//! resolves once the command has finished or the stream has failed.
//!
//! - [`LocalShellExecutor`](super::local::LocalShellExecutor) runs commands on
//!   the local host and is what the `podexec` binary uses.
//! - Tests provide scripted executors that never spawn anything.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;

use crate::errors::StreamError;

use super::capture::OutputSink;
use super::request::StreamRequest;

pub type StreamFuture<'a> = Pin<Box<dyn Future<Output = Result<(), StreamError>> + Send + 'a>>;

/// Byte streams of a single execution.
pub struct StreamIo {
    pub stdin: Option<Box<dyn AsyncRead + Send + Unpin>>,
    pub stdout: OutputSink,
    pub stderr: OutputSink,
}

impl fmt::Debug for StreamIo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamIo")
            .field("stdin", &self.stdin.is_some())
            .field("stdout", &self.stdout)
            .field("stderr", &self.stderr)
            .finish()
    }
}

/// Opens a command stream against a remote target.
///
/// Cancellation is cooperative: once `cancel` fires, implementations should
/// abort the stream as soon as they can and return. Until the returned future
/// resolves the coordinator keeps the target locked.
pub trait StreamExecutor: Send + Sync {
    fn stream(
        &self,
        request: StreamRequest,
        io: StreamIo,
        cancel: CancellationToken,
    ) -> StreamFuture<'_>;
}

impl<E: StreamExecutor + ?Sized> StreamExecutor for Arc<E> {
    fn stream(
        &self,
        request: StreamRequest,
        io: StreamIo,
        cancel: CancellationToken,
    ) -> StreamFuture<'_> {
        (**self).stream(request, io, cancel)
    }
}
