// src/exec/request.rs

use std::fmt;
use std::time::Duration;

use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;

use crate::errors::ExecError;
use crate::target::TargetIdentity;

use super::capture::LiveSink;

/// Shell every command is wrapped in on the remote side.
pub const SHELL: [&str; 2] = ["/bin/sh", "-c"];

/// One request to run `command` against `target`.
///
/// A zero (or otherwise sub-minimum) `timeout` means "use the default".
pub struct ExecRequest {
    pub target: TargetIdentity,
    pub command: String,
    pub timeout: Duration,
    /// Caller-owned cancellation. The execution deadline is layered on top of it.
    pub cancel: CancellationToken,
    pub stdin: Option<Box<dyn AsyncRead + Send + Unpin>>,
    pub stdout_sink: Option<LiveSink>,
    pub stderr_sink: Option<LiveSink>,
}

impl fmt::Debug for ExecRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecRequest")
            .field("target", &self.target)
            .field("command", &self.command)
            .field("timeout", &self.timeout)
            .field("cancelled", &self.cancel.is_cancelled())
            .field("stdin", &self.stdin.is_some())
            .finish_non_exhaustive()
    }
}

impl ExecRequest {
    pub fn new(target: TargetIdentity, command: impl Into<String>) -> Self {
        Self {
            target,
            command: command.into(),
            timeout: Duration::ZERO,
            cancel: CancellationToken::new(),
            stdin: None,
            stdout_sink: None,
            stderr_sink: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_stdin(mut self, stdin: impl AsyncRead + Send + Unpin + 'static) -> Self {
        self.stdin = Some(Box::new(stdin));
        self
    }

    pub fn with_stdout_sink(mut self, sink: LiveSink) -> Self {
        self.stdout_sink = Some(sink);
        self
    }

    pub fn with_stderr_sink(mut self, sink: LiveSink) -> Self {
        self.stderr_sink = Some(sink);
        self
    }

    /// `["/bin/sh", "-c", command]`.
    pub fn argv(&self) -> Vec<String> {
        shell_argv(&self.command)
    }
}

pub(crate) fn shell_argv(command: &str) -> Vec<String> {
    SHELL
        .iter()
        .map(|s| s.to_string())
        .chain(std::iter::once(command.to_string()))
        .collect()
}

/// What the stream executor is asked to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    pub target: TargetIdentity,
    pub argv: Vec<String>,
    pub stdin_attached: bool,
}

impl StreamRequest {
    /// The user's command, i.e. the last argv element.
    pub fn command(&self) -> &str {
        self.argv.last().map(String::as_str).unwrap_or_default()
    }
}

/// Output of an execution plus how it ended.
///
/// `stdout`/`stderr` hold whatever was captured, even when `error` is set.
#[derive(Debug, Clone, Default)]
pub struct ExecResult {
    pub stdout: String,
    pub stderr: String,
    pub error: Option<ExecError>,
}

impl ExecResult {
    pub fn failed(error: ExecError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Stdout on success. Partial output is dropped on error; use the fields
    /// directly to keep it.
    pub fn into_result(self) -> Result<String, ExecError> {
        match self.error {
            None => Ok(self.stdout),
            Some(err) => Err(err),
        }
    }
}
