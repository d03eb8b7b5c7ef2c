// src/errors.rs

//! Crate-wide error types.
//!
//! - [`PodexecError`] covers configuration loading and other setup failures.
//! - [`ExecError`] is what a command execution ends with. It is always returned
//!   as a value inside an [`ExecResult`](crate::exec::ExecResult), next to the
//!   output captured so far.
//! - [`StreamError`] is reported by a [`StreamExecutor`](crate::exec::StreamExecutor)
//!   when the remote stream itself fails.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PodexecError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, PodexecError>;

/// Terminal failure reported by a stream executor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// The executor for the remote command could not be created.
    #[error("error while creating executor: {0}")]
    Open(String),

    #[error("transport error: {0}")]
    Transport(String),

    /// The remote command ran and exited non-zero.
    #[error("command exited with code {code}")]
    Exit { code: i32 },

    /// The stream stopped because its cancellation token fired.
    #[error("stream aborted")]
    Aborted,
}

/// Coarse classification of an [`ExecError`].
///
/// Retry logic should branch on this rather than on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    LockAcquisitionTimeout,
    ExecutionTimeout,
    CallerCancelled,
    StreamFailure,
    AggregateFailure,
}

#[derive(Error, Debug, Clone)]
pub enum ExecError {
    /// Malformed target identity. Returned before any lock is taken.
    #[error("invalid target: {0}")]
    Validation(String),

    /// Only produced when a bounded lock wait is configured.
    #[error("timed out after {waited:?} waiting for lock '{key}'")]
    LockAcquisitionTimeout { key: String, waited: Duration },

    #[error("command '{command}' timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("command '{command}' cancelled by caller")]
    Cancelled { command: String },

    #[error("error in stream for command '{command}': {source}")]
    Stream { command: String, source: StreamError },

    #[error("{}", AggregateDisplay(.0))]
    Aggregate(Vec<ExecError>),
}

impl ExecError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExecError::Validation(_) => ErrorKind::Validation,
            ExecError::LockAcquisitionTimeout { .. } => ErrorKind::LockAcquisitionTimeout,
            ExecError::Timeout { .. } => ErrorKind::ExecutionTimeout,
            ExecError::Cancelled { .. } => ErrorKind::CallerCancelled,
            ExecError::Stream { .. } => ErrorKind::StreamFailure,
            ExecError::Aggregate(_) => ErrorKind::AggregateFailure,
        }
    }

    /// True if this error is of `kind` or aggregates an error of `kind`.
    pub fn contains(&self, kind: ErrorKind) -> bool {
        if self.kind() == kind {
            return true;
        }
        match self {
            ExecError::Aggregate(errors) => errors.iter().any(|e| e.contains(kind)),
            _ => false,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.contains(ErrorKind::ExecutionTimeout)
    }

    pub fn is_cancelled(&self) -> bool {
        self.contains(ErrorKind::CallerCancelled)
    }

    /// Combine several errors into one.
    ///
    /// Nested aggregates are flattened. Returns `None` for an empty list and the
    /// error itself for a single-element list.
    pub fn aggregate(errors: impl IntoIterator<Item = ExecError>) -> Option<ExecError> {
        let mut flat = Vec::new();
        for err in errors {
            match err {
                ExecError::Aggregate(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => None,
            1 => flat.pop(),
            _ => Some(ExecError::Aggregate(flat)),
        }
    }
}

struct AggregateDisplay<'a>(&'a [ExecError]);

impl fmt::Display for AggregateDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} errors occurred:", self.0.len())?;
        for err in self.0 {
            write!(f, "\n\t* {err}")?;
        }
        Ok(())
    }
}
