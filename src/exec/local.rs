// src/exec/local.rs

//! Stream executor and log source backed by the local host.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::SystemTime;

use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::StreamError;

use super::capture::OutputSink;
use super::logs::{LogSource, LogStreamRequest};
use super::request::StreamRequest;
use super::stream::{StreamExecutor, StreamFuture, StreamIo};

const READ_CHUNK_SIZE: usize = 8192;

/// Runs the request's argv as a local child process.
///
/// The target identity is only used for logging; every target maps to the
/// same host. The child is killed when the cancellation token fires.
#[derive(Debug, Clone, Default)]
pub struct LocalShellExecutor;

impl LocalShellExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl StreamExecutor for LocalShellExecutor {
    fn stream(
        &self,
        request: StreamRequest,
        io: StreamIo,
        cancel: CancellationToken,
    ) -> StreamFuture<'_> {
        Box::pin(run_local(request, io, cancel))
    }
}

async fn run_local(
    request: StreamRequest,
    io: StreamIo,
    cancel: CancellationToken,
) -> Result<(), StreamError> {
    let (program, args) = request
        .argv
        .split_first()
        .ok_or_else(|| StreamError::Open("empty argv".to_string()))?;

    info!(
        key = %request.target,
        command = %request.command(),
        "starting local process"
    );

    let StreamIo {
        stdin,
        stdout,
        stderr,
    } = io;

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .map_err(|e| StreamError::Open(format!("spawning '{program}': {e}")))?;

    if let (Some(mut child_stdin), Some(mut source)) = (child.stdin.take(), stdin) {
        tokio::spawn(async move {
            // The child may exit without reading everything; that is not our error.
            if let Err(e) = tokio::io::copy(&mut source, &mut child_stdin).await {
                debug!(error = %e, "stdin copy stopped early");
            }
        });
    }

    let pumps: Vec<JoinHandle<()>> = [
        child.stdout.take().map(|out| spawn_pump(out, stdout)),
        child.stderr.take().map(|err| spawn_pump(err, stderr)),
    ]
    .into_iter()
    .flatten()
    .collect();

    tokio::select! {
        status_res = child.wait() => {
            let status = status_res
                .map_err(|e| StreamError::Transport(format!("waiting for process: {e}")))?;

            // Let the pumps reach EOF so trailing output is captured. A
            // background grandchild can hold the pipes open, hence the token.
            tokio::select! {
                _ = drain_pumps(pumps) => {}
                _ = cancel.cancelled() => {
                    debug!("cancelled while draining output of exited process");
                }
            }

            let code = status.code().unwrap_or(-1);
            debug!(exit_code = code, success = status.success(), "local process exited");

            if status.success() {
                Ok(())
            } else {
                Err(StreamError::Exit { code })
            }
        }

        _ = cancel.cancelled() => {
            info!(key = %request.target, "cancellation requested; killing local process");
            if let Err(e) = child.kill().await {
                warn!(error = %e, "failed to kill child process on cancellation");
            }
            for pump in pumps {
                pump.abort();
            }
            Err(StreamError::Aborted)
        }
    }
}

fn spawn_pump<R>(reader: R, sink: OutputSink) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = pump(reader, &sink).await {
            debug!(error = %e, "output pump stopped");
        }
    })
}

async fn pump<R: AsyncRead + Unpin>(mut reader: R, sink: &OutputSink) -> std::io::Result<()> {
    let mut buf = vec![0u8; READ_CHUNK_SIZE];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        sink.write(&buf[..n]);
    }
}

async fn drain_pumps(pumps: Vec<JoinHandle<()>>) {
    for pump in pumps {
        let _ = pump.await;
    }
}

/// Serves container logs from files laid out as
/// `<root>/<namespace>/<pod>/<container>.log`.
///
/// Files carry no per-line timestamps, so `since` is applied to the whole
/// file: one last modified before `since` yields nothing.
#[derive(Debug, Clone)]
pub struct LocalLogSource {
    root: PathBuf,
}

impl LocalLogSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the logs of `request.target` are read from.
    pub fn log_path(&self, request: &LogStreamRequest) -> PathBuf {
        let target = &request.target;
        self.root
            .join(&target.namespace)
            .join(&target.pod)
            .join(format!("{}.log", target.container))
    }
}

impl LogSource for LocalLogSource {
    fn logs(
        &self,
        request: LogStreamRequest,
        sink: OutputSink,
        cancel: CancellationToken,
    ) -> StreamFuture<'_> {
        let path = self.log_path(&request);
        Box::pin(read_log_file(path, request.since, sink, cancel))
    }
}

async fn read_log_file(
    path: PathBuf,
    since: Option<SystemTime>,
    sink: OutputSink,
    cancel: CancellationToken,
) -> Result<(), StreamError> {
    let mut file = File::open(&path)
        .await
        .map_err(|e| StreamError::Open(format!("opening log file {}: {e}", path.display())))?;

    if let Some(since) = since {
        let modified = file
            .metadata()
            .await
            .and_then(|meta| meta.modified())
            .map_err(|e| StreamError::Transport(format!("reading {}: {e}", path.display())))?;
        if modified < since {
            debug!(path = %path.display(), "log file not written since requested time");
            return Ok(());
        }
    }

    let mut buf = vec![0u8; READ_CHUNK_SIZE];
    loop {
        let n = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(StreamError::Aborted),
            read = file.read(&mut buf) => {
                read.map_err(|e| StreamError::Transport(format!("reading {}: {e}", path.display())))?
            }
        };
        if n == 0 {
            return Ok(());
        }
        sink.write(&buf[..n]);
    }
}
