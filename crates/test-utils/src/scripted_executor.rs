use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use tokio::io::AsyncReadExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use podexec::StreamError;
use podexec::exec::{
    LogSource, LogStreamRequest, OutputSink, StreamExecutor, StreamFuture, StreamIo, StreamRequest,
};

/// One thing a scripted stream does.
#[derive(Debug, Clone)]
pub enum Step {
    Stdout(String),
    Stderr(String),
    /// Sleep, but stop with `StreamError::Aborted` if cancelled.
    Sleep(Duration),
    /// Sleep without looking at the cancellation token.
    SleepIgnoringCancel(Duration),
    /// Wait for cancellation, then stop with `StreamError::Aborted`.
    HangUntilCancelled,
    /// Wait for cancellation, then fail with the given error.
    FailOnCancel(StreamError),
    Fail(StreamError),
    /// Copy all of stdin to stdout.
    EchoStdin,
}

/// Command recorded for log fetches.
pub const LOGS_COMMAND: &str = "<logs>";

/// What one call to the executor looked like.
#[derive(Debug, Clone)]
pub struct CallRecord {
    pub key: String,
    /// The command, or [`LOGS_COMMAND`] for a log fetch.
    pub command: String,
    pub stdin_attached: bool,
    /// Only set for log fetches.
    pub since: Option<SystemTime>,
    pub started: Instant,
    pub finished: Option<Instant>,
}

impl CallRecord {
    /// Whether the running intervals of two calls overlap.
    pub fn overlaps(&self, other: &CallRecord) -> bool {
        let self_end = self.finished.unwrap_or_else(Instant::now);
        let other_end = other.finished.unwrap_or_else(Instant::now);
        self.started < other_end && other.started < self_end
    }
}

/// A fake stream executor and log source that:
/// - plays a script of [`Step`]s per command (or a default script)
/// - plays the log script for log fetches, writing `Stdout` steps as logs
/// - records when every call started and finished.
#[derive(Debug, Clone, Default)]
pub struct ScriptedExecutor {
    default_script: Vec<Step>,
    scripts: HashMap<String, Vec<Step>>,
    log_script: Vec<Step>,
    calls: Arc<Mutex<Vec<CallRecord>>>,
}

impl ScriptedExecutor {
    pub fn new(default_script: Vec<Step>) -> Self {
        Self {
            default_script,
            ..Self::default()
        }
    }

    /// Use `script` whenever the command is exactly `command`.
    pub fn with_script(mut self, command: &str, script: Vec<Step>) -> Self {
        self.scripts.insert(command.to_string(), script);
        self
    }

    /// Use `script` for every log fetch.
    pub fn with_log_script(mut self, script: Vec<Step>) -> Self {
        self.log_script = script;
        self
    }

    pub fn calls(&self) -> Vec<CallRecord> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, command: &str) -> Vec<CallRecord> {
        self.calls()
            .into_iter()
            .filter(|c| c.command == command)
            .collect()
    }

    fn script_for(&self, command: &str) -> Vec<Step> {
        self.scripts
            .get(command)
            .cloned()
            .unwrap_or_else(|| self.default_script.clone())
    }
}

impl StreamExecutor for ScriptedExecutor {
    fn stream(
        &self,
        request: StreamRequest,
        io: StreamIo,
        cancel: CancellationToken,
    ) -> StreamFuture<'_> {
        let script = self.script_for(request.command());
        let calls = Arc::clone(&self.calls);

        let record = CallRecord {
            key: request.target.lock_key(),
            command: request.command().to_string(),
            stdin_attached: request.stdin_attached,
            since: None,
            started: Instant::now(),
            finished: None,
        };

        Box::pin(recorded(calls, record, play(script, io, cancel)))
    }
}

impl LogSource for ScriptedExecutor {
    fn logs(
        &self,
        request: LogStreamRequest,
        sink: OutputSink,
        cancel: CancellationToken,
    ) -> StreamFuture<'_> {
        let script = self.log_script.clone();
        let calls = Arc::clone(&self.calls);
        let record = CallRecord {
            key: request.target.lock_key(),
            command: LOGS_COMMAND.to_string(),
            stdin_attached: false,
            since: request.since,
            started: Instant::now(),
            finished: None,
        };
        let io = StreamIo {
            stdin: None,
            stdout: sink,
            stderr: OutputSink::detached(),
        };

        Box::pin(recorded(calls, record, play(script, io, cancel)))
    }
}

/// Run `call`, recording its start and finish in `calls`.
async fn recorded<F>(
    calls: Arc<Mutex<Vec<CallRecord>>>,
    mut record: CallRecord,
    call: F,
) -> Result<(), StreamError>
where
    F: std::future::Future<Output = Result<(), StreamError>>,
{
    let index = {
        let mut guard = calls.lock().unwrap();
        record.started = Instant::now();
        guard.push(record);
        guard.len() - 1
    };

    let outcome = call.await;

    calls.lock().unwrap()[index].finished = Some(Instant::now());
    outcome
}

async fn play(
    script: Vec<Step>,
    mut io: StreamIo,
    cancel: CancellationToken,
) -> Result<(), StreamError> {
    for step in script {
        match step {
            Step::Stdout(s) => io.stdout.write_str(&s),
            Step::Stderr(s) => io.stderr.write_str(&s),
            Step::Sleep(d) => {
                tokio::select! {
                    _ = tokio::time::sleep(d) => {}
                    _ = cancel.cancelled() => return Err(StreamError::Aborted),
                }
            }
            Step::SleepIgnoringCancel(d) => tokio::time::sleep(d).await,
            Step::HangUntilCancelled => {
                cancel.cancelled().await;
                return Err(StreamError::Aborted);
            }
            Step::FailOnCancel(err) => {
                cancel.cancelled().await;
                return Err(err);
            }
            Step::Fail(err) => return Err(err),
            Step::EchoStdin => {
                if let Some(stdin) = io.stdin.as_mut() {
                    let mut buf = Vec::new();
                    stdin
                        .read_to_end(&mut buf)
                        .await
                        .map_err(|e| StreamError::Transport(e.to_string()))?;
                    io.stdout.write(&buf);
                }
            }
        }
    }
    Ok(())
}
