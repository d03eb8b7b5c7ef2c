// tests/log_fetch.rs

mod common;
use crate::common::{init_tracing, target, with_timeout};

use std::fs;
use std::time::{Duration, SystemTime};

use tempfile::tempdir;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use podexec::exec::{LOG_FETCH_LIMIT, LocalLogSource, LogFetcher, LogRequest};
use podexec::{ErrorKind, ExecError, StreamError, TargetIdentity};
use podexec_test_utils::{LOGS_COMMAND, ScriptedExecutor, Step};

type TestResult = Result<(), Box<dyn std::error::Error>>;

#[tokio::test]
async fn test_fetch_returns_all_logs() -> TestResult {
    init_tracing();

    let source = ScriptedExecutor::default().with_log_script(vec![
        Step::Stdout("line 1\n".into()),
        Step::Stdout("line 2\n".into()),
    ]);
    let fetcher = LogFetcher::new(source.clone());
    assert_eq!(fetcher.limit(), LOG_FETCH_LIMIT);

    let logs = with_timeout(fetcher.fetch_logs(target("web"), None)).await?;
    assert_eq!(logs, "line 1\nline 2\n");

    let calls = source.calls_for(LOGS_COMMAND);
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].key, "default/web/app");
    assert_eq!(calls[0].since, None);
    Ok(())
}

#[tokio::test]
async fn test_since_is_passed_to_source() {
    init_tracing();

    let source = ScriptedExecutor::default().with_log_script(vec![]);
    let fetcher = LogFetcher::new(source.clone());
    let since = SystemTime::now() - Duration::from_secs(600);

    let result = with_timeout(fetcher.fetch(LogRequest::new(target("web")).with_since(since))).await;
    assert!(result.is_success());
    assert_eq!(source.calls()[0].since, Some(since));
}

#[tokio::test]
async fn test_cancel_returns_collected_logs_without_error() {
    init_tracing();

    let source = ScriptedExecutor::default().with_log_script(vec![
        Step::Stdout("before cancel\n".into()),
        Step::HangUntilCancelled,
    ]);
    let fetcher = LogFetcher::new(source);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        trigger.cancel();
    });

    let result = with_timeout(fetcher.fetch(LogRequest::new(target("web")).with_cancel(cancel))).await;

    assert!(result.is_success(), "unexpected error: {:?}", result.error);
    assert_eq!(result.stdout, "before cancel\n");
    assert_eq!(result.stderr, "");
}

#[tokio::test]
async fn test_limit_keeps_partial_logs_and_reports_timeout() {
    init_tracing();

    let source = ScriptedExecutor::default().with_log_script(vec![
        Step::Stdout("partial\n".into()),
        Step::HangUntilCancelled,
    ]);
    let fetcher = LogFetcher::new(source).with_limit(Duration::from_millis(50));

    let started = Instant::now();
    let result = with_timeout(fetcher.fetch(LogRequest::new(target("web")))).await;

    assert!(started.elapsed() >= Duration::from_millis(50));
    assert_eq!(result.stdout, "partial\n");
    match result.error {
        Some(ExecError::Timeout { timeout, command }) => {
            assert_eq!(timeout, Duration::from_millis(50));
            assert_eq!(command, "logs default/web/app");
        }
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[test]
fn test_zero_limit_falls_back_to_default() {
    let fetcher = LogFetcher::new(ScriptedExecutor::default()).with_limit(Duration::ZERO);
    assert_eq!(fetcher.limit(), LOG_FETCH_LIMIT);
}

#[tokio::test]
async fn test_source_failure_keeps_partial_logs() {
    init_tracing();

    let source = ScriptedExecutor::default().with_log_script(vec![
        Step::Stdout("got this far\n".into()),
        Step::Fail(StreamError::Transport("stream closed".into())),
    ]);
    let fetcher = LogFetcher::new(source);

    let result = with_timeout(fetcher.fetch(LogRequest::new(target("web")))).await;
    assert_eq!(result.stdout, "got this far\n");
    let err = result.error.expect("stream error");
    assert_eq!(err.kind(), ErrorKind::StreamFailure);
    assert!(err.to_string().contains("stream closed"));
}

#[tokio::test]
async fn test_invalid_target_never_reaches_source() {
    init_tracing();

    let source = ScriptedExecutor::default().with_log_script(vec![Step::Stdout("x".into())]);
    let fetcher = LogFetcher::new(source.clone());

    let err = with_timeout(fetcher.fetch_logs(TargetIdentity::new("ns", "", "c"), None))
        .await
        .expect_err("validation error");
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(source.calls().is_empty());
}

#[tokio::test]
async fn test_local_source_reads_log_file() -> TestResult {
    init_tracing();

    let dir = tempdir()?;
    let pod_dir = dir.path().join("default").join("web");
    fs::create_dir_all(&pod_dir)?;
    fs::write(pod_dir.join("app.log"), "started\nready\n")?;

    let fetcher = LogFetcher::new(LocalLogSource::new(dir.path()));
    let logs = with_timeout(fetcher.fetch_logs(target("web"), None)).await?;
    assert_eq!(logs, "started\nready\n");

    // Written just now, so a window reaching into the past includes it.
    let recent = SystemTime::now() - Duration::from_secs(3600);
    let logs = with_timeout(fetcher.fetch_logs(target("web"), Some(recent))).await?;
    assert_eq!(logs, "started\nready\n");
    Ok(())
}

#[tokio::test]
async fn test_local_source_skips_file_older_than_since() -> TestResult {
    init_tracing();

    let dir = tempdir()?;
    let pod_dir = dir.path().join("default").join("web");
    fs::create_dir_all(&pod_dir)?;
    fs::write(pod_dir.join("app.log"), "old news\n")?;

    let fetcher = LogFetcher::new(LocalLogSource::new(dir.path()));
    let future = SystemTime::now() + Duration::from_secs(3600);
    let logs = with_timeout(fetcher.fetch_logs(target("web"), Some(future))).await?;
    assert_eq!(logs, "");
    Ok(())
}

#[tokio::test]
async fn test_local_source_missing_file_is_open_error() -> TestResult {
    init_tracing();

    let dir = tempdir()?;
    let fetcher = LogFetcher::new(LocalLogSource::new(dir.path()));

    let result = with_timeout(fetcher.fetch(LogRequest::new(target("nope")))).await;
    match result.error {
        Some(ExecError::Stream {
            source: StreamError::Open(msg),
            ..
        }) => assert!(msg.contains("nope"), "{msg}"),
        other => panic!("expected open error, got {other:?}"),
    }
    Ok(())
}
