// src/lib.rs

pub mod cache;
pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod locks;
pub mod logging;
pub mod target;
pub mod types;

use std::io::Write;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cache::spawn_sweeper;
use crate::cli::CliArgs;
use crate::config::ConfigFile;
use crate::exec::{
    Coordinator, ExecRequest, LocalLogSource, LocalShellExecutor, LogFetcher, LogRequest,
};

pub use crate::cache::ExpiringCache;
pub use crate::errors::{ErrorKind, ExecError, StreamError};
pub use crate::exec::ExecResult;
pub use crate::locks::{NamedLock, NamedLockGuard, NamedLockRegistry};
pub use crate::target::TargetIdentity;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - the coordinator with the local shell executor, or the log fetcher with
///   the local log source for `--logs`
/// - the lock registry and global cache sweepers
/// - Ctrl-C handling (cancels the running command or log fetch)
pub async fn run(args: CliArgs, cfg: ConfigFile) -> Result<()> {
    let settings = cfg.exec_settings();
    let command = args.command_line();
    let timeout = settings.effective_timeout(args.timeout.unwrap_or_default());

    if args.dry_run {
        print_dry_run(&args, &cfg);
        return Ok(());
    }

    if args.logs {
        return run_logs(&args, &cfg).await;
    }

    let coordinator = Coordinator::new(LocalShellExecutor::new(), settings);
    let _lock_sweeper = spawn_sweeper(coordinator.locks(), cfg.locks.sweep_interval);
    let cache = ExpiringCache::init_global(&cfg.cache);
    let _cache_sweeper = spawn_sweeper(cache, cfg.cache.sweep_interval);

    let request = ExecRequest::new(args.target.clone(), command)
        .with_timeout(timeout)
        .with_cancel(cancel_on_ctrl_c());
    let result = coordinator.execute(request).await;

    print_output(&result)?;

    match result.error {
        None => {
            debug!("command completed");
            Ok(())
        }
        Some(err) => Err(err.into()),
    }
}

async fn run_logs(args: &CliArgs, cfg: &ConfigFile) -> Result<()> {
    let fetcher = LogFetcher::new(LocalLogSource::new(&cfg.logs.dir)).with_limit(cfg.logs.limit);

    let mut request = LogRequest::new(args.target.clone()).with_cancel(cancel_on_ctrl_c());
    request.since = args.logs_since();
    let result = fetcher.fetch(request).await;

    print_output(&result)?;

    match result.error {
        None => {
            debug!("log fetch completed");
            Ok(())
        }
        Some(err) => Err(err.into()),
    }
}

/// Token cancelled on Ctrl-C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            eprintln!("failed to listen for Ctrl+C: {e}");
            return;
        }
        info!("Ctrl+C received; cancelling");
        trigger.cancel();
    });
    cancel
}

fn print_output(result: &ExecResult) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(result.stdout.as_bytes())?;
    stdout.flush()?;

    let mut stderr = std::io::stderr().lock();
    stderr.write_all(result.stderr.as_bytes())?;
    stderr.flush()?;
    Ok(())
}

/// Simple dry-run output: target, lock key, argv and effective settings.
fn print_dry_run(args: &CliArgs, cfg: &ConfigFile) {
    let settings = cfg.exec_settings();
    let request = ExecRequest::new(args.target.clone(), args.command_line());

    println!("podexec dry-run");
    println!("  target = {}", args.target);
    if args.logs {
        let source = LocalLogSource::new(&cfg.logs.dir);
        println!("  mode = logs");
        println!("  since = {:?}", args.since);
        println!("  limit = {:?}", cfg.logs.limit);
        println!("  dir = {}", source.root().display());
        debug!("dry-run complete (no log fetch)");
        return;
    }
    println!("  lock key = {}", args.target.lock_key());
    println!("  argv = {:?}", request.argv());
    println!(
        "  timeout = {:?}",
        settings.effective_timeout(args.timeout.unwrap_or_default())
    );
    println!();

    println!("settings:");
    println!("  executor.default_timeout = {:?}", settings.default_timeout);
    println!("  executor.min_timeout = {:?}", settings.min_timeout);
    println!("  executor.cancel_grace = {:?}", settings.cancel_grace);
    match settings.lock_wait_timeout {
        Some(limit) => println!("  executor.lock_wait_timeout = {limit:?}"),
        None => println!("  executor.lock_wait_timeout = unbounded"),
    }
    println!("  locks.ttl = {:?}", cfg.locks.ttl);
    println!("  locks.sweep_interval = {:?}", cfg.locks.sweep_interval);
    println!("  cache.default_ttl = {:?}", cfg.cache.default_ttl);
    println!("  cache.sweep_interval = {:?}", cfg.cache.sweep_interval);

    debug!("dry-run complete (no execution)");
}
