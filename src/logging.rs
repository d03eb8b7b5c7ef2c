// src/logging.rs

//! Logging setup for `podexec` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the log level:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `PODEXEC_LOG` environment variable (e.g. "info", "debug")
//! 3. `[logging].level` from the config file (default `info`)
//!
//! Logs are sent to STDERR so that the command's stdout can be piped.

use anyhow::Result;
use tracing_subscriber::fmt;

use crate::types::{LogFormat, LogLevel};

/// Initialise global logging subscriber.
///
/// Safe to call once at startup.
pub fn init_logging(
    cli_level: Option<LogLevel>,
    config_level: LogLevel,
    format: LogFormat,
) -> Result<()> {
    let level = level_from_log_level(resolve_level(
        cli_level,
        std::env::var("PODEXEC_LOG").ok().as_deref(),
        config_level,
    ));

    match format {
        LogFormat::Dev => fmt()
            .with_max_level(level)
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Prod => fmt()
            .with_max_level(level)
            .with_ansi(false)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init(),
    }

    Ok(())
}

/// Apply the flag > env > config precedence. Unparseable env values are ignored.
pub fn resolve_level(
    cli_level: Option<LogLevel>,
    env_value: Option<&str>,
    config_level: LogLevel,
) -> LogLevel {
    cli_level
        .or_else(|| env_value.and_then(|s| s.parse().ok()))
        .unwrap_or(config_level)
}

fn level_from_log_level(lvl: LogLevel) -> tracing::Level {
    match lvl {
        LogLevel::Error => tracing::Level::ERROR,
        LogLevel::Warn => tracing::Level::WARN,
        LogLevel::Info => tracing::Level::INFO,
        LogLevel::Debug => tracing::Level::DEBUG,
        LogLevel::Trace => tracing::Level::TRACE,
    }
}
