// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clap::Parser;

use crate::config::parse_duration;
use crate::target::TargetIdentity;
use crate::types::{LogFormat, LogLevel};

/// Command-line arguments for `podexec`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "podexec",
    version,
    about = "Run a command against a target, one command per target at a time.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Podexec.toml` in the current working directory if it exists,
    /// otherwise built-in defaults.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Target to run against.
    #[arg(long, value_name = "NAMESPACE/POD/CONTAINER")]
    pub target: TargetIdentity,

    /// Execution timeout, e.g. `500ms`, `10s`, `2m`.
    ///
    /// Values below the configured minimum fall back to the default timeout.
    #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PODEXEC_LOG`, then `[logging].level` is used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Log output style; overrides `[logging].format`.
    #[arg(long, value_enum, value_name = "FORMAT")]
    pub log_format: Option<LogFormat>,

    /// Resolve target, settings and argv, print them, but don't execute.
    #[arg(long)]
    pub dry_run: bool,

    /// Print the target container's logs instead of running a command.
    #[arg(long, conflicts_with = "command")]
    pub logs: bool,

    /// With `--logs`: only logs written within this window, e.g. `10m`.
    #[arg(long, value_name = "DURATION", value_parser = parse_duration, requires = "logs")]
    pub since: Option<Duration>,

    /// Command to run, passed to `/bin/sh -c`.
    #[arg(
        trailing_var_arg = true,
        allow_hyphen_values = true,
        required_unless_present = "logs",
        value_name = "COMMAND"
    )]
    pub command: Vec<String>,
}

impl CliArgs {
    pub fn command_line(&self) -> String {
        self.command.join(" ")
    }

    /// Start of the `--since` window, measured from now.
    pub fn logs_since(&self) -> Option<SystemTime> {
        self.since
            .map(|window| SystemTime::now().checked_sub(window).unwrap_or(UNIX_EPOCH))
    }
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
