// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::cache::{DEFAULT_SWEEP_INTERVAL, DEFAULT_TTL};
use crate::exec::{
    DEFAULT_CANCEL_GRACE, DEFAULT_LOCK_TTL, DEFAULT_TIMEOUT, ExecSettings, LOG_FETCH_LIMIT,
    MIN_TIMEOUT,
};
use crate::types::{LogFormat, LogLevel};

use super::duration;

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [executor]
/// default_timeout = "10s"
/// min_timeout = "1ms"
/// cancel_grace = "25ms"
/// # lock_wait_timeout = "30s"
///
/// [locks]
/// ttl = "10s"
/// sweep_interval = "150s"
///
/// [cache]
/// default_ttl = "5m"
/// sweep_interval = "150s"
///
/// [logs]
/// dir = "logs"
/// limit = "1m"
///
/// [logging]
/// level = "info"
/// format = "dev"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub executor: ExecutorSection,

    #[serde(default)]
    pub locks: LocksSection,

    #[serde(default)]
    pub cache: CacheSection,

    #[serde(default)]
    pub logs: LogsSection,

    #[serde(default)]
    pub logging: LoggingSection,
}

/// Validated configuration.
///
/// Only obtainable through `ConfigFile::try_from(RawConfigFile)` (see
/// [`super::validate`]) or [`ConfigFile::default`].
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    pub executor: ExecutorSection,
    pub locks: LocksSection,
    pub cache: CacheSection,
    pub logs: LogsSection,
    pub logging: LoggingSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            executor: raw.executor,
            locks: raw.locks,
            cache: raw.cache,
            logs: raw.logs,
            logging: raw.logging,
        }
    }

    /// Coordinator settings derived from `[executor]` and `[locks]`.
    pub fn exec_settings(&self) -> ExecSettings {
        ExecSettings {
            default_timeout: self.executor.default_timeout,
            min_timeout: self.executor.min_timeout,
            cancel_grace: self.executor.cancel_grace,
            lock_wait_timeout: self.executor.lock_wait_timeout,
            lock_ttl: self.locks.ttl,
            lock_sweep_interval: self.locks.sweep_interval,
        }
    }
}

/// `[executor]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorSection {
    /// Timeout used when a request asks for less than `min_timeout`
    /// (including zero).
    #[serde(default = "default_timeout", deserialize_with = "duration::deserialize")]
    pub default_timeout: Duration,

    #[serde(default = "min_timeout", deserialize_with = "duration::deserialize")]
    pub min_timeout: Duration,

    /// How long a timed-out or cancelled call still listens for the worker's
    /// own report before returning.
    #[serde(default = "cancel_grace", deserialize_with = "duration::deserialize")]
    pub cancel_grace: Duration,

    /// Upper bound on waiting for a busy target. Unbounded when absent.
    #[serde(default, deserialize_with = "duration::deserialize_option")]
    pub lock_wait_timeout: Option<Duration>,
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

fn min_timeout() -> Duration {
    MIN_TIMEOUT
}

fn cancel_grace() -> Duration {
    DEFAULT_CANCEL_GRACE
}

impl Default for ExecutorSection {
    fn default() -> Self {
        Self {
            default_timeout: default_timeout(),
            min_timeout: min_timeout(),
            cancel_grace: cancel_grace(),
            lock_wait_timeout: None,
        }
    }
}

/// `[locks]` section: per-target lock registry.
#[derive(Debug, Clone, Deserialize)]
pub struct LocksSection {
    /// Idle time after which an unused target lock may be reclaimed.
    #[serde(default = "lock_ttl", deserialize_with = "duration::deserialize")]
    pub ttl: Duration,

    #[serde(default = "sweep_interval", deserialize_with = "duration::deserialize")]
    pub sweep_interval: Duration,
}

fn lock_ttl() -> Duration {
    DEFAULT_LOCK_TTL
}

fn sweep_interval() -> Duration {
    DEFAULT_SWEEP_INTERVAL
}

impl Default for LocksSection {
    fn default() -> Self {
        Self {
            ttl: lock_ttl(),
            sweep_interval: sweep_interval(),
        }
    }
}

/// `[cache]` section: the general memoization cache.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    #[serde(default = "cache_ttl", deserialize_with = "duration::deserialize")]
    pub default_ttl: Duration,

    #[serde(default = "sweep_interval", deserialize_with = "duration::deserialize")]
    pub sweep_interval: Duration,
}

fn cache_ttl() -> Duration {
    DEFAULT_TTL
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            default_ttl: cache_ttl(),
            sweep_interval: sweep_interval(),
        }
    }
}

/// `[logs]` section: container log fetching.
#[derive(Debug, Clone, Deserialize)]
pub struct LogsSection {
    /// Root of the `<namespace>/<pod>/<container>.log` tree served locally.
    #[serde(default = "logs_dir")]
    pub dir: PathBuf,

    /// Upper bound on a single fetch.
    #[serde(default = "logs_limit", deserialize_with = "duration::deserialize")]
    pub limit: Duration,
}

fn logs_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn logs_limit() -> Duration {
    LOG_FETCH_LIMIT
}

impl Default for LogsSection {
    fn default() -> Self {
        Self {
            dir: logs_dir(),
            limit: logs_limit(),
        }
    }
}

/// `[logging]` section. CLI flags and `PODEXEC_LOG` take precedence.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingSection {
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,
}
