// src/config/validate.rs

use std::time::Duration;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{PodexecError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::PodexecError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_executor(cfg)?;
    ensure_non_zero("[locks].ttl", cfg.locks.ttl)?;
    ensure_non_zero("[locks].sweep_interval", cfg.locks.sweep_interval)?;
    ensure_non_zero("[cache].default_ttl", cfg.cache.default_ttl)?;
    ensure_non_zero("[cache].sweep_interval", cfg.cache.sweep_interval)?;
    ensure_non_zero("[logs].limit", cfg.logs.limit)?;
    Ok(())
}

fn validate_executor(cfg: &RawConfigFile) -> Result<()> {
    let exec = &cfg.executor;

    ensure_non_zero("[executor].min_timeout", exec.min_timeout)?;

    // A default below the floor would itself be clamped, forever.
    if exec.default_timeout < exec.min_timeout {
        return Err(PodexecError::ConfigError(format!(
            "[executor].default_timeout ({:?}) must be >= min_timeout ({:?})",
            exec.default_timeout, exec.min_timeout
        )));
    }

    if let Some(limit) = exec.lock_wait_timeout {
        ensure_non_zero("[executor].lock_wait_timeout", limit)?;
    }

    Ok(())
}

fn ensure_non_zero(field: &str, value: Duration) -> Result<()> {
    if value.is_zero() {
        return Err(PodexecError::ConfigError(format!(
            "{field} must be greater than zero"
        )));
    }
    Ok(())
}
