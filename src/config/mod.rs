// src/config/mod.rs

//! Configuration for the coordinator, lock registry, cache, log fetching and
//! logging.
//!
//! - [`model`] holds the serde types mirroring `Podexec.toml`.
//! - [`duration`] parses the `"250ms"` / `"10s"` / `"5m"` duration strings.
//! - [`loader`] reads a file from disk.
//! - [`validate`] turns a [`RawConfigFile`] into a checked [`ConfigFile`].

pub mod duration;
pub mod loader;
pub mod model;
pub mod validate;

pub use duration::parse_duration;
pub use loader::{default_config_path, load_and_validate, load_from_path, load_or_default};
pub use model::{
    CacheSection, ConfigFile, ExecutorSection, LocksSection, LoggingSection, LogsSection,
    RawConfigFile,
};
