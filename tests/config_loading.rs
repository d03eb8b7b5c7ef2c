// tests/config_loading.rs

use std::io::Write;
use std::time::Duration;

use tempfile::NamedTempFile;

use podexec::config::{ConfigFile, load_and_validate, load_or_default, parse_duration};
use podexec::errors::PodexecError;
use podexec::logging::resolve_level;
use podexec::types::{LogFormat, LogLevel};

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn test_full_config_is_parsed() {
    let file = write_config(
        r#"
[executor]
default_timeout = "30s"
min_timeout = "10ms"
cancel_grace = "50ms"
lock_wait_timeout = "2m"

[locks]
ttl = "20s"
sweep_interval = "1m"

[cache]
default_ttl = "1h"
sweep_interval = "90s"

[logs]
dir = "/var/log/pods"
limit = "30s"

[logging]
level = "debug"
format = "prod"
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();

    assert_eq!(cfg.executor.default_timeout, Duration::from_secs(30));
    assert_eq!(cfg.executor.min_timeout, Duration::from_millis(10));
    assert_eq!(cfg.executor.cancel_grace, Duration::from_millis(50));
    assert_eq!(cfg.executor.lock_wait_timeout, Some(Duration::from_secs(120)));
    assert_eq!(cfg.locks.ttl, Duration::from_secs(20));
    assert_eq!(cfg.locks.sweep_interval, Duration::from_secs(60));
    assert_eq!(cfg.cache.default_ttl, Duration::from_secs(3600));
    assert_eq!(cfg.cache.sweep_interval, Duration::from_secs(90));
    assert_eq!(cfg.logs.dir, std::path::PathBuf::from("/var/log/pods"));
    assert_eq!(cfg.logs.limit, Duration::from_secs(30));
    assert_eq!(cfg.logging.level, LogLevel::Debug);
    assert_eq!(cfg.logging.format, LogFormat::Prod);

    let settings = cfg.exec_settings();
    assert_eq!(settings.default_timeout, Duration::from_secs(30));
    assert_eq!(settings.lock_ttl, Duration::from_secs(20));
    assert_eq!(settings.lock_wait_timeout, Some(Duration::from_secs(120)));
}

#[test]
fn test_empty_config_uses_defaults() {
    let file = write_config("");
    let cfg = load_and_validate(file.path()).unwrap();

    assert_eq!(cfg.executor.default_timeout, Duration::from_secs(10));
    assert_eq!(cfg.executor.min_timeout, Duration::from_millis(1));
    assert_eq!(cfg.executor.cancel_grace, Duration::from_millis(25));
    assert_eq!(cfg.executor.lock_wait_timeout, None);
    assert_eq!(cfg.locks.ttl, Duration::from_secs(10));
    assert_eq!(cfg.locks.sweep_interval, Duration::from_secs(150));
    assert_eq!(cfg.cache.default_ttl, Duration::from_secs(300));
    assert_eq!(cfg.cache.sweep_interval, Duration::from_secs(150));
    assert_eq!(cfg.logs.dir, std::path::PathBuf::from("logs"));
    assert_eq!(cfg.logs.limit, Duration::from_secs(60));
    assert_eq!(cfg.logging.level, LogLevel::Info);
    assert_eq!(cfg.logging.format, LogFormat::Dev);

    assert_eq!(cfg.exec_settings(), ConfigFile::default().exec_settings());
}

#[test]
fn test_logging_enums_default_to_info_and_dev() {
    assert_eq!(LogLevel::default(), LogLevel::Info);
    assert_eq!(LogFormat::default(), LogFormat::Dev);
    assert_eq!("WARNING".parse::<LogLevel>(), Ok(LogLevel::Warn));
    assert_eq!("prod".parse::<LogFormat>(), Ok(LogFormat::Prod));
}

#[test]
fn test_explicit_missing_path_is_io_error() {
    let result = load_or_default(Some(std::path::Path::new(
        "/definitely/not/here/Podexec.toml",
    )));
    match result {
        Err(PodexecError::IoError(_)) => {}
        other => panic!("Expected IoError, got: {:?}", other),
    }
}

#[test]
fn test_invalid_duration_is_toml_error() {
    let file = write_config(
        r#"
[executor]
default_timeout = "ten seconds"
"#,
    );

    match load_and_validate(file.path()) {
        Err(PodexecError::TomlError(e)) => {
            assert!(e.to_string().contains("duration"), "{e}");
        }
        other => panic!("Expected TomlError, got: {:?}", other),
    }
}

#[test]
fn test_zero_sweep_interval_is_rejected() {
    let file = write_config(
        r#"
[cache]
sweep_interval = "0s"
"#,
    );

    match load_and_validate(file.path()) {
        Err(PodexecError::ConfigError(msg)) => {
            assert!(msg.contains("[cache].sweep_interval"), "{msg}");
        }
        other => panic!("Expected ConfigError, got: {:?}", other),
    }
}

#[test]
fn test_default_timeout_below_minimum_is_rejected() {
    let file = write_config(
        r#"
[executor]
default_timeout = "5ms"
min_timeout = "1s"
"#,
    );

    match load_and_validate(file.path()) {
        Err(PodexecError::ConfigError(msg)) => {
            assert!(msg.contains("default_timeout"), "{msg}");
        }
        other => panic!("Expected ConfigError, got: {:?}", other),
    }
}

#[test]
fn test_zero_lock_wait_timeout_is_rejected() {
    let file = write_config(
        r#"
[executor]
lock_wait_timeout = "0ms"
"#,
    );

    assert!(matches!(
        load_and_validate(file.path()),
        Err(PodexecError::ConfigError(_))
    ));
}

#[test]
fn test_unknown_log_level_is_rejected() {
    let file = write_config(
        r#"
[logging]
level = "loud"
"#,
    );

    assert!(matches!(
        load_and_validate(file.path()),
        Err(PodexecError::TomlError(_))
    ));
}

#[test]
fn test_parse_duration_units() {
    assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
    assert_eq!(parse_duration("10s"), Ok(Duration::from_secs(10)));
    assert_eq!(parse_duration(" 5m "), Ok(Duration::from_secs(300)));
    assert_eq!(parse_duration("2h"), Ok(Duration::from_secs(7200)));
    assert_eq!(parse_duration("3S"), Ok(Duration::from_secs(3)));

    assert!(parse_duration("").is_err());
    assert!(parse_duration("10").is_err());
    assert!(parse_duration("s").is_err());
    assert!(parse_duration("10d").is_err());
}

#[test]
fn test_parse_duration_rejects_overflow() {
    let err = parse_duration("6000000000000000h").unwrap_err();
    assert!(err.contains("too large"), "{err}");
    assert!(parse_duration("400000000000000000m").is_err());

    // Largest values that still fit are accepted.
    assert_eq!(
        parse_duration(&format!("{}s", u64::MAX)),
        Ok(Duration::from_secs(u64::MAX))
    );
    assert_eq!(
        parse_duration(&format!("{}h", u64::MAX / 3600)),
        Ok(Duration::from_secs(u64::MAX / 3600 * 3600))
    );
}

#[test]
fn test_oversized_duration_in_config_is_toml_error() {
    let file = write_config(
        r#"
[executor]
default_timeout = "6000000000000000h"
"#,
    );

    match load_and_validate(file.path()) {
        Err(PodexecError::TomlError(e)) => {
            assert!(e.to_string().contains("too large"), "{e}");
        }
        other => panic!("Expected TomlError, got: {:?}", other),
    }
}

#[test]
fn test_log_level_precedence() {
    // Flag wins over everything.
    assert_eq!(
        resolve_level(Some(LogLevel::Trace), Some("warn"), LogLevel::Error),
        LogLevel::Trace
    );
    // Then the environment.
    assert_eq!(
        resolve_level(None, Some("debug"), LogLevel::Error),
        LogLevel::Debug
    );
    // Garbage in the environment falls through to the config.
    assert_eq!(
        resolve_level(None, Some("chatty"), LogLevel::Warn),
        LogLevel::Warn
    );
    assert_eq!(resolve_level(None, None, LogLevel::Info), LogLevel::Info);
}
