#![allow(dead_code)]

use std::time::Duration;

use podexec::exec::ExecSettings;
use podexec::TargetIdentity;

pub use podexec_test_utils::{init_tracing, with_timeout};

pub fn target(pod: &str) -> TargetIdentity {
    TargetIdentity::new("default", pod, "app")
}

/// Defaults with a grace period long enough to be reliable under CI load.
pub fn settings() -> ExecSettings {
    ExecSettings {
        cancel_grace: Duration::from_millis(100),
        ..ExecSettings::default()
    }
}
