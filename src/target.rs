// src/target.rs

//! Identity of the remote resource a command runs against.

use std::fmt;
use std::str::FromStr;

use crate::errors::ExecError;

/// A container inside a pod inside a namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetIdentity {
    pub namespace: String,
    pub pod: String,
    pub container: String,
}

impl TargetIdentity {
    pub fn new(
        namespace: impl Into<String>,
        pod: impl Into<String>,
        container: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            pod: pod.into(),
            container: container.into(),
        }
    }

    /// Check that every component is usable as part of a lock key.
    pub fn validate(&self) -> Result<(), ExecError> {
        for (field, value) in self.components() {
            if value.is_empty() {
                return Err(ExecError::Validation(format!("{field} must not be empty")));
            }
            if value.contains('/') {
                return Err(ExecError::Validation(format!(
                    "{field} '{value}' must not contain '/'"
                )));
            }
            if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
                return Err(ExecError::Validation(format!(
                    "{field} '{}' must not contain whitespace or control characters",
                    value.escape_debug()
                )));
            }
        }
        Ok(())
    }

    /// Key under which executions against this target are serialized:
    /// `namespace/pod/container`.
    pub fn lock_key(&self) -> String {
        format!("{}/{}/{}", self.namespace, self.pod, self.container)
    }

    fn components(&self) -> [(&'static str, &str); 3] {
        [
            ("namespace", self.namespace.as_str()),
            ("pod", self.pod.as_str()),
            ("container", self.container.as_str()),
        ]
    }
}

impl fmt::Display for TargetIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.namespace, self.pod, self.container)
    }
}

impl FromStr for TargetIdentity {
    type Err = ExecError;

    /// Parse `namespace/pod/container`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('/').collect();
        let [namespace, pod, container] = parts.as_slice() else {
            return Err(ExecError::Validation(format!(
                "expected namespace/pod/container, got '{s}'"
            )));
        };

        let target = TargetIdentity::new(*namespace, *pod, *container);
        target.validate()?;
        Ok(target)
    }
}
