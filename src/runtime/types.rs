// ABOUTME: Which engine a target speaks to and where its API socket is.
// ABOUTME: Detection results and the `target.runtime` / `target.socket` overrides.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Docker and Podman both serve the Engine API; they differ in socket paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeType {
    Docker,
    Podman,
}

impl RuntimeType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Docker => "docker",
            Self::Podman => "podman",
        }
    }
}

impl fmt::Display for RuntimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedRuntime {
    pub runtime_type: RuntimeType,
    /// Path on the host that owns the daemon, local or remote.
    pub socket_path: String,
}

/// Either field may be set alone; detection fills in the other.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuntimeConfig {
    pub runtime: Option<RuntimeType>,
    pub socket: Option<String>,
}
