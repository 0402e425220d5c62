// ABOUTME: Target section: where the container runs.
// ABOUTME: Local daemon, remote host over SSH, or an ephemeral runner.

use super::deserialize::deserialize_server_option;
use super::server::ServerConfig;
use crate::runtime::{RuntimeConfig, RuntimeType};
use serde::Deserialize;
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    #[default]
    Local,
    Remote,
    Ephemeral,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TargetKind::Local => "local",
            TargetKind::Remote => "remote",
            TargetKind::Ephemeral => "ephemeral",
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TargetConfig {
    #[serde(default)]
    pub kind: TargetKind,

    /// Required for `remote`.
    #[serde(default, deserialize_with = "deserialize_server_option")]
    pub server: Option<ServerConfig>,

    #[serde(default)]
    pub runtime: Option<RuntimeType>,

    #[serde(default)]
    pub socket: Option<String>,

    /// Stop a container holding the service name before running, instead
    /// of failing with a name conflict.
    #[serde(default)]
    pub replace: bool,
}

impl TargetConfig {
    /// Explicit runtime override, if either field is set.
    pub fn runtime_config(&self) -> Option<RuntimeConfig> {
        if self.runtime.is_none() && self.socket.is_none() {
            return None;
        }
        Some(RuntimeConfig {
            runtime: self.runtime,
            socket: self.socket.clone(),
        })
    }
}
