// ABOUTME: Container lifecycle as the deployment engine needs it.
// ABOUTME: Also the label/name filter used to find hoist-managed containers.

use super::sealed::Sealed;
use super::shared_types::{ContainerInfo, ContainerSpec};
use crate::types::ContainerId;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

#[async_trait]
pub trait ContainerOps: Sealed + Send + Sync {
    /// Fails with `AlreadyExists` when the name is taken, whatever its state.
    async fn create_container(&self, spec: &ContainerSpec) -> Result<ContainerId, ContainerError>;

    async fn start_container(&self, id: &ContainerId) -> Result<(), ContainerError>;

    /// Graceful stop; the daemon kills after `timeout`.
    async fn stop_container(
        &self,
        id: &ContainerId,
        timeout: Duration,
    ) -> Result<(), ContainerError>;

    async fn remove_container(&self, id: &ContainerId, force: bool) -> Result<(), ContainerError>;

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerInfo, ContainerError>;

    async fn list_containers(
        &self,
        filters: &ContainerFilters,
    ) -> Result<Vec<ContainerInfo>, ContainerError>;
}

/// All conditions must hold. Stopped containers only match when `all` is set.
#[derive(Debug, Clone, Default)]
pub struct ContainerFilters {
    pub labels: HashMap<String, String>,
    pub name: Option<String>,
    pub all: bool,
}

impl ContainerFilters {
    /// Running or stopped, since either one blocks the name.
    pub fn named(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            all: true,
            ..Default::default()
        }
    }

    pub fn label(mut self, key: &str, value: &str) -> Self {
        self.labels.insert(key.to_string(), value.to_string());
        self
    }

    pub(crate) fn matches(&self, info: &ContainerInfo) -> bool {
        if !self.all && !info.state.is_running() {
            return false;
        }
        if let Some(ref name) = self.name
            && &info.name != name
        {
            return false;
        }
        self.labels
            .iter()
            .all(|(k, v)| info.labels.get(k) == Some(v))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("container not found: {0}")]
    NotFound(String),

    #[error("container already exists: {0}")]
    AlreadyExists(String),

    #[error("container not running: {0}")]
    NotRunning(String),

    #[error("container already running: {0}")]
    AlreadyRunning(String),

    #[error("image not found: {0}")]
    ImageNotFound(String),

    #[error("host port already published: {0}")]
    PortInUse(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
