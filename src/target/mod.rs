// ABOUTME: Deployment targets: places that can pull and run a container.
// ABOUTME: Local daemon, remote host over SSH, and ephemeral runner variants.

mod engine;
mod ephemeral;
mod error;
mod local;
mod remote;

pub use ephemeral::{EphemeralRunnerTarget, TeardownCallback};
pub use error::RunError;
pub use local::LocalDaemonTarget;
pub use remote::RemoteHostTarget;

use crate::runtime::{ContainerInfo, PortMapping, RegistryAuth};
use crate::types::{ContainerId, ImageRef};
use async_trait::async_trait;
use serde::Serialize;

/// Label marking containers this tool created.
pub const LABEL_MANAGED: &str = "hoist.managed";
/// Label carrying the service name.
pub const LABEL_SERVICE: &str = "hoist.service";
/// Label carrying the image digest the container runs.
pub const LABEL_DIGEST: &str = "hoist.digest";

/// A running container created by [`DeploymentTarget::run`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployedInstance {
    pub host: String,
    pub artifact: ImageRef,
    pub ports: Vec<PortMapping>,
    pub id: ContainerId,
    pub name: String,
}

impl DeployedInstance {
    /// First published host port, the default verification port.
    pub fn primary_port(&self) -> Option<u16> {
        self.ports.first().map(|p| p.host_port)
    }
}

#[async_trait]
pub trait DeploymentTarget: Send + Sync {
    /// Host name the deployed ports are reachable on.
    fn host(&self) -> &str;

    async fn pull(&self, reference: &ImageRef, auth: Option<&RegistryAuth>) -> Result<(), RunError>;

    /// Start `reference` as `name`. Fails with `NameConflict` if `name` exists.
    async fn run(
        &self,
        reference: &ImageRef,
        ports: &[PortMapping],
        name: &str,
    ) -> Result<DeployedInstance, RunError>;

    /// Stop and remove. Already stopped or already gone is success.
    async fn stop(&self, instance: &DeployedInstance) -> Result<(), RunError>;

    /// Containers this tool manages on the target, running or not.
    async fn list_containers(&self) -> Result<Vec<ContainerInfo>, RunError>;

    /// Stop a container by name. Returns false if nothing had that name.
    async fn stop_named(&self, name: &str) -> Result<bool, RunError>;

    /// Instances on this target vanish when its environment ends.
    fn is_ephemeral(&self) -> bool {
        false
    }

    /// Register work to run before instances vanish. Durable targets never
    /// tear down, so the callback is dropped.
    fn on_teardown(&self, _callback: TeardownCallback) -> Result<(), RunError> {
        Ok(())
    }

    /// Run teardown callbacks and remove what is left. Returns the instances
    /// that were torn down.
    async fn teardown(&self) -> Result<Vec<DeployedInstance>, RunError> {
        Ok(Vec::new())
    }
}
