// ABOUTME: Target backed by a container daemon on this machine.
// ABOUTME: Works with the Engine API client or the in-memory runtime.

use super::engine::Engine;
use super::{DeployedInstance, DeploymentTarget, RunError};
use crate::runtime::{
    BollardRuntime, ContainerInfo, ContainerOps, ImageOps, PortMapping, RegistryAuth,
    RuntimeConfig, RuntimeError, detect_local,
};
use crate::types::ImageRef;
use async_trait::async_trait;
use std::sync::Arc;

/// Containers run on the local daemon and are reachable on `localhost`.
pub struct LocalDaemonTarget<R> {
    engine: Engine<R>,
}

impl<R> LocalDaemonTarget<R>
where
    R: ImageOps + ContainerOps,
{
    pub fn new(runtime: Arc<R>, service: &str) -> Self {
        Self::on_host(runtime, "localhost", service)
    }

    /// Same as `new`, reporting ports as reachable on `host`.
    pub fn on_host(runtime: Arc<R>, host: &str, service: &str) -> Self {
        Self {
            engine: Engine::new(runtime, host, service),
        }
    }
}

impl LocalDaemonTarget<BollardRuntime> {
    /// Detect the local Docker or Podman socket and connect to it.
    pub fn connect(config: Option<&RuntimeConfig>, service: &str) -> Result<Self, RuntimeError> {
        let found = detect_local(config)?;
        let runtime = BollardRuntime::connect(&found)?;
        tracing::debug!(runtime = %found.runtime_type, socket = %found.socket_path, "using local runtime");
        Ok(Self::new(Arc::new(runtime), service))
    }
}

#[async_trait]
impl<R> DeploymentTarget for LocalDaemonTarget<R>
where
    R: ImageOps + ContainerOps + 'static,
{
    fn host(&self) -> &str {
        self.engine.host()
    }

    async fn pull(&self, reference: &ImageRef, auth: Option<&RegistryAuth>) -> Result<(), RunError> {
        self.engine.pull(reference, auth).await
    }

    async fn run(
        &self,
        reference: &ImageRef,
        ports: &[PortMapping],
        name: &str,
    ) -> Result<DeployedInstance, RunError> {
        self.engine.run(reference, ports, name).await
    }

    async fn stop(&self, instance: &DeployedInstance) -> Result<(), RunError> {
        self.engine.stop(instance).await
    }

    async fn list_containers(&self) -> Result<Vec<ContainerInfo>, RunError> {
        self.engine.list().await
    }

    async fn stop_named(&self, name: &str) -> Result<bool, RunError> {
        self.engine.stop_named(name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{ContainerState, InMemoryRuntime};
    use crate::types::Digest;

    fn loaded() -> (Arc<InMemoryRuntime>, ImageRef) {
        let rt = Arc::new(InMemoryRuntime::new());
        let image = ImageRef::parse("registry.local/acme/web:1").unwrap();
        rt.load_image(&image, Digest::parse("sha:abc123").unwrap());
        (rt, image)
    }

    #[tokio::test]
    async fn run_refuses_a_taken_name() {
        let (rt, image) = loaded();
        let target = LocalDaemonTarget::new(rt, "web");
        let ports = [PortMapping::tcp(8080, 80)];

        target.run(&image, &ports, "web").await.unwrap();
        let err = target.run(&image, &ports, "web").await.unwrap_err();
        assert!(matches!(
            err,
            RunError::NameConflict {
                state: ContainerState::Running,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn stopped_container_still_conflicts() {
        let (rt, image) = loaded();
        let target = LocalDaemonTarget::new(rt.clone(), "web");

        let instance = target.run(&image, &[], "web").await.unwrap();
        rt.stop_container(&instance.id, std::time::Duration::ZERO)
            .await
            .unwrap();

        let err = target.run(&image, &[], "web").await.unwrap_err();
        assert!(matches!(
            err,
            RunError::NameConflict {
                state: ContainerState::Exited,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let (rt, image) = loaded();
        let target = LocalDaemonTarget::new(rt.clone(), "web");
        let instance = target.run(&image, &[PortMapping::tcp(80, 80)], "web").await.unwrap();

        target.stop(&instance).await.unwrap();
        target.stop(&instance).await.unwrap();
        assert!(rt.container_state("web").is_none());
    }

    #[tokio::test]
    async fn failed_start_leaves_nothing_behind() {
        let (rt, image) = loaded();
        let target = LocalDaemonTarget::new(rt.clone(), "web");
        target.run(&image, &[PortMapping::tcp(80, 80)], "web-a").await.unwrap();

        let err = target
            .run(&image, &[PortMapping::tcp(80, 80)], "web-b")
            .await
            .unwrap_err();
        assert!(err.is_port_conflict());
        assert!(rt.container_state("web-b").is_none());
    }

    #[tokio::test]
    async fn list_and_stop_by_name() {
        let (rt, image) = loaded();
        let target = LocalDaemonTarget::new(rt, "web");
        target.run(&image, &[], "web").await.unwrap();

        let listed = target.list_containers().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].labels.get("hoist.service").map(String::as_str), Some("web"));

        assert!(target.stop_named("web").await.unwrap());
        assert!(!target.stop_named("web").await.unwrap());
    }
}
