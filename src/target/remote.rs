// ABOUTME: Target on a remote host reached over SSH.
// ABOUTME: Tunnels the remote runtime socket and speaks the Engine API through it.

use super::engine::Engine;
use super::{DeployedInstance, DeploymentTarget, RunError};
use crate::runtime::{
    BollardRuntime, ContainerInfo, PortMapping, RegistryAuth, RuntimeConfig, RuntimeError,
    RuntimeInfo, detect_remote,
};
use crate::ssh::{Session, SessionConfig};
use crate::types::ImageRef;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

/// A durable host: containers outlive the pipeline run.
pub struct RemoteHostTarget {
    engine: Engine<BollardRuntime>,
    session: Mutex<Option<Session>>,
}

impl RemoteHostTarget {
    /// Open the SSH session, find the runtime socket, and forward it.
    pub async fn connect(
        ssh: SessionConfig,
        runtime: Option<&RuntimeConfig>,
        service: &str,
    ) -> Result<Self, RuntimeError> {
        let host = ssh.host.clone();
        let ssh_error = |source| RuntimeError::Ssh {
            host: host.clone(),
            source,
        };

        let session = Session::connect(ssh).await.map_err(ssh_error)?;
        let found = detect_remote(&session, runtime).await?;
        tracing::debug!(
            host = %host,
            runtime = %found.runtime_type,
            socket = %found.socket_path,
            "found remote runtime"
        );

        let local = session
            .forward_socket(&found.socket_path)
            .await
            .map_err(ssh_error)?;
        let client = BollardRuntime::connect_socket(&local, found.runtime_type)?;
        let engine = client.info().await?;
        tracing::info!(
            host = %host,
            engine = %engine.name,
            version = %engine.version,
            api = %engine.api_version,
            "connected to remote daemon"
        );

        Ok(Self {
            engine: Engine::new(Arc::new(client), host.clone(), service),
            session: Mutex::new(Some(session)),
        })
    }

    /// Close the tunnel and the SSH connection. Safe to call twice.
    pub async fn disconnect(&self) -> Result<(), RuntimeError> {
        let session = self.session.lock().take();
        if let Some(session) = session {
            let host = session.host().to_string();
            session
                .disconnect()
                .await
                .map_err(|source| RuntimeError::Ssh { host, source })?;
        }
        Ok(())
    }
}

#[async_trait]
impl DeploymentTarget for RemoteHostTarget {
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
