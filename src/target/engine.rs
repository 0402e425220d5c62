// ABOUTME: Container lifecycle shared by every target variant.
// ABOUTME: Runs, stops and lists labelled containers through the runtime traits.

use super::{DeployedInstance, LABEL_DIGEST, LABEL_MANAGED, LABEL_SERVICE, RunError};
use crate::runtime::{
    ContainerError, ContainerFilters, ContainerInfo, ContainerOps, ContainerSpec, ImageOps,
    PortMapping, RegistryAuth,
};
use crate::types::{ContainerId, ImageRef};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const STOP_GRACE: Duration = Duration::from_secs(10);

pub(crate) struct Engine<R> {
    runtime: Arc<R>,
    host: String,
    service: String,
}

impl<R> Engine<R>
where
    R: ImageOps + ContainerOps,
{
    pub(crate) fn new(runtime: Arc<R>, host: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            runtime,
            host: host.into(),
            service: service.into(),
        }
    }

    pub(crate) fn host(&self) -> &str {
        &self.host
    }

    pub(crate) async fn pull(
        &self,
        reference: &ImageRef,
        auth: Option<&RegistryAuth>,
    ) -> Result<(), RunError> {
        tracing::debug!(host = %self.host, image = %reference, "pulling");
        self.runtime
            .pull_image(reference, auth)
            .await
            .map_err(|source| RunError::Pull {
                reference: reference.to_string(),
                source,
            })
    }

    pub(crate) async fn run(
        &self,
        reference: &ImageRef,
        ports: &[PortMapping],
        name: &str,
    ) -> Result<DeployedInstance, RunError> {
        let existing = self
            .runtime
            .list_containers(&ContainerFilters::named(name))
            .await
            .map_err(RunError::List)?;
        if let Some(found) = existing.first() {
            return Err(RunError::NameConflict {
                name: name.to_string(),
                state: found.state,
            });
        }

        let mut labels = HashMap::from([
            (LABEL_MANAGED.to_string(), "true".to_string()),
            (LABEL_SERVICE.to_string(), self.service.clone()),
        ]);
        if let Some(digest) = reference.digest() {
            labels.insert(LABEL_DIGEST.to_string(), digest.to_string());
        }

        let spec = ContainerSpec {
            name: name.to_string(),
            image: reference.clone(),
            labels,
            ports: ports.to_vec(),
            env: HashMap::new(),
        };

        let id = self
            .runtime
            .create_container(&spec)
            .await
            .map_err(|source| match source {
                // Lost a race with another creator between list and create.
                ContainerError::AlreadyExists(_) => RunError::NameConflict {
                    name: name.to_string(),
                    state: crate::runtime::ContainerState::Created,
                },
                source => RunError::Create {
                    name: name.to_string(),
                    source,
                },
            })?;

        if let Err(source) = self.runtime.start_container(&id).await {
            if let Err(e) = self.runtime.remove_container(&id, true).await {
                tracing::warn!(container = %name, error = %e, "failed to clean up unstarted container");
            }
            return Err(RunError::Start {
                name: name.to_string(),
                source,
            });
        }

        tracing::info!(host = %self.host, container = %name, id = %id.short(), "container started");
        Ok(DeployedInstance {
            host: self.host.clone(),
            artifact: reference.clone(),
            ports: ports.to_vec(),
            id,
            name: name.to_string(),
        })
    }

    pub(crate) async fn stop(&self, instance: &DeployedInstance) -> Result<(), RunError> {
        self.stop_id(&instance.id, &instance.name).await
    }

    async fn stop_id(&self, id: &ContainerId, name: &str) -> Result<(), RunError> {
        match self.runtime.stop_container(id, STOP_GRACE).await {
            Ok(()) | Err(ContainerError::NotFound(_)) | Err(ContainerError::NotRunning(_)) => {}
            Err(source) => {
                return Err(RunError::Stop {
                    name: name.to_string(),
                    source,
                });
            }
        }
        match self.runtime.remove_container(id, true).await {
            Ok(()) | Err(ContainerError::NotFound(_)) => {
                tracing::debug!(container = %name, "container stopped and removed");
                Ok(())
            }
            Err(source) => Err(RunError::Stop {
                name: name.to_string(),
                source,
            }),
        }
    }

    pub(crate) async fn list(&self) -> Result<Vec<ContainerInfo>, RunError> {
        let filters = ContainerFilters {
            all: true,
            ..Default::default()
        }
        .label(LABEL_MANAGED, "true");
        self.runtime
            .list_containers(&filters)
            .await
            .map_err(RunError::List)
    }

    pub(crate) async fn stop_named(&self, name: &str) -> Result<bool, RunError> {
        let found = self
            .runtime
            .list_containers(&ContainerFilters::named(name))
            .await
            .map_err(RunError::List)?;
        let Some(container) = found.into_iter().next() else {
            return Ok(false);
        };
        self.stop_id(&container.id, name).await?;
        Ok(true)
    }

    /// Force-remove, ignoring containers that are already gone.
    pub(crate) async fn discard(&self, instance: &DeployedInstance) -> Result<(), RunError> {
        match self.runtime.remove_container(&instance.id, true).await {
            Ok(()) | Err(ContainerError::NotFound(_)) => Ok(()),
            Err(source) => Err(RunError::Stop {
                name: instance.name.clone(),
                source,
            }),
        }
    }
}
