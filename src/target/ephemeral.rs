// ABOUTME: Target whose containers vanish when the hosting job ends.
// ABOUTME: Callbacks registered before teardown see the instances about to go.

use super::engine::Engine;
use super::{DeployedInstance, DeploymentTarget, RunError};
use crate::runtime::{ContainerInfo, ContainerOps, ImageOps, PortMapping, RegistryAuth};
use crate::types::ImageRef;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

/// Work to run with the instances that are about to be torn down.
pub type TeardownCallback = Box<dyn FnOnce(&[DeployedInstance]) + Send>;

#[derive(Default)]
struct Lifecycle {
    scheduled: bool,
    callbacks: Vec<TeardownCallback>,
    instances: Vec<DeployedInstance>,
}

/// A runner-local daemon, such as the one inside a CI job.
///
/// Nothing deployed here survives [`DeploymentTarget::teardown`]. Once
/// teardown is scheduled, `run` and `on_teardown` are refused.
pub struct EphemeralRunnerTarget<R> {
    engine: Engine<R>,
    lifecycle: Mutex<Lifecycle>,
}

impl<R> EphemeralRunnerTarget<R>
where
    R: ImageOps + ContainerOps,
{
    pub fn new(runtime: Arc<R>, service: &str) -> Self {
        Self {
            engine: Engine::new(runtime, "localhost", service),
            lifecycle: Mutex::new(Lifecycle::default()),
        }
    }

    fn refuse_if_scheduled(&self) -> Result<(), RunError> {
        if self.lifecycle.lock().scheduled {
            return Err(RunError::TeardownScheduled {
                host: self.engine.host().to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl<R> DeploymentTarget for EphemeralRunnerTarget<R>
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
        self.refuse_if_scheduled()?;
        let instance = self.engine.run(reference, ports, name).await?;
        self.lifecycle.lock().instances.push(instance.clone());
        Ok(instance)
    }

    async fn stop(&self, instance: &DeployedInstance) -> Result<(), RunError> {
        self.engine.stop(instance).await?;
        self.lifecycle.lock().instances.retain(|i| i.id != instance.id);
        Ok(())
    }

    async fn list_containers(&self) -> Result<Vec<ContainerInfo>, RunError> {
        self.engine.list().await
    }

    async fn stop_named(&self, name: &str) -> Result<bool, RunError> {
        let stopped = self.engine.stop_named(name).await?;
        self.lifecycle.lock().instances.retain(|i| i.name != name);
        Ok(stopped)
    }

    fn is_ephemeral(&self) -> bool {
        true
    }

    fn on_teardown(&self, callback: TeardownCallback) -> Result<(), RunError> {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.scheduled {
            return Err(RunError::TeardownScheduled {
                host: self.engine.host().to_string(),
            });
        }
        lifecycle.callbacks.push(callback);
        Ok(())
    }

    async fn teardown(&self) -> Result<Vec<DeployedInstance>, RunError> {
        let (callbacks, instances) = {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.scheduled {
                return Ok(Vec::new());
            }
            lifecycle.scheduled = true;
            (
                std::mem::take(&mut lifecycle.callbacks),
                std::mem::take(&mut lifecycle.instances),
            )
        };

        for callback in callbacks {
            callback(&instances);
        }
        let mut removed = Vec::with_capacity(instances.len());
        let mut failures = Vec::new();
        for instance in instances {
            match self.engine.discard(&instance).await {
                Ok(()) => {
                    tracing::warn!(container = %instance.name, "ephemeral runner ending; instance torn down");
                    removed.push(instance);
                }
                Err(e) => {
                    tracing::warn!(container = %instance.name, error = %e, "teardown could not remove instance");
                    failures.push(e);
                }
            }
        }

        if failures.is_empty() {
            Ok(removed)
        } else {
            Err(RunError::Teardown {
                host: self.engine.host().to_string(),
                failures,
            })
        }
    }
}
