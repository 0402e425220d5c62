// ABOUTME: In-memory container runtime and registry for dry runs and tests.
// ABOUTME: Implements the capability traits with the same error semantics as the engine.

use crate::runtime::traits::sealed::Sealed;
use crate::runtime::traits::{
    ContainerError, ContainerFilters, ContainerInfo, ContainerOps, ContainerSpec, ContainerState,
    ImageError, ImageOps, RegistryAuth, RuntimeInfo, RuntimeInfoError, RuntimeMetadata,
};
use crate::types::{ContainerId, Digest, ImageRef};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct Repository {
    tags: HashMap<String, Digest>,
    manifests: HashSet<Digest>,
}

#[derive(Default)]
struct RegistryState {
    repositories: HashMap<String, Repository>,
    uploads: usize,
    tag_updates: usize,
    required: Option<(String, String)>,
    push_faults: VecDeque<ImageError>,
    pull_faults: VecDeque<ImageError>,
}

/// A registry shared by every simulated daemon that talks to it.
#[derive(Default)]
pub struct SimulatedRegistry {
    state: Mutex<RegistryState>,
}

impl SimulatedRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Reject pushes and pulls that do not carry these credentials.
    pub fn require_credentials(&self, username: &str, password: &str) {
        self.state.lock().required = Some((username.to_string(), password.to_string()));
    }

    /// Fail the next push with `error` before it reaches the registry.
    pub fn fail_next_push(&self, error: ImageError) {
        self.state.lock().push_faults.push_back(error);
    }

    pub fn fail_next_pull(&self, error: ImageError) {
        self.state.lock().pull_faults.push_back(error);
    }

    /// Manifests actually uploaded; pushes of known digests do not count.
    pub fn uploads(&self) -> usize {
        self.state.lock().uploads
    }

    /// Tag writes that moved or created a tag.
    pub fn tag_updates(&self) -> usize {
        self.state.lock().tag_updates
    }

    pub fn resolve(&self, repository: &str, tag: &str) -> Option<Digest> {
        self.state
            .lock()
            .repositories
            .get(repository)
            .and_then(|r| r.tags.get(tag).cloned())
    }

    fn check_auth(state: &RegistryState, reference: &ImageRef, auth: Option<&RegistryAuth>) -> Result<(), ImageError> {
        match (&state.required, auth) {
            (None, _) => Ok(()),
            (Some((user, pass)), Some(a)) if &a.username == user && &a.password == pass => Ok(()),
            _ => Err(ImageError::AuthenticationFailed(reference.repository())),
        }
    }

    fn push(&self, reference: &ImageRef, digest: &Digest, auth: Option<&RegistryAuth>) -> Result<(), ImageError> {
        let mut state = self.state.lock();
        if let Some(fault) = state.push_faults.pop_front() {
            return Err(fault);
        }
        Self::check_auth(&state, reference, auth)?;

        let tag = reference.tag().unwrap_or("latest").to_string();
        let repo = state.repositories.entry(reference.repository()).or_default();
        let uploaded = repo.manifests.insert(digest.clone());
        let moved = repo.tags.insert(tag, digest.clone()).as_ref() != Some(digest);
        if uploaded {
            state.uploads += 1;
        }
        if moved {
            state.tag_updates += 1;
        }
        Ok(())
    }

    fn check_access(&self, reference: &ImageRef, auth: Option<&RegistryAuth>) -> Result<(), ImageError> {
        Self::check_auth(&self.state.lock(), reference, auth)
    }

    fn pull(&self, reference: &ImageRef, auth: Option<&RegistryAuth>) -> Result<Digest, ImageError> {
        let mut state = self.state.lock();
        if let Some(fault) = state.pull_faults.pop_front() {
            return Err(fault);
        }
        Self::check_auth(&state, reference, auth)?;

        let not_found = || ImageError::NotFound(reference.to_string());
        let repo = state
            .repositories
            .get(&reference.repository())
            .ok_or_else(not_found)?;
        match reference.digest() {
            Some(digest) if repo.manifests.contains(digest) => Ok(digest.clone()),
            Some(_) => Err(not_found()),
            None => repo
                .tags
                .get(reference.tag().unwrap_or("latest"))
                .cloned()
                .ok_or_else(not_found),
        }
    }
}

struct SimContainer {
    id: ContainerId,
    spec: ContainerSpec,
    state: ContainerState,
}

#[derive(Default)]
struct DaemonState {
    images: HashMap<String, Digest>,
    containers: BTreeMap<String, SimContainer>,
    next_id: u64,
    unreachable: bool,
    remove_faults: VecDeque<ContainerError>,
}

impl DaemonState {
    fn local_digest(&self, reference: &ImageRef) -> Option<Digest> {
        if let Some(digest) = reference.digest() {
            return self.images.values().find(|d| *d == digest).cloned();
        }
        self.images.get(&reference.tagged()).cloned()
    }

    fn by_id(&mut self, id: &ContainerId) -> Result<&mut SimContainer, ContainerError> {
        self.containers
            .values_mut()
            .find(|c| &c.id == id)
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))
    }
}

/// A container daemon that lives in memory.
///
/// Images pushed go to the attached [`SimulatedRegistry`]; two daemons
/// sharing one registry behave like a build host and a deploy host.
pub struct InMemoryRuntime {
    state: Mutex<DaemonState>,
    registry: Arc<SimulatedRegistry>,
}

impl Default for InMemoryRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRuntime {
    pub fn new() -> Self {
        Self::with_registry(SimulatedRegistry::new())
    }

    pub fn with_registry(registry: Arc<SimulatedRegistry>) -> Self {
        Self {
            state: Mutex::new(DaemonState::default()),
            registry,
        }
    }

    pub fn registry(&self) -> &Arc<SimulatedRegistry> {
        &self.registry
    }

    /// Place a built image in the local store under `reference`.
    pub fn load_image(&self, reference: &ImageRef, digest: Digest) {
        self.state.lock().images.insert(reference.tagged(), digest);
    }

    /// Make `ping`, `info` and local image lookups fail, as a stopped daemon would.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unreachable = unreachable;
    }

    /// Fail the next container removal with `error`, even when forced.
    pub fn fail_next_remove(&self, error: ContainerError) {
        self.state.lock().remove_faults.push_back(error);
    }

    /// Drop a container behind the caller's back, like an external `rm -f`.
    pub fn vanish(&self, name: &str) -> bool {
        self.state.lock().containers.remove(name).is_some()
    }

    pub fn container_state(&self, name: &str) -> Option<ContainerState> {
        self.state.lock().containers.get(name).map(|c| c.state)
    }

    fn info_of(c: &SimContainer) -> ContainerInfo {
        ContainerInfo {
            id: c.id.clone(),
            name: c.spec.name.clone(),
            image: c.spec.image.to_string(),
            state: c.state,
            labels: c.spec.labels.clone(),
            ports: c.spec.ports.clone(),
        }
    }
}

impl Sealed for InMemoryRuntime {}

#[async_trait]
impl RuntimeInfo for InMemoryRuntime {
    async fn info(&self) -> Result<RuntimeMetadata, RuntimeInfoError> {
        self.ping().await?;
        Ok(RuntimeMetadata {
            name: "in-memory".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            api_version: "simulated".to_string(),
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        })
    }

    async fn ping(&self) -> Result<(), RuntimeInfoError> {
        if self.state.lock().unreachable {
            return Err(RuntimeInfoError::ConnectionFailed(
                "simulated daemon is unreachable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ImageOps for InMemoryRuntime {
    async fn pull_image(
        &self,
        reference: &ImageRef,
        auth: Option<&RegistryAuth>,
    ) -> Result<(), ImageError> {
        let digest = self.registry.pull(reference, auth)?;
        let mut state = self.state.lock();
        state.images.insert(reference.to_string(), digest);
        Ok(())
    }

    async fn push_image(
        &self,
        reference: &ImageRef,
        auth: Option<&RegistryAuth>,
    ) -> Result<Digest, ImageError> {
        let digest = self
            .state
            .lock()
            .local_digest(reference)
            .ok_or_else(|| ImageError::NotFound(reference.to_string()))?;
        self.registry.push(reference, &digest, auth)?;
        Ok(digest)
    }

    async fn check_access(
        &self,
        reference: &ImageRef,
        auth: Option<&RegistryAuth>,
    ) -> Result<(), ImageError> {
        self.registry.check_access(reference, auth)
    }

    async fn tag_image(&self, source: &ImageRef, target: &ImageRef) -> Result<(), ImageError> {
        let mut state = self.state.lock();
        let digest = state
            .local_digest(source)
            .ok_or_else(|| ImageError::NotFound(source.to_string()))?;
        state.images.insert(target.tagged(), digest);
        Ok(())
    }

    async fn image_exists(&self, reference: &ImageRef) -> Result<bool, ImageError> {
        let state = self.state.lock();
        if state.unreachable {
            return Err(ImageError::Runtime("simulated daemon is unreachable".to_string()));
        }
        Ok(state.local_digest(reference).is_some() || state.images.contains_key(&reference.to_string()))
    }
}

#[async_trait]
impl ContainerOps for InMemoryRuntime {
    async fn create_container(&self, spec: &ContainerSpec) -> Result<ContainerId, ContainerError> {
        let mut state = self.state.lock();
        if state.local_digest(&spec.image).is_none()
            && !state.images.contains_key(&spec.image.to_string())
        {
            return Err(ContainerError::ImageNotFound(spec.image.to_string()));
        }
        if state.containers.contains_key(&spec.name) {
            return Err(ContainerError::AlreadyExists(spec.name.clone()));
        }

        state.next_id += 1;
        let id = ContainerId::new(format!("{:064x}", state.next_id));
        state.containers.insert(
            spec.name.clone(),
            SimContainer {
                id: id.clone(),
                spec: spec.clone(),
                state: ContainerState::Created,
            },
        );
        Ok(id)
    }

    async fn start_container(&self, id: &ContainerId) -> Result<(), ContainerError> {
        let mut state = self.state.lock();

        let ports = state.by_id(id)?.spec.ports.clone();
        let clash = state.containers.values().any(|c| {
            &c.id != id
                && c.state.is_running()
                && c.spec.ports.iter().any(|p| ports.iter().any(|q| q.host_port == p.host_port && q.protocol == p.protocol))
        });
        if clash {
            return Err(ContainerError::PortInUse(id.to_string()));
        }

        let container = state.by_id(id)?;
        if container.state.is_running() {
            return Err(ContainerError::AlreadyRunning(id.to_string()));
        }
        container.state = ContainerState::Running;
        Ok(())
    }

    async fn stop_container(
        &self,
        id: &ContainerId,
        _timeout: Duration,
    ) -> Result<(), ContainerError> {
        let mut state = self.state.lock();
        let container = state.by_id(id)?;
        if !container.state.is_running() {
            return Err(ContainerError::NotRunning(id.to_string()));
        }
        container.state = ContainerState::Exited;
        Ok(())
    }

    async fn remove_container(&self, id: &ContainerId, force: bool) -> Result<(), ContainerError> {
        let mut state = self.state.lock();
        if let Some(fault) = state.remove_faults.pop_front() {
            return Err(fault);
        }
        let container = state.by_id(id)?;
        if container.state.is_running() && !force {
            return Err(ContainerError::Runtime(format!(
                "cannot remove running container {}",
                id
            )));
        }
        let name = container.spec.name.clone();
        state.containers.remove(&name);
        Ok(())
    }

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerInfo, ContainerError> {
        let mut state = self.state.lock();
        Ok(Self::info_of(state.by_id(id)?))
    }

    async fn list_containers(
        &self,
        filters: &ContainerFilters,
    ) -> Result<Vec<ContainerInfo>, ContainerError> {
        let state = self.state.lock();
        Ok(state
            .containers
            .values()
            .map(Self::info_of)
            .filter(|info| filters.matches(info))
            .collect())
    }
}
