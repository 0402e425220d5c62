// ABOUTME: Bollard-based container runtime implementation.
// ABOUTME: Speaks the Docker Engine API to Docker or Podman over a unix socket.

use crate::runtime::traits::sealed::Sealed;
use crate::runtime::traits::{
    ContainerError, ContainerFilters, ContainerInfo, ContainerOps, ContainerSpec, ContainerState,
    ImageError, ImageOps, PortMapping, Protocol, RegistryAuth, RuntimeInfo, RuntimeInfoError,
    RuntimeMetadata,
};
use crate::runtime::types::{DetectedRuntime, RuntimeType};
use crate::types::{ContainerId, Digest, ImageRef};
use async_trait::async_trait;
use bollard::Docker;
use bollard::errors::Error as EngineError;
use bollard::models::{ContainerCreateBody, HostConfig, PortBinding};
use bollard::query_parameters::{
    CreateContainerOptions, CreateImageOptions, InspectContainerOptions, ListContainersOptions,
    PushImageOptions, RemoveContainerOptions, StopContainerOptions, TagImageOptions,
};
use futures::StreamExt;
use std::collections::HashMap;
use std::time::Duration;

/// Seconds bollard waits on a single API request.
const REQUEST_TIMEOUT_SECS: u64 = 120;

// =============================================================================
// Error Mapping Helpers
// =============================================================================

fn status_of(e: &EngineError) -> Option<(u16, &str)> {
    match e {
        EngineError::DockerResponseServerError {
            status_code,
            message,
        } => Some((*status_code, message.as_str())),
        _ => None,
    }
}

/// Registry errors arrive either as HTTP statuses or as messages inside the
/// progress stream; both are sorted into the same buckets.
fn map_registry_error(e: EngineError, image: &str, push: bool) -> ImageError {
    let failed = |msg: String| {
        if push {
            ImageError::PushFailed(msg)
        } else {
            ImageError::PullFailed(msg)
        }
    };

    match &e {
        EngineError::DockerResponseServerError { status_code, .. } => match status_code {
            401 | 403 => ImageError::AuthenticationFailed(image.to_string()),
            404 => ImageError::NotFound(image.to_string()),
            408 | 429 | 500..=599 => ImageError::Transport(format!("{}: {}", image, e)),
            _ => failed(format!("{}: {}", image, e)),
        },
        EngineError::DockerStreamError { error } => classify_stream_message(error, image, failed),
        _ => ImageError::Transport(format!("{}: {}", image, e)),
    }
}

fn classify_stream_message(
    message: &str,
    image: &str,
    failed: impl Fn(String) -> ImageError,
) -> ImageError {
    let lower = message.to_ascii_lowercase();
    if lower.contains("unauthorized")
        || lower.contains("denied")
        || lower.contains("authentication required")
    {
        ImageError::AuthenticationFailed(image.to_string())
    } else if lower.contains("manifest unknown") || lower.contains("not found") {
        ImageError::NotFound(image.to_string())
    } else if lower.contains("timeout")
        || lower.contains("connection reset")
        || lower.contains("connection refused")
        || lower.contains("temporarily unavailable")
        || lower.contains("eof")
    {
        ImageError::Transport(format!("{}: {}", image, message))
    } else {
        failed(format!("{}: {}", image, message))
    }
}

fn map_container_error(e: EngineError) -> ContainerError {
    match status_of(&e) {
        Some((404, msg)) => ContainerError::NotFound(msg.to_string()),
        Some((409, msg)) => ContainerError::AlreadyExists(msg.to_string()),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

fn map_container_create_error(e: EngineError, image: &str) -> ContainerError {
    match status_of(&e) {
        Some((404, _)) => ContainerError::ImageNotFound(image.to_string()),
        _ => map_container_error(e),
    }
}

fn map_container_start_error(e: EngineError) -> ContainerError {
    match status_of(&e) {
        Some((304, msg)) => ContainerError::AlreadyRunning(msg.to_string()),
        Some((500, msg)) if msg.contains("port is already allocated") => {
            ContainerError::PortInUse(msg.to_string())
        }
        _ => map_container_error(e),
    }
}

fn map_container_stop_error(e: EngineError) -> ContainerError {
    match status_of(&e) {
        Some((304, msg)) => ContainerError::NotRunning(msg.to_string()),
        _ => map_container_error(e),
    }
}

/// Pull the manifest digest out of a push progress line such as
/// `latest: digest: sha256:4c... size: 1570`.
fn digest_from_status(status: &str) -> Option<Digest> {
    let (_, rest) = status.split_once("digest: ")?;
    let token = rest.split_whitespace().next()?;
    Digest::parse(token).ok()
}

fn port_key(port: &PortMapping) -> String {
    format!("{}/{}", port.container_port, port.protocol)
}

/// Parse a `"80/tcp"` key plus its bindings back into mappings.
fn ports_from_bindings(
    bindings: &HashMap<String, Option<Vec<PortBinding>>>,
) -> Vec<PortMapping> {
    let mut ports = Vec::new();
    for (key, binds) in bindings {
        let (container, proto) = key.split_once('/').unwrap_or((key.as_str(), "tcp"));
        let (Ok(container_port), Ok(protocol)) =
            (container.parse::<u16>(), proto.parse::<Protocol>())
        else {
            continue;
        };
        for bind in binds.iter().flatten() {
            if let Some(host_port) = bind.host_port.as_deref().and_then(|p| p.parse().ok()) {
                ports.push(PortMapping {
                    host_port,
                    container_port,
                    protocol,
                });
            }
        }
    }
    ports.sort_by_key(|p| (p.host_port, p.container_port));
    ports.dedup();
    ports
}

// =============================================================================
// BollardRuntime
// =============================================================================

/// Container runtime implementation using bollard.
pub struct BollardRuntime {
    client: Docker,
    runtime_type: RuntimeType,
}

impl BollardRuntime {
    pub fn new(client: Docker, runtime_type: RuntimeType) -> Self {
        Self {
            client,
            runtime_type,
        }
    }

    /// Connect to a detected runtime socket.
    pub fn connect(found: &DetectedRuntime) -> Result<Self, RuntimeInfoError> {
        Self::connect_socket(&found.socket_path, found.runtime_type)
    }

    /// Connect to an arbitrary unix socket speaking the Engine API.
    pub fn connect_socket(path: &str, runtime_type: RuntimeType) -> Result<Self, RuntimeInfoError> {
        let client = Docker::connect_with_unix(path, REQUEST_TIMEOUT_SECS, bollard::API_DEFAULT_VERSION)
            .map_err(|e| RuntimeInfoError::ConnectionFailed(format!("{}: {}", path, e)))?;
        tracing::debug!(socket = path, runtime = %runtime_type, "connected to runtime");
        Ok(Self::new(client, runtime_type))
    }

    pub fn runtime_type(&self) -> RuntimeType {
        self.runtime_type
    }

    fn credentials(auth: Option<&RegistryAuth>) -> Option<bollard::auth::DockerCredentials> {
        auth.map(|a| bollard::auth::DockerCredentials {
            username: Some(a.username.clone()),
            password: Some(a.password.clone()),
            serveraddress: a.server.clone(),
            ..Default::default()
        })
    }

    /// Fall back to the image's recorded repo digests when the push stream
    /// did not report one (Podman omits the aux line).
    async fn repo_digest(&self, reference: &ImageRef) -> Result<Option<Digest>, ImageError> {
        let inspect = self
            .client
            .inspect_image(&reference.to_string())
            .await
            .map_err(|e| ImageError::Runtime(format!("failed to inspect {}: {}", reference, e)))?;

        let prefix = format!("{}@", reference.repository());
        Ok(inspect
            .repo_digests
            .unwrap_or_default()
            .iter()
            .filter_map(|d| d.strip_prefix(&prefix))
            .find_map(|d| Digest::parse(d).ok()))
    }
}

impl Sealed for BollardRuntime {}

#[async_trait]
impl RuntimeInfo for BollardRuntime {
    async fn info(&self) -> Result<RuntimeMetadata, RuntimeInfoError> {
        let info = self
            .client
            .info()
            .await
            .map_err(|e| RuntimeInfoError::ConnectionFailed(e.to_string()))?;

        Ok(RuntimeMetadata {
            name: self.runtime_type.to_string(),
            version: info.server_version.unwrap_or_default(),
            api_version: bollard::API_DEFAULT_VERSION.to_string(),
            os: info.operating_system.unwrap_or_default(),
            arch: info.architecture.unwrap_or_default(),
        })
    }

    async fn ping(&self) -> Result<(), RuntimeInfoError> {
        self.client
            .ping()
            .await
            .map_err(|e| RuntimeInfoError::ConnectionFailed(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl ImageOps for BollardRuntime {
    async fn pull_image(
        &self,
        reference: &ImageRef,
        auth: Option<&RegistryAuth>,
    ) -> Result<(), ImageError> {
        let image_name = reference.to_string();
        let opts = CreateImageOptions {
            from_image: Some(image_name.clone()),
            ..Default::default()
        };

        let mut stream = self
            .client
            .create_image(Some(opts), None, Self::credentials(auth));
        while let Some(result) = stream.next().await {
            result.map_err(|e| map_registry_error(e, &image_name, false))?;
        }

        tracing::debug!(image = %image_name, "pulled");
        Ok(())
    }

    async fn push_image(
        &self,
        reference: &ImageRef,
        auth: Option<&RegistryAuth>,
    ) -> Result<Digest, ImageError> {
        let image_name = reference.to_string();
        let opts = PushImageOptions {
            tag: Some(reference.tag().unwrap_or("latest").to_string()),
            ..Default::default()
        };

        let mut reported = None;
        let mut stream =
            self.client
                .push_image(&reference.repository(), Some(opts), Self::credentials(auth));
        while let Some(result) = stream.next().await {
            let info = result.map_err(|e| map_registry_error(e, &image_name, true))?;
            if let Some(digest) = info.status.as_deref().and_then(digest_from_status) {
                reported = Some(digest);
            }
        }

        let digest = match reported {
            Some(d) => d,
            None => self.repo_digest(reference).await?.ok_or_else(|| {
                ImageError::PushFailed(format!("{}: registry reported no digest", image_name))
            })?,
        };

        tracing::debug!(image = %image_name, %digest, "pushed");
        Ok(digest)
    }

    async fn check_access(
        &self,
        reference: &ImageRef,
        auth: Option<&RegistryAuth>,
    ) -> Result<(), ImageError> {
        let image_name = reference.to_string();
        match self
            .client
            .inspect_registry_image(&image_name, Self::credentials(auth))
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => match map_registry_error(e, &image_name, false) {
                ImageError::NotFound(_) => Ok(()),
                other => Err(other),
            },
        }
    }

    async fn tag_image(&self, source: &ImageRef, target: &ImageRef) -> Result<(), ImageError> {
        let opts = TagImageOptions {
            repo: Some(target.repository()),
            tag: Some(target.tag().unwrap_or("latest").to_string()),
            ..Default::default()
        };

        self.client
            .tag_image(&source.to_string(), Some(opts))
            .await
            .map_err(|e| match status_of(&e) {
                Some((404, _)) => ImageError::NotFound(source.to_string()),
                _ => ImageError::Runtime(format!("failed to tag {} as {}: {}", source, target, e)),
            })
    }

    async fn image_exists(&self, reference: &ImageRef) -> Result<bool, ImageError> {
        let image_name = reference.to_string();

        match self.client.inspect_image(&image_name).await {
            Ok(_) => Ok(true),
            Err(EngineError::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(false),
            Err(e) => Err(ImageError::Runtime(format!(
                "failed to inspect {}: {}",
                image_name, e
            ))),
        }
    }
}

#[async_trait]
impl ContainerOps for BollardRuntime {
    async fn create_container(&self, spec: &ContainerSpec) -> Result<ContainerId, ContainerError> {
        let image_name = spec.image.to_string();

        let mut port_bindings: HashMap<String, Option<Vec<PortBinding>>> = HashMap::new();
        let mut exposed_ports: Vec<String> = Vec::new();
        for port in &spec.ports {
            let key = port_key(port);
            exposed_ports.push(key.clone());
            port_bindings
                .entry(key)
                .or_insert_with(|| Some(Vec::new()))
                .get_or_insert_with(Vec::new)
                .push(PortBinding {
                    host_ip: None,
                    host_port: Some(port.host_port.to_string()),
                });
        }

        let host_config = HostConfig {
            port_bindings: (!port_bindings.is_empty()).then_some(port_bindings),
            ..Default::default()
        };

        let env: Vec<String> = spec
            .env
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();

        let body = ContainerCreateBody {
            image: Some(image_name.clone()),
            env: (!env.is_empty()).then_some(env),
            labels: (!spec.labels.is_empty()).then(|| spec.labels.clone()),
            exposed_ports: (!exposed_ports.is_empty()).then_some(exposed_ports),
            host_config: Some(host_config),
            ..Default::default()
        };

        let opts = CreateContainerOptions {
            name: Some(spec.name.clone()),
            ..Default::default()
        };

        let response = self
            .client
            .create_container(Some(opts), body)
            .await
            .map_err(|e| map_container_create_error(e, &image_name))?;

        Ok(ContainerId::new(response.id))
    }

    async fn start_container(&self, id: &ContainerId) -> Result<(), ContainerError> {
        self.client
            .start_container(
                id.as_str(),
                None::<bollard::query_parameters::StartContainerOptions>,
            )
            .await
            .map_err(map_container_start_error)
    }

    async fn stop_container(
        &self,
        id: &ContainerId,
        timeout: Duration,
    ) -> Result<(), ContainerError> {
        let opts = StopContainerOptions {
            t: Some(timeout.as_secs() as i32),
            signal: None,
        };

        self.client
            .stop_container(id.as_str(), Some(opts))
            .await
            .map_err(map_container_stop_error)
    }

    async fn remove_container(&self, id: &ContainerId, force: bool) -> Result<(), ContainerError> {
        let opts = RemoveContainerOptions {
            force,
            ..Default::default()
        };

        self.client
            .remove_container(id.as_str(), Some(opts))
            .await
            .map_err(map_container_error)
    }

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerInfo, ContainerError> {
        let details = self
            .client
            .inspect_container(id.as_str(), None::<InspectContainerOptions>)
            .await
            .map_err(map_container_error)?;

        let state = details
            .state
            .as_ref()
            .and_then(|s| s.status)
            .map(|s| ContainerState::from_engine(&format!("{:?}", s)))
            .unwrap_or(ContainerState::Exited);

        let ports = details
            .host_config
            .as_ref()
            .and_then(|h| h.port_bindings.as_ref())
            .map(ports_from_bindings)
            .unwrap_or_default();

        Ok(ContainerInfo {
            id: ContainerId::new(details.id.unwrap_or_else(|| id.as_str().to_string())),
            name: details
                .name
                .unwrap_or_default()
                .trim_start_matches('/')
                .to_string(),
            image: details
                .config
                .as_ref()
                .and_then(|c| c.image.clone())
                .unwrap_or_default(),
            state,
            labels: details.config.and_then(|c| c.labels).unwrap_or_default(),
            ports,
        })
    }

    async fn list_containers(
        &self,
        filters: &ContainerFilters,
    ) -> Result<Vec<ContainerInfo>, ContainerError> {
        let mut filter_map: HashMap<String, Vec<String>> = HashMap::new();

        // The engine's name filter is a regex; anchor it and re-check below.
        if let Some(ref name) = filters.name {
            filter_map.insert("name".to_string(), vec![format!("^/?{}$", name)]);
        }
        for (key, value) in &filters.labels {
            filter_map
                .entry("label".to_string())
                .or_default()
                .push(format!("{}={}", key, value));
        }

        let opts = ListContainersOptions {
            all: filters.all,
            filters: Some(filter_map),
            ..Default::default()
        };

        // Podman's transient "stopping" state can fail bollard's enum
        // deserialization; give it a moment and ask again.
        let mut attempt = 0;
        let containers = loop {
            match self.client.list_containers(Some(opts.clone())).await {
                Ok(containers) => break containers,
                Err(e) => {
                    let err_str = e.to_string();
                    if err_str.contains("unknown variant `stopping`") && attempt < 2 {
                        attempt += 1;
                        tokio::time::sleep(Duration::from_millis(500)).await;
                        continue;
                    }
                    return Err(ContainerError::Runtime(err_str));
                }
            }
        };

        let infos = containers
            .into_iter()
            .map(|c| {
                let name = c
                    .names
                    .unwrap_or_default()
                    .first()
                    .map(|n| n.trim_start_matches('/').to_string())
                    .unwrap_or_default();
                let ports = c
                    .ports
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|p| {
                        Some(PortMapping {
                            host_port: p.public_port?,
                            container_port: p.private_port,
                            protocol: p
                                .typ
                                .and_then(|t| format!("{:?}", t).to_lowercase().parse().ok())
                                .unwrap_or_default(),
                        })
                    })
                    .collect();

                ContainerInfo {
                    id: ContainerId::new(c.id.unwrap_or_default()),
                    name,
                    image: c.image.unwrap_or_default(),
                    state: ContainerState::from_engine(
                        &c.state.map(|s| format!("{:?}", s)).unwrap_or_default(),
                    ),
                    labels: c.labels.unwrap_or_default(),
                    ports,
                }
            })
            .filter(|info| filters.matches(info))
            .collect();

        Ok(infos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_read_from_push_status() {
        let status = "v1: digest: sha256:4c0b8d1a size: 1570";
        assert_eq!(
            digest_from_status(status).map(|d| d.to_string()),
            Some("sha256:4c0b8d1a".to_string())
        );
        assert!(digest_from_status("Pushing").is_none());
    }

    #[test]
    fn stream_messages_are_classified() {
        let failed = ImageError::PushFailed;
        assert!(matches!(
            classify_stream_message("unauthorized: authentication required", "x", failed),
            ImageError::AuthenticationFailed(_)
        ));
        assert!(classify_stream_message("read: connection reset by peer", "x", failed).is_transient());
        assert!(matches!(
            classify_stream_message("manifest invalid", "x", failed),
            ImageError::PushFailed(_)
        ));
    }

    #[test]
    fn server_statuses_are_classified() {
        let err = |status_code| EngineError::DockerResponseServerError {
            status_code,
            message: "boom".into(),
        };
        assert!(map_registry_error(err(503), "x", true).is_transient());
        assert!(matches!(
            map_registry_error(err(401), "x", true),
            ImageError::AuthenticationFailed(_)
        ));
        assert!(matches!(
            map_registry_error(err(404), "x", false),
            ImageError::NotFound(_)
        ));
    }

    #[test]
    fn bindings_round_back_to_mappings() {
        let mut bindings = HashMap::new();
        bindings.insert(
            "80/tcp".to_string(),
            Some(vec![PortBinding {
                host_ip: None,
                host_port: Some("8080".into()),
            }]),
        );
        assert_eq!(ports_from_bindings(&bindings), vec![PortMapping::tcp(8080, 80)]);
    }
}
