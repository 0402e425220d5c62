// ABOUTME: Runtime socket detection for local and remote hosts.
// ABOUTME: Checks Podman rootless, Podman rootful, then Docker.

use super::types::{DetectedRuntime, RuntimeConfig, RuntimeType};
use crate::ssh::Session;
use std::path::Path;

/// Error during runtime detection.
#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    #[error("no container runtime found (checked Podman and Docker sockets)")]
    NoRuntimeFound,

    #[error("SSH error: {0}")]
    Ssh(#[from] crate::ssh::Error),
}

const ROOTFUL_PODMAN: &str = "/run/podman/podman.sock";
const DOCKER_SOCKET: &str = "/var/run/docker.sock";

fn rootless_podman(uid: &str) -> String {
    format!("/run/user/{}/podman/podman.sock", uid)
}

fn default_socket_path(runtime: RuntimeType) -> &'static str {
    match runtime {
        RuntimeType::Docker => DOCKER_SOCKET,
        RuntimeType::Podman => ROOTFUL_PODMAN,
    }
}

/// Candidate sockets in probe order.
fn candidates(uid: Option<&str>) -> Vec<(RuntimeType, String)> {
    let mut out = Vec::with_capacity(3);
    if let Some(uid) = uid {
        out.push((RuntimeType::Podman, rootless_podman(uid)));
    }
    out.push((RuntimeType::Podman, ROOTFUL_PODMAN.to_string()));
    out.push((RuntimeType::Docker, DOCKER_SOCKET.to_string()));
    out
}

fn explicit(config: Option<&RuntimeConfig>) -> Option<DetectedRuntime> {
    let cfg = config?;
    match (cfg.runtime, &cfg.socket) {
        (Some(runtime_type), socket) => Some(DetectedRuntime {
            runtime_type,
            socket_path: socket
                .clone()
                .unwrap_or_else(|| default_socket_path(runtime_type).to_string()),
        }),
        // A bare socket path is assumed to speak the Docker API.
        (None, Some(socket)) => Some(DetectedRuntime {
            runtime_type: RuntimeType::Docker,
            socket_path: socket.clone(),
        }),
        (None, None) => None,
    }
}

/// Detect the container runtime on this machine.
pub fn detect_local(config: Option<&RuntimeConfig>) -> Result<DetectedRuntime, DetectionError> {
    if let Some(found) = explicit(config) {
        return Ok(found);
    }

    let uid = local_uid();
    candidates(uid.as_deref())
        .into_iter()
        .find(|(_, path)| Path::new(path).exists())
        .map(|(runtime_type, socket_path)| DetectedRuntime {
            runtime_type,
            socket_path,
        })
        .ok_or(DetectionError::NoRuntimeFound)
}

fn local_uid() -> Option<String> {
    std::env::var("UID").ok().or_else(|| {
        std::fs::read_to_string("/proc/self/status")
            .ok()
            .and_then(|s| {
                s.lines()
                    .find(|l| l.starts_with("Uid:"))
                    .and_then(|l| l.split_whitespace().nth(1))
                    .map(|s| s.to_string())
            })
    })
}

/// Detect the container runtime on a remote host over SSH.
pub async fn detect_remote(
    session: &Session,
    config: Option<&RuntimeConfig>,
) -> Result<DetectedRuntime, DetectionError> {
    if let Some(found) = explicit(config) {
        return Ok(found);
    }

    let uid_output = session.exec("id -u").await?;
    let uid = uid_output
        .success()
        .then(|| uid_output.stdout.trim().to_string());

    for (runtime_type, socket_path) in candidates(uid.as_deref()) {
        if session.file_exists(&socket_path).await? {
            return Ok(DetectedRuntime {
                runtime_type,
                socket_path,
            });
        }
    }

    Err(DetectionError::NoRuntimeFound)
}
