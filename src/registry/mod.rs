// ABOUTME: Registry client: authenticate, push, pull and promote artifacts.
// ABOUTME: Push is idempotent by digest; moving a shared tag is an explicit promote.

mod credential;
mod daemon;
mod error;

pub use credential::Credential;
pub use daemon::DaemonRegistry;
pub use error::RegistryError;

use crate::types::{ArtifactReference, Digest, ImageRef};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

/// Registry host assumed for references without one.
pub const DEFAULT_REGISTRY: &str = "docker.io";

/// Host part of an image reference, defaulting to Docker Hub.
pub fn registry_host(image: &ImageRef) -> &str {
    image.registry().unwrap_or(DEFAULT_REGISTRY)
}

/// An authenticated conversation with one registry host.
#[derive(Debug, Clone)]
pub struct Session {
    host: String,
    credential: Arc<Credential>,
}

impl Session {
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }
}

/// An artifact the registry now holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedRef {
    pub host: String,
    pub artifact: ArtifactReference,
}

impl PublishedRef {
    pub fn digest(&self) -> &Digest {
        self.artifact.digest()
    }

    pub fn tag(&self) -> &str {
        self.artifact.tag()
    }

    /// What deploy pulls: `name@digest`.
    pub fn pinned(&self) -> ImageRef {
        self.artifact.pinned()
    }
}

/// An image present in the local daemon after a pull.
#[derive(Debug, Clone)]
pub struct LocalArtifact {
    pub reference: ImageRef,
}

#[async_trait]
pub trait RegistryClient: Send + Sync {
    async fn authenticate(
        &self,
        host: &str,
        credential: Arc<Credential>,
    ) -> Result<Session, RegistryError>;

    /// Pushing a digest the registry already has succeeds without uploading.
    async fn push(
        &self,
        session: &Session,
        artifact: &ArtifactReference,
    ) -> Result<PublishedRef, RegistryError>;

    async fn pull(&self, session: &Session, reference: &ImageRef)
    -> Result<LocalArtifact, RegistryError>;

    /// Point `tag` at the published digest with a single tag update.
    async fn promote(
        &self,
        session: &Session,
        published: &PublishedRef,
        tag: &str,
    ) -> Result<PublishedRef, RegistryError>;
}
