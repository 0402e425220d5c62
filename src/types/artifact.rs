// ABOUTME: ArtifactReference: an image repository, a mutable tag, and its digest.
// ABOUTME: The digest is the identity; name:tag is only an alias.

use super::{Digest, ImageRef};
use serde::{Serialize, Serializer};
use std::fmt;

/// A built or published image.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactReference {
    repository: ImageRef,
    tag: String,
    digest: Digest,
}

impl ArtifactReference {
    /// `image` supplies the repository; any tag or digest on it is replaced.
    pub fn new(image: &ImageRef, tag: impl Into<String>, digest: Digest) -> Self {
        let tag = tag.into();
        Self {
            repository: image.with_digest(digest.clone()),
            tag,
            digest,
        }
    }

    pub fn name(&self) -> String {
        self.repository.repository()
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn digest(&self) -> &Digest {
        &self.digest
    }

    /// `name@digest`: always resolves to the same content.
    pub fn pinned(&self) -> ImageRef {
        self.repository.clone()
    }

    /// `name:tag`: resolves to whatever the tag points at right now.
    pub fn tagged(&self) -> ImageRef {
        // The tag was validated when the alias was created.
        self.repository
            .with_tag(&self.tag)
            .unwrap_or_else(|_| self.repository.clone())
    }

    /// Same content under another tag.
    pub fn retagged(&self, tag: impl Into<String>) -> Self {
        Self {
            repository: self.repository.clone(),
            tag: tag.into(),
            digest: self.digest.clone(),
        }
    }
}

impl fmt::Display for ArtifactReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}@{}", self.name(), self.tag, self.digest)
    }
}

impl Serialize for ArtifactReference {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
