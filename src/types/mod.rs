// ABOUTME: Validated domain types shared across the build, publish and deploy stages.
// ABOUTME: Image references, digests, job ids, service names and runtime ids.

mod artifact;
mod digest;
mod id;
mod image_ref;
mod job_id;
mod service_name;

pub use artifact::ArtifactReference;
pub use digest::{Digest, DigestError};
pub use id::{ContainerId, ContainerKind, Id, IdKind};
pub use image_ref::{ImageRef, ParseImageRefError};
pub use job_id::{JobId, JobIdError};
pub use service_name::{ServiceName, ServiceNameError};
