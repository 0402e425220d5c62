// ABOUTME: Container runtime access for Docker and Podman.
// ABOUTME: Capability traits, the Engine API client, an in-memory runtime, and socket detection.

mod bollard;
mod detection;
mod error;
mod memory;
mod traits;
mod types;

pub use self::bollard::BollardRuntime;
pub use detection::{DetectionError, detect_local, detect_remote};
pub use error::{RuntimeError, RuntimeErrorKind};
pub use memory::{InMemoryRuntime, SimulatedRegistry};
pub use traits::*;
pub use types::{DetectedRuntime, RuntimeConfig, RuntimeType};
