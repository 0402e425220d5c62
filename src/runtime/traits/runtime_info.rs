// ABOUTME: Daemon reachability and version reporting.
// ABOUTME: Targets call this once after connecting; registry sessions ping before use.

use super::sealed::Sealed;
use super::shared_types::RuntimeMetadata;
use async_trait::async_trait;

#[async_trait]
pub trait RuntimeInfo: Sealed + Send + Sync {
    /// Engine name, version and platform, as reported by the daemon.
    async fn info(&self) -> Result<RuntimeMetadata, RuntimeInfoError>;

    /// Cheapest round trip that proves the daemon answers.
    async fn ping(&self) -> Result<(), RuntimeInfoError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RuntimeInfoError {
    /// Socket missing, tunnel closed, or daemon not listening.
    #[error("daemon unreachable: {0}")]
    ConnectionFailed(String),

    #[error("daemon error: {0}")]
    Runtime(String),
}
