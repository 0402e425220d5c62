// ABOUTME: Registry errors, split into transient (retried) and permanent.
// ABOUTME: Wraps the runtime's image errors with the reference involved.

use crate::retry::Transient;
use crate::runtime::ImageError;
use crate::types::Digest;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("authentication to {host} failed: {reason}")]
    Auth {
        host: String,
        reason: String,
        transient: bool,
    },

    #[error("credential for {bound} cannot be presented to {host}")]
    HostMismatch { bound: String, host: String },

    #[error("push of {reference} failed: {source}")]
    Push {
        reference: String,
        source: ImageError,
    },

    #[error("pull of {reference} failed: {source}")]
    Pull {
        reference: String,
        source: ImageError,
    },

    #[error("promote to {reference} failed: {source}")]
    Promote {
        reference: String,
        source: ImageError,
    },

    #[error("registry holds {actual} under {reference}, expected {expected}")]
    DigestMismatch {
        reference: String,
        expected: Digest,
        actual: Digest,
    },

    #[error("{operation} gave up after {attempts} attempts: {last}")]
    Exhausted {
        operation: &'static str,
        attempts: u32,
        last: Box<RegistryError>,
    },

    #[error("{0} cancelled")]
    Cancelled(&'static str),
}

impl Transient for RegistryError {
    fn is_transient(&self) -> bool {
        match self {
            RegistryError::Auth { transient, .. } => *transient,
            RegistryError::Push { source, .. }
            | RegistryError::Pull { source, .. }
            | RegistryError::Promote { source, .. } => source.is_transient(),
            _ => false,
        }
    }
}
