// ABOUTME: Errors raised by deployment targets.
// ABOUTME: Name conflicts, engine failures, and misuse of an ephemeral runner.

use crate::retry::Transient;
use crate::runtime::{ContainerError, ContainerState, ImageError, RuntimeError};

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("container name {name} is already taken by a {state} container; stop it first")]
    NameConflict { name: String, state: ContainerState },

    #[error("failed to pull {reference}: {source}")]
    Pull {
        reference: String,
        #[source]
        source: ImageError,
    },

    #[error("pull of {reference} gave up after {attempts} attempts: {last}")]
    PullExhausted {
        reference: String,
        attempts: u32,
        last: Box<RunError>,
    },

    #[error("failed to create {name}: {source}")]
    Create {
        name: String,
        #[source]
        source: ContainerError,
    },

    #[error("failed to start {name}: {source}")]
    Start {
        name: String,
        #[source]
        source: ContainerError,
    },

    #[error("failed to stop {name}: {source}")]
    Stop {
        name: String,
        #[source]
        source: ContainerError,
    },

    #[error("failed to list containers: {0}")]
    List(#[source] ContainerError),

    #[error("teardown already scheduled on {host}; nothing new may run or register")]
    TeardownScheduled { host: String },

    /// Every instance was attempted; these are the ones that stayed behind.
    #[error("teardown on {host} left {} instance(s) behind", failures.len())]
    Teardown { host: String, failures: Vec<RunError> },

    #[error(transparent)]
    Connection(#[from] RuntimeError),
}

impl Transient for RunError {
    /// Only pulls are retried; container operations are not idempotent.
    fn is_transient(&self) -> bool {
        match self {
            RunError::Pull { source, .. } => source.is_transient(),
            _ => false,
        }
    }
}

impl RunError {
    /// Engine rejected the start because a host port is taken.
    pub fn is_port_conflict(&self) -> bool {
        matches!(
            self,
            RunError::Start {
                source: ContainerError::PortInUse(_),
                ..
            }
        )
    }
}
