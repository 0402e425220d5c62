// ABOUTME: Failures of the SSH session that carries remote deployments.
// ABOUTME: Wrapped into RuntimeError::Ssh together with the host name.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot reach SSH server: {0}")]
    Connection(String),

    #[error("authentication failed for user {0}: no key was accepted")]
    AuthenticationFailed(String),

    #[error("no usable SSH identity: {0}")]
    NoIdentity(String),

    #[error("failed to load key from {path}: {reason}")]
    KeyLoadFailed { path: PathBuf, reason: String },

    #[error("remote command failed: {0}")]
    CommandFailed(String),

    #[error("remote command gave no answer within {0:?}")]
    CommandTimeout(std::time::Duration),

    #[error("channel closed without an exit status")]
    ChannelClosed,

    /// Forwarding the daemon socket was refused or broke.
    #[error("socket forward to {remote} failed: {reason}")]
    Tunnel { remote: String, reason: String },

    #[error("SSH protocol error: {0}")]
    Protocol(#[from] russh::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
