// ABOUTME: Runtime connection error types with SNAFU pattern.
// ABOUTME: Unifies SSH, detection and connection failures for programmatic handling.

use snafu::Snafu;

use super::detection::DetectionError;
use super::traits::RuntimeInfoError;

/// Failure to reach a container runtime, locally or through SSH.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum RuntimeError {
    #[snafu(display("SSH connection to {host} failed: {source}"))]
    Ssh {
        host: String,
        source: crate::ssh::Error,
    },

    #[snafu(display("runtime detection failed: {source}"))]
    Detection { source: DetectionError },

    #[snafu(display("runtime connection failed: {source}"))]
    Connection { source: RuntimeInfoError },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    /// No container runtime found on the host.
    NoRuntimeFound,
    /// SSH failure while connecting, detecting or tunnelling.
    SshError,
    /// Failed to connect to the runtime socket.
    ConnectionFailed,
    /// The runtime answered with an error.
    RuntimeOperation,
}

impl RuntimeError {
    pub fn kind(&self) -> RuntimeErrorKind {
        match self {
            RuntimeError::Ssh { .. } => RuntimeErrorKind::SshError,
            RuntimeError::Detection { source } => match source {
                DetectionError::NoRuntimeFound => RuntimeErrorKind::NoRuntimeFound,
                DetectionError::Ssh(_) => RuntimeErrorKind::SshError,
            },
            RuntimeError::Connection { source } => match source {
                RuntimeInfoError::ConnectionFailed(_) => RuntimeErrorKind::ConnectionFailed,
                RuntimeInfoError::Runtime(_) => RuntimeErrorKind::RuntimeOperation,
            },
        }
    }
}

impl From<DetectionError> for RuntimeError {
    fn from(source: DetectionError) -> Self {
        RuntimeError::Detection { source }
    }
}

impl From<RuntimeInfoError> for RuntimeError {
    fn from(source: RuntimeInfoError) -> Self {
        RuntimeError::Connection { source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_the_source() {
        let err: RuntimeError = DetectionError::NoRuntimeFound.into();
        assert_eq!(err.kind(), RuntimeErrorKind::NoRuntimeFound);

        let err: RuntimeError = RuntimeInfoError::ConnectionFailed("refused".into()).into();
        assert_eq!(err.kind(), RuntimeErrorKind::ConnectionFailed);
        assert!(err.to_string().contains("refused"));
    }
}
