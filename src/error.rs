// ABOUTME: Application-wide error types for hoist.
// ABOUTME: Uses thiserror for ergonomic error handling.

use crate::pipeline::DefinitionError;
use crate::runtime::RuntimeError;
use crate::target::RunError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid pipeline definition: {0}")]
    Definition(#[from] DefinitionError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Target(#[from] RunError),

    #[error("no container named {name} on {host}")]
    NoSuchContainer { name: String, host: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
