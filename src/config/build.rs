// ABOUTME: Build section: context directory, recipe file, tool and build args.
// ABOUTME: Args may read from the environment like any other secret.

use super::env_value::EnvValue;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct BuildConfig {
    #[serde(default = "default_context")]
    pub context: PathBuf,

    /// Relative to `context`.
    #[serde(default = "default_recipe")]
    pub recipe: PathBuf,

    /// `docker`, `podman`, `buildah`, or a path to a compatible binary.
    #[serde(default = "default_tool")]
    pub tool: String,

    #[serde(default)]
    pub args: BTreeMap<String, EnvValue>,

    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

fn default_context() -> PathBuf {
    PathBuf::from(".")
}

fn default_recipe() -> PathBuf {
    PathBuf::from("Dockerfile")
}

fn default_tool() -> String {
    "docker".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(30 * 60)
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            context: default_context(),
            recipe: default_recipe(),
            tool: default_tool(),
            args: BTreeMap::new(),
            timeout: default_timeout(),
        }
    }
}
