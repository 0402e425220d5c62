// ABOUTME: Configuration types and parsing for hoist.yml.
// ABOUTME: Handles YAML parsing, env var interpolation, defaults and graph validation.

mod build;
mod deserialize;
mod env_value;
mod init;
mod jobs;
mod registry;
mod server;
mod target;
mod trigger;
mod verify;

pub use build::BuildConfig;
pub use env_value::{EnvValue, resolve_env_map};
pub use init::init_config;
pub use jobs::{JobEntry, JobsConfig};
pub use registry::RegistryConfig;
pub use server::ServerConfig;
pub use target::{TargetConfig, TargetKind};
pub use trigger::TriggerConfig;
pub use verify::{RetryConfig, VerifyConfig};

use crate::error::{Error, Result};
use crate::pipeline::{JobGraph, JobKind};
use crate::runtime::PortMapping;
use crate::types::{ImageRef, ServiceName};
use deserialize::{deserialize_image_ref, deserialize_ports, deserialize_service_name};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_FILENAME: &str = "hoist.yml";
pub const CONFIG_FILENAME_ALT: &str = "hoist.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".hoist/config.yml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(deserialize_with = "deserialize_service_name")]
    pub service: ServiceName,

    #[serde(deserialize_with = "deserialize_image_ref")]
    pub image: ImageRef,

    #[serde(default)]
    pub build: BuildConfig,

    #[serde(default)]
    pub registry: RegistryConfig,

    #[serde(default)]
    pub target: TargetConfig,

    #[serde(default, deserialize_with = "deserialize_ports")]
    pub ports: Vec<PortMapping>,

    #[serde(default)]
    pub verify: VerifyConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    /// Tag to move onto the published digest; adds a promote job.
    #[serde(default)]
    pub promote: Option<String>,

    #[serde(default)]
    pub trigger: Option<TriggerConfig>,

    #[serde(default)]
    pub jobs: JobsConfig,
}

impl Config {
    /// Parse and validate. The job graph is checked here so a bad
    /// definition never reaches the orchestrator.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// First of `hoist.yml`, `hoist.yaml`, `.hoist/config.yml` in `dir`.
    pub fn locate(dir: &Path) -> Result<PathBuf> {
        [CONFIG_FILENAME, CONFIG_FILENAME_ALT, CONFIG_FILENAME_DIR]
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.exists())
            .ok_or_else(|| Error::ConfigNotFound(dir.to_path_buf()))
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        Self::load(&Self::locate(dir)?)
    }

    /// The job graph: the `jobs` section if present, else the standard chain.
    pub fn graph(&self) -> Result<JobGraph> {
        let graph = if self.jobs.is_empty() {
            JobGraph::standard(self.promote.is_some())?
        } else {
            self.jobs.graph()?
        };
        Ok(graph)
    }

    /// Whether a run on `branch` should proceed. No branch always runs.
    pub fn triggered_by(&self, branch: Option<&str>) -> bool {
        match (&self.trigger, branch) {
            (Some(trigger), Some(branch)) => trigger.allows(branch),
            _ => true,
        }
    }

    /// Build context directory, resolved against the config file's directory.
    pub fn context_dir(&self, base: &Path) -> PathBuf {
        base.join(&self.build.context)
    }

    fn validate(&self) -> Result<()> {
        let graph = self.graph()?;

        if self.target.kind == TargetKind::Remote && self.target.server.is_none() {
            return Err(Error::InvalidConfig(
                "target.server is required when target.kind is remote".to_string(),
            ));
        }
        if self.retry.attempts == 0 {
            return Err(Error::InvalidConfig("retry.attempts must be at least 1".to_string()));
        }
        if self.verify.interval.is_zero() {
            return Err(Error::InvalidConfig("verify.interval must be positive".to_string()));
        }

        let promotes = graph.jobs().iter().any(|j| j.kind == JobKind::Promote);
        match &self.promote {
            Some(tag) => {
                self.image
                    .with_tag(tag)
                    .map_err(|e| Error::InvalidConfig(format!("promote: {}", e)))?;
            }
            None if promotes => {
                return Err(Error::InvalidConfig(
                    "a promote job needs `promote: <tag>`".to_string(),
                ));
            }
            None => {}
        }

        let verifies = graph.jobs().iter().any(|j| j.kind == JobKind::Verify);
        if verifies && self.verify.port.is_none() && self.ports.is_empty() {
            return Err(Error::InvalidConfig(
                "verify needs a port: set verify.port or publish one in ports".to_string(),
            ));
        }
        Ok(())
    }

    pub fn template() -> Self {
        Config {
            service: ServiceName::new("my-app").expect("template service name is valid"),
            image: ImageRef::parse("registry.example.com/my-app").expect("template image is valid"),
            build: BuildConfig::default(),
            registry: RegistryConfig::default(),
            target: TargetConfig::default(),
            ports: vec![PortMapping::tcp(80, 80)],
            verify: VerifyConfig::default(),
            retry: RetryConfig::default(),
            promote: None,
            trigger: None,
            jobs: JobsConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = "service: web\nimage: registry.example.com/acme/web\nports: ['80:80']\n";

    #[test]
    fn minimal_config_gets_the_standard_graph() {
        let config = Config::from_yaml(MINIMAL).unwrap();
        let order: Vec<_> = config
            .graph()
            .unwrap()
            .jobs()
            .iter()
            .map(|j| j.id.to_string())
            .collect();
        assert_eq!(order, ["build", "publish", "deploy", "verify"]);
        assert_eq!(config.build.tool, "docker");
        assert_eq!(config.target.kind, TargetKind::Local);
    }

    #[test]
    fn promote_tag_adds_a_job() {
        let yaml = format!("{MINIMAL}promote: latest\n");
        let config = Config::from_yaml(&yaml).unwrap();
        assert_eq!(config.graph().unwrap().len(), 5);
    }

    #[test]
    fn remote_target_needs_a_server() {
        let yaml = format!("{MINIMAL}target: {{ kind: remote }}\n");
        assert!(matches!(Config::from_yaml(&yaml), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn bad_graph_fails_at_load() {
        let yaml = format!("{MINIMAL}jobs:\n  deploy: {{ uses: deploy }}\n");
        assert!(matches!(Config::from_yaml(&yaml), Err(Error::Definition(_))));
    }

    #[test]
    fn no_branch_always_triggers() {
        let yaml = format!("{MINIMAL}trigger: {{ branches: [main] }}\n");
        let config = Config::from_yaml(&yaml).unwrap();
        assert!(config.triggered_by(None));
        assert!(config.triggered_by(Some("main")));
        assert!(!config.triggered_by(Some("dev")));
    }
}
