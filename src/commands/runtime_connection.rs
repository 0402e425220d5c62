// ABOUTME: Shared helper for wiring a run to real or simulated runtimes.
// ABOUTME: Used by the run and stop commands to reach the configured target.

use hoist::build::{ArtifactBuilder, SimulatedBuilder};
use hoist::cancel::CancelToken;
use hoist::config::{Config, TargetKind};
use hoist::diagnostics::Warning;
use hoist::error::{Error, Result};
use hoist::output::Output;
use hoist::pipeline::Components;
use hoist::probe::{HttpProbe, SimulatedProbe};
use hoist::registry::DaemonRegistry;
use hoist::runtime::{
    BollardRuntime, InMemoryRuntime, RuntimeError, SimulatedRegistry, detect_local,
};
use hoist::target::{DeploymentTarget, EphemeralRunnerTarget, LocalDaemonTarget, RemoteHostTarget};
use std::sync::Arc;

/// A deployment target plus whatever must be closed when the command ends.
pub struct Connection {
    pub target: Arc<dyn DeploymentTarget>,
    remote: Option<Arc<RemoteHostTarget>>,
}

impl Connection {
    fn durable(target: Arc<dyn DeploymentTarget>) -> Self {
        Self {
            target,
            remote: None,
        }
    }

    /// Close the SSH tunnel, if any. Failure is only worth a warning.
    pub async fn close(self) -> Option<Warning> {
        let remote = self.remote?;
        match remote.disconnect().await {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!(host = remote.host(), error = %e, "SSH disconnect failed");
                Some(Warning::ssh_disconnect(format!(
                    "failed to close SSH session to {}: {}",
                    remote.host(),
                    e
                )))
            }
        }
    }
}

/// The daemon on this machine. Builds and pushes always happen here.
fn local_runtime(config: &Config) -> Result<Arc<BollardRuntime>> {
    let overrides = match config.target.kind {
        TargetKind::Remote => None,
        _ => config.target.runtime_config(),
    };
    let found = detect_local(overrides.as_ref()).map_err(RuntimeError::from)?;
    let runtime = BollardRuntime::connect(&found).map_err(RuntimeError::from)?;
    tracing::debug!(runtime = %found.runtime_type, socket = %found.socket_path, "local runtime");
    Ok(Arc::new(runtime))
}

/// Connect to the configured target.
pub async fn connect_target(config: &Config, output: &Output) -> Result<Connection> {
    let service = config.service.as_str();
    let runtime_config = config.target.runtime_config();

    match config.target.kind {
        TargetKind::Local => {
            output.progress("  → Connecting to local runtime...");
            let target = LocalDaemonTarget::connect(runtime_config.as_ref(), service)?;
            Ok(Connection::durable(Arc::new(target)))
        }
        TargetKind::Ephemeral => {
            output.progress("  → Connecting to runner runtime...");
            let target = EphemeralRunnerTarget::new(local_runtime(config)?, service);
            Ok(Connection::durable(Arc::new(target)))
        }
        TargetKind::Remote => {
            let server = config.target.server.as_ref().ok_or_else(|| {
                Error::InvalidConfig("target.server is required for remote targets".to_string())
            })?;
            output.progress(&format!("  → Connecting to {}...", server.host));
            let remote = Arc::new(
                RemoteHostTarget::connect(server.session_config(), runtime_config.as_ref(), service)
                    .await?,
            );
            Ok(Connection {
                target: remote.clone(),
                remote: Some(remote),
            })
        }
    }
}

/// Real components: the external build tool, the local daemon for registry
/// traffic, and HTTP probes.
pub async fn live_components(
    config: &Config,
    cancel: &CancelToken,
    output: &Output,
) -> Result<(Components, Connection)> {
    let connection = connect_target(config, output).await?;
    let builder = ArtifactBuilder::new(&config.build.tool).timeout(config.build.timeout);
    let registry = DaemonRegistry::new(
        local_runtime(config)?,
        config.image.clone(),
        config.retry.policy(),
        cancel.clone(),
    );

    let components = Components {
        builder: Arc::new(builder),
        registry: Arc::new(registry),
        target: Arc::clone(&connection.target),
        probe: Arc::new(HttpProbe::new()),
    };
    Ok((components, connection))
}

/// In-memory components: nothing is built, pushed, or started for real.
pub fn simulated_components(config: &Config, cancel: &CancelToken) -> (Components, Connection) {
    let registry = SimulatedRegistry::new();
    let build_host = Arc::new(InMemoryRuntime::with_registry(Arc::clone(&registry)));
    let deploy_host = Arc::new(InMemoryRuntime::with_registry(registry));
    let service = config.service.as_str();

    let target: Arc<dyn DeploymentTarget> = match config.target.kind {
        TargetKind::Local => Arc::new(LocalDaemonTarget::new(deploy_host, service)),
        TargetKind::Ephemeral => Arc::new(EphemeralRunnerTarget::new(deploy_host, service)),
        TargetKind::Remote => {
            let host = config
                .target
                .server
                .as_ref()
                .map(|s| s.host.as_str())
                .unwrap_or("localhost");
            Arc::new(LocalDaemonTarget::on_host(deploy_host, host, service))
        }
    };

    let components = Components {
        builder: Arc::new(SimulatedBuilder::new(Arc::clone(&build_host))),
        registry: Arc::new(DaemonRegistry::new(
            build_host,
            config.image.clone(),
            config.retry.policy(),
            cancel.clone(),
        )),
        target: Arc::clone(&target),
        probe: Arc::new(SimulatedProbe),
    };
    (components, Connection::durable(target))
}
