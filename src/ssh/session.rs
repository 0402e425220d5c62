// ABOUTME: SSH session management using russh.
// ABOUTME: Connects, verifies the host key, authenticates, and runs commands.

use super::error::{Error, Result};
use super::tunnel::Tunnel;
use russh::client::{self, Config, Handle};
use russh::keys::agent::client::AgentClient;
use russh::keys::known_hosts::{
    check_known_hosts, check_known_hosts_path, learn_known_hosts, learn_known_hosts_path,
};
use russh::keys::{PrivateKeyWithHashAlg, load_secret_key, ssh_key};
use russh::{ChannelMsg, Disconnect};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// How to reach and authenticate to a host.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    /// Private key; `None` tries the agent, then `~/.ssh/id_*`.
    pub key_path: Option<PathBuf>,
    /// Accept and record unknown host keys.
    pub trust_on_first_use: bool,
    /// Defaults to `~/.ssh/known_hosts`.
    pub known_hosts_path: Option<PathBuf>,
    pub connect_timeout: Duration,
    pub command_timeout: Duration,
}

impl SessionConfig {
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 22,
            user: user.into(),
            key_path: None,
            trust_on_first_use: false,
            known_hosts_path: None,
            connect_timeout: Duration::from_secs(30),
            command_timeout: Duration::from_secs(60),
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn key_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_path = Some(path.into());
        self
    }

    pub fn trust_on_first_use(mut self, tofu: bool) -> Self {
        self.trust_on_first_use = tofu;
        self
    }
}

/// Output from a remote command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: u32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Host key policy: known_hosts first, optional trust-on-first-use.
pub(crate) struct HostKeyCheck {
    host: String,
    port: u16,
    trust_on_first_use: bool,
    known_hosts_path: Option<PathBuf>,
}

impl client::Handler for HostKeyCheck {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &ssh_key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        let known = match &self.known_hosts_path {
            Some(path) => check_known_hosts_path(&self.host, self.port, server_public_key, path),
            None => check_known_hosts(&self.host, self.port, server_public_key),
        };

        match known {
            Ok(true) => Ok(true),
            Err(russh::keys::Error::KeyChanged { .. }) => {
                tracing::error!(host = %self.host, "host key changed; refusing to connect");
                Ok(false)
            }
            Ok(false) | Err(_) if self.trust_on_first_use => {
                tracing::warn!(host = %self.host, port = self.port, "trusting unknown host key");
                let learned = match &self.known_hosts_path {
                    Some(path) => {
                        learn_known_hosts_path(&self.host, self.port, server_public_key, path)
                    }
                    None => learn_known_hosts(&self.host, self.port, server_public_key),
                };
                if let Err(e) = learned {
                    tracing::warn!("could not record host key: {}", e);
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

enum Identity {
    Agent(AgentClient<tokio::net::UnixStream>),
    Key(Arc<ssh_key::PrivateKey>),
}

/// An authenticated SSH connection.
pub struct Session {
    config: SessionConfig,
    handle: Arc<Handle<HostKeyCheck>>,
    tunnels: parking_lot::Mutex<Vec<Tunnel>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("user", &self.config.user)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub async fn connect(config: SessionConfig) -> Result<Self> {
        let identity = resolve_identity(&config).await?;

        let russh_config = Config {
            inactivity_timeout: Some(Duration::from_secs(60)),
            ..Default::default()
        };
        let check = HostKeyCheck {
            host: config.host.clone(),
            port: config.port,
            trust_on_first_use: config.trust_on_first_use,
            known_hosts_path: config.known_hosts_path.clone(),
        };

        let connecting = client::connect(
            Arc::new(russh_config),
            (config.host.as_str(), config.port),
            check,
        );
        let mut handle = tokio::time::timeout(config.connect_timeout, connecting)
            .await
            .map_err(|_| {
                Error::Connection(format!(
                    "{}:{} did not answer within {:?}",
                    config.host, config.port, config.connect_timeout
                ))
            })?
            .map_err(|e| Error::Connection(format!("{}:{}: {}", config.host, config.port, e)))?;

        if !authenticate(&mut handle, &config.user, identity).await? {
            return Err(Error::AuthenticationFailed(config.user.clone()));
        }

        tracing::debug!(host = %config.host, user = %config.user, "SSH session established");
        Ok(Self {
            config,
            handle: Arc::new(handle),
            tunnels: parking_lot::Mutex::new(Vec::new()),
        })
    }

    pub fn host(&self) -> &str {
        &self.config.host
    }

    /// True if `path` exists on the remote host.
    pub async fn file_exists(&self, path: &str) -> Result<bool> {
        let output = self.exec(&format!("test -e '{}'", path.replace('\'', ""))).await?;
        Ok(output.success())
    }

    /// Run a command, bounded by the configured command timeout.
    pub async fn exec(&self, command: &str) -> Result<CommandOutput> {
        let timeout = self.config.command_timeout;
        tokio::time::timeout(timeout, self.exec_inner(command))
            .await
            .map_err(|_| Error::CommandTimeout(timeout))?
    }

    async fn exec_inner(&self, command: &str) -> Result<CommandOutput> {
        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| Error::CommandFailed(format!("failed to open channel: {}", e)))?;
        channel.exec(true, command).await?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_code = None;
        let mut eof = false;

        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { data } => stdout.extend_from_slice(&data),
                ChannelMsg::ExtendedData { data, ext: 1 } => stderr.extend_from_slice(&data),
                ChannelMsg::ExitStatus { exit_status } => {
                    exit_code = Some(exit_status);
                    if eof {
                        break;
                    }
                }
                ChannelMsg::Eof => {
                    eof = true;
                    if exit_code.is_some() {
                        break;
                    }
                }
                ChannelMsg::Close => break,
                _ => {}
            }
        }

        let exit_code = exit_code.ok_or(Error::ChannelClosed)?;
        Ok(CommandOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }

    /// Expose a remote unix socket as a local one. Returns the local path.
    pub async fn forward_socket(&self, remote_socket: &str) -> Result<String> {
        let tunnel = Tunnel::open(Arc::clone(&self.handle), remote_socket).await?;
        let path = tunnel.local_path().to_string_lossy().into_owned();
        self.tunnels.lock().push(tunnel);
        Ok(path)
    }

    /// Close tunnels, then the connection.
    pub async fn disconnect(self) -> Result<()> {
        let tunnels: Vec<_> = self.tunnels.lock().drain(..).collect();
        for tunnel in tunnels {
            tunnel.close();
        }
        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await?;
        Ok(())
    }
}

async fn resolve_identity(config: &SessionConfig) -> Result<Identity> {
    if let Some(path) = &config.key_path {
        let key = load_secret_key(path, None).map_err(|e| Error::KeyLoadFailed {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        return Ok(Identity::Key(Arc::new(key)));
    }

    if let Ok(agent) = AgentClient::connect_env().await {
        return Ok(Identity::Agent(agent));
    }

    let home = std::env::var("HOME")
        .map_err(|_| Error::NoIdentity("no SSH agent and HOME is not set".to_string()))?;
    ["id_ed25519", "id_ecdsa", "id_rsa"]
        .iter()
        .map(|name| PathBuf::from(&home).join(".ssh").join(name))
        .find_map(|path| load_secret_key(&path, None).ok())
        .map(|key| Identity::Key(Arc::new(key)))
        .ok_or_else(|| Error::NoIdentity("no SSH agent and no default key found".to_string()))
}

async fn authenticate(
    handle: &mut Handle<HostKeyCheck>,
    user: &str,
    identity: Identity,
) -> Result<bool> {
    match identity {
        Identity::Agent(mut agent) => {
            let keys = agent
                .request_identities()
                .await
                .map_err(|e| Error::NoIdentity(format!("agent refused to list keys: {}", e)))?;
            for key in keys {
                if let Ok(result) = handle
                    .authenticate_publickey_with(user, key, None, &mut agent)
                    .await
                    && result.success()
                {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Identity::Key(key) => {
            let hash_alg = handle.best_supported_rsa_hash().await?.flatten();
            let result = handle
                .authenticate_publickey(user, PrivateKeyWithHashAlg::new(key, hash_alg))
                .await?;
            Ok(result.success())
        }
    }
}
