// ABOUTME: Server configuration for SSH connections.
// ABOUTME: Parses formats like "host", "user@host", "host:port", "user@host:port".

use crate::ssh::SessionConfig;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub user: Option<String>,
    /// Private key file; the agent and `~/.ssh/id_*` are tried otherwise.
    #[serde(default)]
    pub key: Option<PathBuf>,
    #[serde(default)]
    pub trust_first_connection: bool,
}

fn default_port() -> u16 {
    22
}

impl ServerConfig {
    pub fn parse(s: &str) -> Result<Self, String> {
        let s = s.trim();
        if s.is_empty() {
            return Err("server address cannot be empty".to_string());
        }

        // [user@]host[:port]
        let (user, rest) = match s.split_once('@') {
            Some((user, _)) if user.is_empty() => return Err("user cannot be empty".to_string()),
            Some((user, rest)) => (Some(user), rest),
            None => (None, s),
        };

        let (host, port) = match rest.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| format!("invalid port: {}", port))?;
                (host, port)
            }
            None => (rest, default_port()),
        };

        if host.is_empty() {
            return Err("hostname cannot be empty".to_string());
        }

        Ok(ServerConfig {
            host: host.to_string(),
            port,
            user: user.map(str::to_string),
            key: None,
            trust_first_connection: false,
        })
    }

    /// SSH settings for this server. The login defaults to `$USER`.
    pub fn session_config(&self) -> SessionConfig {
        let user = self
            .user
            .clone()
            .or_else(|| std::env::var("USER").ok())
            .unwrap_or_else(|| "root".to_string());
        let mut config = SessionConfig::new(self.host.clone(), user)
            .port(self.port)
            .trust_on_first_use(self.trust_first_connection);
        if let Some(key) = &self.key {
            config = config.key_path(key.clone());
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_short_form() {
        let s = ServerConfig::parse("web1.example.com").unwrap();
        assert_eq!((s.host.as_str(), s.port, s.user.as_deref()), ("web1.example.com", 22, None));

        let s = ServerConfig::parse("deploy@web1.example.com:2222").unwrap();
        assert_eq!(s.user.as_deref(), Some("deploy"));
        assert_eq!(s.port, 2222);
    }

    #[test]
    fn rejects_bad_addresses() {
        assert!(ServerConfig::parse("").is_err());
        assert!(ServerConfig::parse("@host").is_err());
        assert!(ServerConfig::parse("host:ssh").is_err());
        assert!(ServerConfig::parse("deploy@:22").is_err());
    }

    #[test]
    fn session_config_carries_port_and_user() {
        let s = ServerConfig::parse("deploy@web1:2222").unwrap();
        let cfg = s.session_config();
        assert_eq!(cfg.user, "deploy");
        assert_eq!(cfg.port, 2222);
        assert!(!cfg.trust_on_first_use);
    }
}
