// ABOUTME: Verification and retry sections.
// ABOUTME: Probe target and budget, plus the backoff shared by registry calls.

use crate::pipeline::VerifySettings;
use crate::retry::RetryPolicy;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyConfig {
    #[serde(default = "default_path")]
    pub path: String,

    /// Probe this host instead of the deployed instance's.
    #[serde(default)]
    pub host: Option<String>,

    /// Defaults to the first published host port.
    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    #[serde(default = "default_interval", with = "humantime_serde")]
    pub interval: Duration,
}

fn default_path() -> String {
    "/".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_interval() -> Duration {
    Duration::from_secs(1)
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            host: None,
            port: None,
            timeout: default_timeout(),
            interval: default_interval(),
        }
    }
}

impl VerifyConfig {
    pub fn settings(&self) -> VerifySettings {
        VerifySettings {
            path: self.path.clone(),
            host: self.host.clone(),
            port: self.port,
            timeout: self.timeout,
            interval: self.interval,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_attempts")]
    pub attempts: u32,

    #[serde(default = "default_base_delay", with = "humantime_serde")]
    pub base_delay: Duration,

    #[serde(default = "default_max_delay", with = "humantime_serde")]
    pub max_delay: Duration,
}

fn default_attempts() -> u32 {
    3
}

fn default_base_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            base_delay: default_base_delay(),
            max_delay: default_max_delay(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.attempts,
            base_delay: self.base_delay,
            max_delay: self.max_delay,
        }
    }
}
