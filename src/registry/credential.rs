// ABOUTME: Registry credential bound to one host.
// ABOUTME: Never printed: Debug redacts the secret and there is no Display or Serialize.

use crate::runtime::RegistryAuth;
use std::fmt;

pub struct Credential {
    host: String,
    login: Option<Login>,
}

struct Login {
    username: String,
    secret: String,
}

impl Credential {
    /// No login; pushes and pulls go out unauthenticated.
    pub fn anonymous(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            login: None,
        }
    }

    pub fn basic(
        host: impl Into<String>,
        username: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            login: Some(Login {
                username: username.into(),
                secret: secret.into(),
            }),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn username(&self) -> Option<&str> {
        self.login.as_ref().map(|l| l.username.as_str())
    }

    pub fn is_anonymous(&self) -> bool {
        self.login.is_none()
    }

    /// True if this credential may be presented to `host`.
    pub fn is_bound_to(&self, host: &str) -> bool {
        self.host.eq_ignore_ascii_case(host)
    }

    pub(crate) fn auth(&self) -> Option<RegistryAuth> {
        self.login.as_ref().map(|l| RegistryAuth {
            username: l.username.clone(),
            password: l.secret.clone(),
            server: Some(self.host.clone()),
        })
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("host", &self.host)
            .field("username", &self.username())
            .field("secret", &self.login.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_never_shows_secret() {
        let cred = Credential::basic("ghcr.io", "ci-bot", "s3cr3t-token");
        let debug = format!("{:?}", cred);
        assert!(debug.contains("ci-bot"));
        assert!(!debug.contains("s3cr3t-token"));
    }

    #[test]
    fn host_binding_ignores_case() {
        let cred = Credential::anonymous("Registry.Example.com");
        assert!(cred.is_bound_to("registry.example.com"));
        assert!(!cred.is_bound_to("ghcr.io"));
    }
}
