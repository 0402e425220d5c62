// ABOUTME: Registry section and credential resolution.
// ABOUTME: Login values come from the environment; the result is bound to one host.

use super::env_value::EnvValue;
use crate::diagnostics::Warning;
use crate::error::{Error, Result};
use crate::registry::{Credential, registry_host};
use crate::types::ImageRef;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistryConfig {
    /// Defaults to the host in `image`, or Docker Hub.
    #[serde(default)]
    pub host: Option<String>,

    #[serde(default)]
    pub username: Option<EnvValue>,

    #[serde(default)]
    pub password: Option<EnvValue>,
}

impl RegistryConfig {
    pub fn host<'a>(&'a self, image: &'a ImageRef) -> &'a str {
        self.host.as_deref().unwrap_or_else(|| registry_host(image))
    }

    /// Resolve the login for `image`'s registry.
    pub fn credential(&self, image: &ImageRef) -> Result<Credential> {
        let host = self.host(image);
        match (&self.username, &self.password) {
            (Some(user), Some(secret)) => Ok(Credential::basic(host, user.resolve()?, secret.resolve()?)),
            (None, None) => Ok(Credential::anonymous(host)),
            _ => Err(Error::InvalidConfig(
                "registry.username and registry.password must be set together".to_string(),
            )),
        }
    }

    /// Like `credential`, but an unset variable falls back to anonymous
    /// access with a warning instead of failing. Used for dry runs.
    pub fn credential_or_anonymous(&self, image: &ImageRef) -> Result<(Credential, Option<Warning>)> {
        match self.credential(image) {
            Ok(credential) => Ok((credential, None)),
            Err(Error::MissingEnvVar(var)) => {
                let warning = Warning::anonymous_registry(format!(
                    "{} is not set; using anonymous access to {}",
                    var,
                    self.host(image)
                ));
                Ok((Credential::anonymous(self.host(image)), Some(warning)))
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image() -> ImageRef {
        ImageRef::parse("registry.example.com/acme/web").unwrap()
    }

    fn from_env(var: &str) -> Option<EnvValue> {
        Some(EnvValue::FromEnv {
            var: var.to_string(),
            default: None,
        })
    }

    #[test]
    fn host_comes_from_the_image() {
        let cfg = RegistryConfig::default();
        let credential = cfg.credential(&image()).unwrap();
        assert_eq!(credential.host(), "registry.example.com");
        assert!(credential.is_anonymous());
    }

    #[test]
    fn login_is_read_from_the_environment() {
        let cfg = RegistryConfig {
            host: None,
            username: from_env("HOIST_TEST_REG_USER"),
            password: from_env("HOIST_TEST_REG_TOKEN"),
        };
        temp_env::with_vars(
            [
                ("HOIST_TEST_REG_USER", Some("ci")),
                ("HOIST_TEST_REG_TOKEN", Some("s3cret")),
            ],
            || {
                let credential = cfg.credential(&image()).unwrap();
                assert_eq!(credential.username(), Some("ci"));
                assert!(!format!("{:?}", credential).contains("s3cret"));
            },
        );
    }

    #[test]
    fn missing_login_is_lenient_only_when_asked() {
        let cfg = RegistryConfig {
            host: None,
            username: from_env("HOIST_TEST_REG_USER_UNSET"),
            password: from_env("HOIST_TEST_REG_TOKEN_UNSET"),
        };
        temp_env::with_vars_unset(["HOIST_TEST_REG_USER_UNSET", "HOIST_TEST_REG_TOKEN_UNSET"], || {
            assert!(matches!(cfg.credential(&image()), Err(Error::MissingEnvVar(_))));

            let (credential, warning) = cfg.credential_or_anonymous(&image()).unwrap();
            assert!(credential.is_anonymous());
            assert!(warning.is_some());
        });
    }

    #[test]
    fn half_a_login_is_rejected() {
        let cfg = RegistryConfig {
            host: None,
            username: Some(EnvValue::Literal("ci".into())),
            password: None,
        };
        assert!(matches!(cfg.credential(&image()), Err(Error::InvalidConfig(_))));
    }
}
