// ABOUTME: Secret-capable values with environment variable interpolation.
// ABOUTME: A value is either literal or read from a named variable with an optional default.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum EnvValue {
    Literal(String),
    FromEnv {
        #[serde(rename = "env")]
        var: String,
        #[serde(default)]
        default: Option<String>,
    },
}

impl EnvValue {
    pub fn resolve(&self) -> Result<String> {
        match self {
            EnvValue::Literal(s) => Ok(s.clone()),
            EnvValue::FromEnv { var, default } => match std::env::var(var) {
                Ok(val) => Ok(val),
                Err(_) => default
                    .clone()
                    .ok_or_else(|| Error::MissingEnvVar(var.clone())),
            },
        }
    }

    /// Name of the variable this value reads, if any.
    pub fn variable(&self) -> Option<&str> {
        match self {
            EnvValue::Literal(_) => None,
            EnvValue::FromEnv { var, .. } => Some(var),
        }
    }
}

// Literals may be passwords; only variable names are shown.
impl fmt::Debug for EnvValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvValue::Literal(_) => f.write_str("Literal(<redacted>)"),
            EnvValue::FromEnv { var, .. } => f.debug_struct("FromEnv").field("var", var).finish(),
        }
    }
}

pub fn resolve_env_map(map: &BTreeMap<String, EnvValue>) -> Result<BTreeMap<String, String>> {
    map.iter()
        .map(|(k, v)| v.resolve().map(|resolved| (k.clone(), resolved)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_variable_then_default() {
        let value = EnvValue::FromEnv {
            var: "HOIST_TEST_ENV_VALUE".into(),
            default: Some("fallback".into()),
        };
        temp_env::with_var("HOIST_TEST_ENV_VALUE", Some("set"), || {
            assert_eq!(value.resolve().unwrap(), "set");
        });
        temp_env::with_var_unset("HOIST_TEST_ENV_VALUE", || {
            assert_eq!(value.resolve().unwrap(), "fallback");
        });
    }

    #[test]
    fn missing_variable_without_default_is_an_error() {
        let value = EnvValue::FromEnv {
            var: "HOIST_TEST_UNSET".into(),
            default: None,
        };
        temp_env::with_var_unset("HOIST_TEST_UNSET", || {
            assert!(matches!(value.resolve(), Err(Error::MissingEnvVar(v)) if v == "HOIST_TEST_UNSET"));
        });
    }

    #[test]
    fn debug_hides_literals() {
        let value = EnvValue::Literal("hunter2".into());
        assert!(!format!("{:?}", value).contains("hunter2"));
    }
}
