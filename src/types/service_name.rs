// ABOUTME: Service name used to derive container names and labels.
// ABOUTME: Must be a valid RFC 1123 DNS label so it also works as a hostname.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceNameError {
    #[error("service name cannot be empty")]
    Empty,

    #[error("service name exceeds maximum length of 63 characters")]
    TooLong,

    #[error("service name must start and end with a letter or digit")]
    BadEdge,

    #[error("invalid character in service name: '{0}' (lowercase letters, digits and '-' only)")]
    InvalidChar(char),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceName(String);

impl ServiceName {
    pub fn new(value: &str) -> Result<Self, ServiceNameError> {
        match value.len() {
            0 => return Err(ServiceNameError::Empty),
            n if n > 63 => return Err(ServiceNameError::TooLong),
            _ => {}
        }

        if let Some(c) = value
            .chars()
            .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-'))
        {
            return Err(ServiceNameError::InvalidChar(c));
        }

        if value.starts_with('-') || value.ends_with('-') {
            return Err(ServiceNameError::BadEdge);
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
