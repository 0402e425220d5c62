// ABOUTME: Content digest identifying an immutable artifact (e.g. sha256:ab12...).
// ABOUTME: The digest, not the tag, is the canonical identity of a published image.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DigestError {
    #[error("digest cannot be empty")]
    Empty,

    #[error("digest must have the form <algorithm>:<hex>, got {0:?}")]
    MissingSeparator(String),

    #[error("invalid digest algorithm: {0:?}")]
    InvalidAlgorithm(String),

    #[error("invalid digest encoding: {0:?}")]
    InvalidEncoding(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest(String);

impl Digest {
    pub fn parse(input: &str) -> Result<Self, DigestError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(DigestError::Empty);
        }

        let (algorithm, encoded) = input
            .split_once(':')
            .ok_or_else(|| DigestError::MissingSeparator(input.to_string()))?;

        let algorithm_ok = !algorithm.is_empty()
            && algorithm
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "+._-".contains(c));
        if !algorithm_ok {
            return Err(DigestError::InvalidAlgorithm(algorithm.to_string()));
        }

        if encoded.is_empty() || !encoded.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(DigestError::InvalidEncoding(encoded.to_string()));
        }

        Ok(Self(input.to_string()))
    }

    pub fn algorithm(&self) -> &str {
        self.0.split_once(':').map(|(a, _)| a).unwrap_or_default()
    }

    pub fn encoded(&self) -> &str {
        self.0.split_once(':').map(|(_, e)| e).unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Digest {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Digest::parse(s)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Digest::parse(&s).map_err(serde::de::Error::custom)
    }
}
