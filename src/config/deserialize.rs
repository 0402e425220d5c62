// ABOUTME: Custom serde deserializers for config types.
// ABOUTME: Handles service names, image refs, servers, port lists and branch lists.

use nonempty::NonEmpty;
use serde::Deserialize;

use super::ServerConfig;
use crate::runtime::PortMapping;
use crate::types::{ImageRef, ServiceName};

pub fn deserialize_service_name<'de, D>(deserializer: D) -> Result<ServiceName, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    ServiceName::new(&s).map_err(serde::de::Error::custom)
}

pub fn deserialize_image_ref<'de, D>(deserializer: D) -> Result<ImageRef, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    ImageRef::parse(&s).map_err(serde::de::Error::custom)
}

pub fn deserialize_server_option<'de, D>(deserializer: D) -> Result<Option<ServerConfig>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<ServerEntry>::deserialize(deserializer)?
        .map(ServerEntry::into_server_config)
        .transpose()
        .map_err(serde::de::Error::custom)
}

pub fn deserialize_ports<'de, D>(deserializer: D) -> Result<Vec<PortMapping>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let values: Vec<PortEntry> = Vec::deserialize(deserializer)?;
    values
        .into_iter()
        .map(|entry| match entry {
            PortEntry::Number(port) => port.to_string().parse::<PortMapping>(),
            PortEntry::Text(s) => s.parse::<PortMapping>(),
        })
        .collect::<Result<Vec<_>, _>>()
        .map_err(serde::de::Error::custom)
}

pub fn deserialize_branches<'de, D>(deserializer: D) -> Result<NonEmpty<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let branches: Vec<String> = Vec::deserialize(deserializer)?;
    NonEmpty::from_vec(branches)
        .ok_or_else(|| serde::de::Error::custom("trigger.branches cannot be empty"))
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ServerEntry {
    Simple(String),
    Detailed(ServerConfig),
}

impl ServerEntry {
    fn into_server_config(self) -> Result<ServerConfig, String> {
        match self {
            ServerEntry::Simple(s) => ServerConfig::parse(&s),
            ServerEntry::Detailed(c) => Ok(c),
        }
    }
}

// YAML reads `- 80` as a number and `- 80:80` as a string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PortEntry {
    Number(u16),
    Text(String),
}
