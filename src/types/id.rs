// ABOUTME: Phantom-typed identifiers handed out by the container runtime.
// ABOUTME: The kind marker keeps ids from different runtime objects apart.

use serde::{Serialize, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Describes one family of runtime identifiers.
pub trait IdKind {
    /// Human-readable noun used in diagnostics.
    const NOUN: &'static str;
}

pub enum ContainerKind {}

impl IdKind for ContainerKind {
    const NOUN: &'static str = "container";
}

/// Runtime-assigned identifier, tagged with the kind of object it names.
#[must_use = "ids reference runtime objects and should not be ignored"]
pub struct Id<K> {
    value: String,
    _kind: PhantomData<K>,
}

pub type ContainerId = Id<ContainerKind>;

impl<K: IdKind> Id<K> {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            _kind: PhantomData,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// The first 12 characters, the way engine CLIs abbreviate ids.
    pub fn short(&self) -> &str {
        let hex = self
            .value
            .split_once(':')
            .map(|(_, rest)| rest)
            .unwrap_or(&self.value);
        &hex[..hex.len().min(12)]
    }

    pub fn noun(&self) -> &'static str {
        K::NOUN
    }
}

// Manual impls: K is only a marker and carries no trait bounds.

impl<K> Clone for Id<K> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            _kind: PhantomData,
        }
    }
}

impl<K: IdKind> fmt::Debug for Id<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", K::NOUN, self.value)
    }
}

impl<K> fmt::Display for Id<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl<K> PartialEq for Id<K> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<K> Eq for Id<K> {}

impl<K> Hash for Id<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<K> Serialize for Id<K> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_strips_algorithm_prefix() {
        let id = ContainerId::new("sha256:0123456789abcdef0123");
        assert_eq!(id.short(), "0123456789ab");
    }

    #[test]
    fn short_keeps_short_ids_whole() {
        let id = ContainerId::new("abc");
        assert_eq!(id.short(), "abc");
    }

    #[test]
    fn debug_names_the_kind() {
        let id = ContainerId::new("abc");
        assert_eq!(format!("{:?}", id), "container(abc)");
    }
}
