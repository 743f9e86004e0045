//! Identifier types used throughout the bridge.
//!
//! Object ids are textual `namespace:path` pairs, unique within one kind.
//! Event ids use UUID v7 so deliveries are naturally time-ordered.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

const SEPARATOR: char = ':';

/// Stable textual identifier of a domain object, unique within its kind.
///
/// Either bare (`air`) or namespaced (`mymod:furnace`). Bare ids are valid;
/// [`ObjectId::qualified`] supplies a namespace when one is required.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectId(String);

impl ObjectId {
    /// Parses and validates an object id.
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = |reason| Error::InvalidObjectId {
            id: s.to_string(),
            reason,
        };

        if s.is_empty() {
            return Err(invalid("id is empty"));
        }
        if s.chars().any(char::is_whitespace) {
            return Err(invalid("id contains whitespace"));
        }

        match s.split_once(SEPARATOR) {
            None => Ok(Self(s.to_string())),
            Some((namespace, path)) => {
                if namespace.is_empty() {
                    return Err(invalid("namespace is empty"));
                }
                if path.is_empty() {
                    return Err(invalid("path is empty"));
                }
                if path.contains(SEPARATOR) {
                    return Err(invalid("more than one ':' separator"));
                }
                Ok(Self(s.to_string()))
            }
        }
    }

    /// Builds a namespaced id from its two halves.
    pub fn namespaced(namespace: &str, path: &str) -> Result<Self> {
        Self::parse(&format!("{namespace}{SEPARATOR}{path}"))
    }

    /// Returns the full textual id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the namespace, if the id has one.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.0.split_once(SEPARATOR).map(|(namespace, _)| namespace)
    }

    /// Returns the path (the whole id when bare).
    #[must_use]
    pub fn path(&self) -> &str {
        self.0
            .split_once(SEPARATOR)
            .map_or(self.0.as_str(), |(_, path)| path)
    }

    /// Whether the id carries a namespace.
    #[must_use]
    pub fn is_qualified(&self) -> bool {
        self.namespace().is_some()
    }

    /// Returns this id with `default_namespace` prefixed when it has none.
    #[must_use]
    pub fn qualified(&self, default_namespace: &str) -> Self {
        if self.is_qualified() || default_namespace.is_empty() {
            self.clone()
        } else {
            Self(format!("{default_namespace}{SEPARATOR}{}", self.0))
        }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ObjectId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ObjectId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<ObjectId> for String {
    fn from(id: ObjectId) -> Self {
        id.0
    }
}

/// Discriminator for several abstract identities sharing one native handle.
///
/// `0` is the default "no sub-variant" case.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MetaVariant(u32);

impl MetaVariant {
    /// The default variant.
    pub const DEFAULT: Self = Self(0);

    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn value(&self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn is_default(&self) -> bool {
        self.0 == 0
    }
}

impl From<u32> for MetaVariant {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Display for MetaVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An object id with an explicit sub-variant, written `namespace:path:variant`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariantId {
    pub id: ObjectId,
    pub variant: MetaVariant,
}

impl VariantId {
    #[must_use]
    pub fn new(id: ObjectId, variant: MetaVariant) -> Self {
        Self { id, variant }
    }

    /// Parses `namespace:path:variant` (or `path:variant`) by splitting at
    /// the last separator.
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = |reason| Error::InvalidVariantId {
            id: s.to_string(),
            reason,
        };

        let (base, variant) = s
            .rsplit_once(SEPARATOR)
            .ok_or_else(|| invalid("missing ':variant' suffix"))?;
        let variant: u32 = variant
            .parse()
            .map_err(|_| invalid("variant is not a non-negative integer"))?;
        let id = ObjectId::parse(base).map_err(|_| invalid("base id is not a valid object id"))?;

        Ok(Self {
            id,
            variant: MetaVariant(variant),
        })
    }
}

impl fmt::Display for VariantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{SEPARATOR}{}", self.id, self.variant)
    }
}

impl FromStr for VariantId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Unique identifier for a published event.
/// Subscribers under at-least-once delivery may use it to deduplicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new event ID with the current timestamp.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Parses an event ID from a string.
    pub fn parse(s: &str) -> Result<Self> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EventId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
