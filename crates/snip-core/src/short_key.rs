use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// The content-derived identifier that stands in for a long URL.
///
/// Keys produced by a [`Deriver`](crate::deriver::Deriver) are decimal
/// strings, but keys arriving from clients (e.g. a batch of keys to delete)
/// are accepted verbatim: a key that was never stored simply resolves to
/// [`StoreError::NotFound`](crate::error::StoreError::NotFound).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShortKey(String);

impl ShortKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Renders the public short URL for this key under `base_url`.
    pub fn to_url(&self, base_url: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self.0)
    }
}

impl Display for ShortKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ShortKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ShortKey {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Opaque identifier of the client that submitted a link.
///
/// Ownership scopes delete permission and listings; nothing else about the
/// value is interpreted.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(owner: impl Into<String>) -> Self {
        Self(owner.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for OwnerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for OwnerId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}
