//! Core types shared across the migration pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of an identity once hyphens are removed.
pub const IDENTITY_LEN: usize = 32;

/// Identity: 32 lowercase hex characters naming one node (a UUID without hyphens).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    /// Parse either the hyphen-free or the hyphenated UUID form.
    ///
    /// Uppercase digits are rejected: legacy shard folders are always lowercase,
    /// so accepting them here would produce identities no folder can match.
    pub fn parse(value: &str) -> Option<Self> {
        let stripped: String = match value.len() {
            IDENTITY_LEN => value.to_string(),
            36 => {
                let bytes = value.as_bytes();
                if [8, 13, 18, 23].iter().any(|&i| bytes[i] != b'-') {
                    return None;
                }
                value.chars().filter(|c| *c != '-').collect()
            }
            _ => return None,
        };
        if stripped.len() == IDENTITY_LEN && stripped.chars().all(is_lower_hex) {
            Some(Identity(stripped))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical 8-4-4-4-12 rendering, as used by the node table.
    pub fn hyphenated(&self) -> String {
        let s = &self.0;
        format!(
            "{}-{}-{}-{}-{}",
            &s[0..8],
            &s[8..12],
            &s[12..16],
            &s[16..20],
            &s[20..32]
        )
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Identity {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Identity::parse(&value).ok_or_else(|| format!("invalid node identity: {}", value))
    }
}

impl From<Identity> for String {
    fn from(value: Identity) -> Self {
        value.0
    }
}

pub(crate) fn is_lower_hex(c: char) -> bool {
    matches!(c, '0'..='9' | 'a'..='f')
}

/// StoreKey: opaque content-derived handle assigned by a pack store
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreKey(String);

impl StoreKey {
    pub fn new(key: impl Into<String>) -> Self {
        StoreKey(key.into())
    }

    /// Key for raw content bytes: blake3 digest, hex encoded.
    pub fn for_hash(hash: &blake3::Hash) -> Self {
        StoreKey(hash.to_hex().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
