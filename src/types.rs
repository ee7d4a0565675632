//! Core types shared across the index, the stores and the event pipeline.

use crate::error::StorageError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Hex digest length of a 256-bit hash.
pub const HASH_HEX_LEN: usize = 64;

/// ContentHash: hex digest of a file's bytes, identity key of a metadata object.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    /// Build a hash from raw digest bytes.
    pub fn from_digest(bytes: &[u8; 32]) -> Self {
        ContentHash(hex::encode(bytes))
    }

    /// Parse and validate a hex digest (case-insensitive, stored lowercase).
    pub fn parse(value: &str) -> Result<Self, StorageError> {
        let lowered = value.trim().to_ascii_lowercase();
        if lowered.len() != HASH_HEX_LEN || !lowered.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(StorageError::InvalidHash(value.to_string()));
        }
        Ok(ContentHash(lowered))
    }

    /// Rebuild a hash from its shard directory name and file stem.
    pub fn from_shard(prefix: &str, rest: &str) -> Result<Self, StorageError> {
        Self::parse(&format!("{}{}", prefix, rest))
    }

    /// Split into the two-character shard prefix and the remainder.
    pub fn shard(&self) -> (&str, &str) {
        self.0.split_at(2)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for display.
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ContentHash {
    type Error = StorageError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ContentHash::parse(&value)
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.0
    }
}
