//! Content hash computation for tracked files

use crate::error::StorageError;
use crate::types::ContentHash;
use serde::{Deserialize, Serialize};
use sha2::Digest;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

const READ_CHUNK: usize = 64 * 1024;

/// Digest used to key metadata objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// SHA-256, the layout used by existing `.meta` stores.
    #[default]
    Sha256,
    Blake3,
}

enum HasherInner {
    Sha256(sha2::Sha256),
    Blake3(Box<blake3::Hasher>),
}

impl HasherInner {
    fn new(algo: HashAlgorithm) -> Self {
        match algo {
            HashAlgorithm::Sha256 => HasherInner::Sha256(sha2::Sha256::new()),
            HashAlgorithm::Blake3 => HasherInner::Blake3(Box::new(blake3::Hasher::new())),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            HasherInner::Sha256(h) => h.update(data),
            HasherInner::Blake3(h) => {
                h.update(data);
            }
        }
    }

    fn finalize(self) -> ContentHash {
        let mut bytes = [0u8; 32];
        match self {
            HasherInner::Sha256(h) => bytes.copy_from_slice(h.finalize().as_slice()),
            HasherInner::Blake3(h) => bytes = *h.finalize().as_bytes(),
        }
        ContentHash::from_digest(&bytes)
    }
}

/// Stateless content hasher. Same bytes, same hash.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentHasher {
    algo: HashAlgorithm,
}

impl ContentHasher {
    pub fn new(algo: HashAlgorithm) -> Self {
        Self { algo }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algo
    }

    /// Hash an in-memory buffer.
    pub fn hash_bytes(&self, data: &[u8]) -> ContentHash {
        let mut inner = HasherInner::new(self.algo);
        inner.update(data);
        inner.finalize()
    }

    /// Hash a file by streaming its contents.
    pub fn hash_file(&self, path: &Path) -> Result<ContentHash, StorageError> {
        let file = File::open(path).map_err(|e| StorageError::io(path, e))?;
        let mut reader = BufReader::with_capacity(READ_CHUNK, file);
        let mut inner = HasherInner::new(self.algo);
        let mut buf = vec![0u8; READ_CHUNK];
        loop {
            let n = reader.read(&mut buf).map_err(|e| StorageError::io(path, e))?;
            if n == 0 {
                break;
            }
            inner.update(&buf[..n]);
        }
        Ok(inner.finalize())
    }
}
