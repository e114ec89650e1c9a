//! SHA-256 content digests

use sealfile_core::{SealError, SealResult, HASH_SIZE};
use sha2::{Digest, Sha256};

/// SHA-256 digest of a file's plaintext
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileHash([u8; HASH_SIZE]);

impl FileHash {
    pub fn from_bytes(bytes: [u8; HASH_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    /// Parse a 64-char hex digest.
    pub fn from_hex(s: &str) -> SealResult<Self> {
        let mut bytes = [0u8; HASH_SIZE];
        hex::decode_to_slice(s.trim(), &mut bytes).map_err(|e| {
            SealError::Validation(format!(
                "file hash must be {} hex chars: {e}",
                HASH_SIZE * 2
            ))
        })?;
        Ok(Self(bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Debug for FileHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FileHash({})", self.to_hex())
    }
}

impl std::fmt::Display for FileHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// SHA-256 of `data`.
pub fn digest(data: &[u8]) -> FileHash {
    FileHash(Sha256::digest(data).into())
}
