use serde::{Deserialize, Serialize};
use std::fmt;

use crate::metadata::BackupMetadata;

/// Store-assigned identifier for a blob. Opaque to everything but the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(String);

impl ContentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ContentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Everything a caller must keep to restore a backup: where the ciphertext
/// lives and the signed record that can decrypt it.
///
/// Holding a receipt is holding the decryption key. Treat it as a secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupReceipt {
    pub content_id: ContentId,
    pub metadata: BackupMetadata,
}

impl BackupReceipt {
    /// Pretty-printed JSON, the on-disk export format
    pub fn to_json_pretty(&self) -> crate::SealResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| crate::SealError::Validation(format!("receipt serialization: {e}")))
    }

    pub fn from_json(s: &str) -> crate::SealResult<Self> {
        serde_json::from_str(s)
            .map_err(|e| crate::SealError::Validation(format!("receipt: {e}")))
    }
}
