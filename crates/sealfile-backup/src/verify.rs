//! Offline metadata signature check
//!
//! Needs only the signing authority's public key. No store access.

use sealfile_core::{BackupMetadata, SealResult};
use sealfile_crypto::{CryptoEngine, PublicKey};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct MetadataVerifier {
    public_key: PublicKey,
}

impl MetadataVerifier {
    pub fn new(public_key: PublicKey) -> Self {
        Self { public_key }
    }

    pub fn from_engine(engine: &CryptoEngine) -> Self {
        Self::new(engine.public_key().clone())
    }

    /// `Ok(true)` iff the signature matches the record's canonical form.
    ///
    /// A well-formed but tampered or foreign record is `Ok(false)`; only a
    /// structurally broken record (bad hex, wrong lengths) is an error.
    pub fn verify(&self, metadata: &BackupMetadata) -> SealResult<bool> {
        metadata.validate()?;
        let data = metadata.canonical_bytes()?;
        let signature = metadata.signature_bytes()?;

        let valid = self.public_key.verify(&data, &signature);
        if valid {
            debug!(filename = %metadata.filename, "metadata signature valid");
        } else {
            warn!(filename = %metadata.filename, "metadata signature invalid");
        }
        Ok(valid)
    }

    /// Parse a JSON record and verify it. Missing or unknown fields are
    /// `Validation` errors.
    pub fn verify_json(&self, json: &str) -> SealResult<bool> {
        self.verify(&BackupMetadata::from_json(json)?)
    }
}
