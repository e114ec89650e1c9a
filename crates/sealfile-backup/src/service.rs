//! Service-boundary operations, hex/JSON in, bytes out
//!
//! Transports (gRPC daemon, CLI) call these and never touch the pipelines
//! directly. Hex parsing happens here: a malformed key or IV is a
//! `Crypto` error, a malformed hash or record is `Validation`.

use std::sync::Arc;

use sealfile_core::{BackupReceipt, ContentId, SealError, SealResult};
use sealfile_crypto::{CryptoEngine, FileHash, Iv, SymmetricKey};
use sealfile_storage::ContentStore;
use tracing::warn;

use crate::backup::BackupPipeline;
use crate::restore::RestorePipeline;
use crate::verify::MetadataVerifier;

pub struct BackupService<S> {
    backup: BackupPipeline<S>,
    restore: RestorePipeline<S>,
    verifier: MetadataVerifier,
}

impl<S: ContentStore + Clone> BackupService<S> {
    pub fn new(engine: Arc<CryptoEngine>, store: S) -> Self {
        Self {
            verifier: MetadataVerifier::from_engine(&engine),
            backup: BackupPipeline::new(engine.clone(), store.clone()),
            restore: RestorePipeline::new(engine, store),
        }
    }

    /// `Backup(file bytes, filename) -> {contentId, metadata}`
    pub async fn backup(&self, file: &[u8], filename: &str) -> SealResult<BackupReceipt> {
        self.backup.backup(file, filename).await
    }

    /// `Restore(contentId, key hex, iv hex, expectedHash hex) -> file bytes`
    pub async fn restore(
        &self,
        content_id: &str,
        key_hex: &str,
        iv_hex: &str,
        expected_hash_hex: &str,
    ) -> SealResult<Vec<u8>> {
        let key = SymmetricKey::from_hex(key_hex)?;
        let iv = Iv::from_hex(iv_hex)?;
        let expected = FileHash::from_hex(expected_hash_hex)?;
        self.restore
            .restore(&ContentId::new(content_id), &key, &iv, &expected)
            .await
    }

    /// `VerifyMetadata(metadata JSON) -> bool`
    pub fn verify_metadata(&self, metadata_json: &str) -> SealResult<bool> {
        self.verifier.verify_json(metadata_json)
    }

    /// `DecryptOnly(ciphertext, key hex, iv hex, expectedHash hex?) -> file bytes`
    pub fn decrypt_only(
        &self,
        ciphertext: &[u8],
        key_hex: &str,
        iv_hex: &str,
        expected_hash_hex: Option<&str>,
    ) -> SealResult<Vec<u8>> {
        let key = SymmetricKey::from_hex(key_hex)?;
        let iv = Iv::from_hex(iv_hex)?;
        let expected = expected_hash_hex.map(FileHash::from_hex).transpose()?;
        self.restore
            .decrypt_only(ciphertext, &key, &iv, expected.as_ref())
    }

    /// Verify the receipt's signature, then restore with its key, IV, and hash.
    ///
    /// Fails with `Unauthenticated` before touching the store when the
    /// signature does not check out.
    pub async fn restore_receipt(&self, receipt: &BackupReceipt) -> SealResult<Vec<u8>> {
        if !self.verifier.verify(&receipt.metadata)? {
            warn!(content_id = %receipt.content_id, "refusing restore: metadata signature invalid");
            return Err(SealError::Unauthenticated);
        }
        let m = &receipt.metadata;
        self.restore(receipt.content_id.as_str(), &m.symmetric_key, &m.iv, &m.file_hash)
            .await
    }

    pub fn verifier(&self) -> &MetadataVerifier {
        &self.verifier
    }
}
