//! Backup: hash → key → encrypt → metadata → sign → store
//!
//! Order matters. The hash is taken over the untouched plaintext so restore
//! can check what comes out of decryption. The signature is computed last,
//! over every other field including key and IV, so a signed record cannot
//! have its key/IV swapped. Nothing is returned until `put` succeeds, so a
//! failed backup leaves no metadata pointing at a missing blob.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use sealfile_core::metadata::UnsignedMetadata;
use sealfile_core::{BackupReceipt, SealResult, METADATA_VERSION};
use sealfile_crypto::CryptoEngine;
use sealfile_storage::ContentStore;
use tracing::info;

pub struct BackupPipeline<S> {
    engine: Arc<CryptoEngine>,
    store: S,
}

impl<S: ContentStore> BackupPipeline<S> {
    pub fn new(engine: Arc<CryptoEngine>, store: S) -> Self {
        Self { engine, store }
    }

    /// Encrypt, sign, and store `plaintext`.
    ///
    /// Crypto failures abort before anything is stored. A store failure
    /// surfaces as `SealError::Storage`; nothing was persisted and the whole
    /// call may be retried.
    pub async fn backup(&self, plaintext: &[u8], filename: &str) -> SealResult<BackupReceipt> {
        self.backup_at(plaintext, filename, Utc::now()).await
    }

    /// [`Self::backup`] with an explicit creation time.
    pub async fn backup_at(
        &self,
        plaintext: &[u8],
        filename: &str,
        now: DateTime<Utc>,
    ) -> SealResult<BackupReceipt> {
        let file_hash = self.engine.digest(plaintext);
        let key = self.engine.generate_key()?;
        let (iv, ciphertext) = self.engine.encrypt(plaintext, &key)?;

        let unsigned = UnsignedMetadata {
            filename: filename.to_string(),
            timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            version: METADATA_VERSION,
            iv: iv.to_hex(),
            symmetric_key: key.to_hex(),
            file_hash: file_hash.to_hex(),
        };
        let signature = self.engine.sign(&unsigned.canonical_bytes()?)?;
        let metadata = unsigned.with_signature(&signature);

        let stored_bytes = ciphertext.len();
        let content_id = self.store.put(ciphertext).await?;

        info!(
            content_id = %content_id,
            filename = %metadata.filename,
            file_hash = %metadata.file_hash,
            bytes = plaintext.len(),
            stored_bytes,
            "backup stored"
        );

        Ok(BackupReceipt {
            content_id,
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sealfile_crypto::{FileHash, Iv, KeyPair, SymmetricKey};
    use sealfile_storage::OpendalStore;
    use std::sync::OnceLock;

    fn engine() -> Arc<CryptoEngine> {
        static ENGINE: OnceLock<Arc<CryptoEngine>> = OnceLock::new();
        ENGINE
            .get_or_init(|| Arc::new(CryptoEngine::new(KeyPair::generate(2048).unwrap())))
            .clone()
    }

    #[tokio::test]
    async fn metadata_fields_are_populated() {
        let store = OpendalStore::memory().unwrap();
        let pipeline = BackupPipeline::new(engine(), store);
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();

        let receipt = pipeline.backup_at(b"hello", "hello.txt", at).await.unwrap();
        let m = &receipt.metadata;

        assert_eq!(m.filename, "hello.txt");
        assert_eq!(m.timestamp, "2025-03-01T12:00:00.000Z");
        assert_eq!(m.version, 1);
        assert!(Iv::from_hex(&m.iv).is_ok());
        assert!(SymmetricKey::from_hex(&m.symmetric_key).is_ok());
        assert_eq!(
            FileHash::from_hex(&m.file_hash).unwrap(),
            sealfile_crypto::digest(b"hello")
        );
        assert_eq!(m.signature.len(), 2 * 256);
    }

    #[tokio::test]
    async fn stored_blob_is_ciphertext_not_plaintext() {
        let store = OpendalStore::memory().unwrap();
        let pipeline = BackupPipeline::new(engine(), store.clone());
        let plaintext = b"a very recognisable plaintext string".to_vec();

        let receipt = pipeline.backup(&plaintext, "f").await.unwrap();
        let stored = store.get(&receipt.content_id).await.unwrap();

        assert_ne!(stored, plaintext);
        assert_eq!(stored.len() % 16, 0);
        assert!(!stored
            .windows(plaintext.len())
            .any(|w| w == plaintext.as_slice()));
    }

    #[tokio::test]
    async fn signature_covers_final_record() {
        let store = OpendalStore::memory().unwrap();
        let e = engine();
        let pipeline = BackupPipeline::new(e.clone(), store);

        let receipt = pipeline.backup(b"x", "x.bin").await.unwrap();
        let m = &receipt.metadata;
        let sig = m.signature_bytes().unwrap();
        assert!(e.verify(&m.canonical_bytes().unwrap(), &sig));
    }
}
