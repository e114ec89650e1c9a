//! Restore: fetch → decrypt → check digest → release plaintext
//!
//! The key, IV, and expected hash are caller input and untrusted. A digest
//! mismatch is an ordinary outcome (`SealError::Integrity`); the decrypted
//! bytes are wiped and never handed back.

use std::sync::Arc;

use sealfile_core::{ContentId, SealError, SealResult};
use sealfile_crypto::{CryptoEngine, FileHash, Iv, SymmetricKey};
use sealfile_storage::ContentStore;
use tracing::{info, warn};
use zeroize::Zeroize;

pub struct RestorePipeline<S> {
    engine: Arc<CryptoEngine>,
    store: S,
}

impl<S: ContentStore> RestorePipeline<S> {
    pub fn new(engine: Arc<CryptoEngine>, store: S) -> Self {
        Self { engine, store }
    }

    /// Fetch the blob behind `content_id` and decrypt it.
    ///
    /// Errors: `NotFound` if the store has no such blob, `Crypto` on a
    /// length/padding failure, `Integrity` if the plaintext does not hash to
    /// `expected`. Read-only; safe to repeat and to run concurrently.
    pub async fn restore(
        &self,
        content_id: &ContentId,
        key: &SymmetricKey,
        iv: &Iv,
        expected: &FileHash,
    ) -> SealResult<Vec<u8>> {
        let ciphertext = self.store.get(content_id).await?;
        let plaintext = decrypt_verified(&self.engine, &ciphertext, key, iv, Some(expected))?;

        info!(content_id = %content_id, bytes = plaintext.len(), "restore verified");
        Ok(plaintext)
    }

    /// Decrypt ciphertext the caller already has, skipping the store.
    /// Without `expected` the output is unverified.
    pub fn decrypt_only(
        &self,
        ciphertext: &[u8],
        key: &SymmetricKey,
        iv: &Iv,
        expected: Option<&FileHash>,
    ) -> SealResult<Vec<u8>> {
        decrypt_verified(&self.engine, ciphertext, key, iv, expected)
    }
}

/// Decrypt and, when `expected` is given, check the SHA-256 of the result.
/// On mismatch the plaintext is zeroized and `Integrity` returned.
pub fn decrypt_verified(
    engine: &CryptoEngine,
    ciphertext: &[u8],
    key: &SymmetricKey,
    iv: &Iv,
    expected: Option<&FileHash>,
) -> SealResult<Vec<u8>> {
    let mut plaintext = engine.decrypt(ciphertext, key, iv)?;

    if let Some(expected) = expected {
        let actual = engine.digest(&plaintext);
        if actual != *expected {
            plaintext.zeroize();
            warn!(expected = %expected, actual = %actual, "integrity check failed");
            return Err(SealError::Integrity {
                expected: expected.to_hex(),
                actual: actual.to_hex(),
            });
        }
    }
    Ok(plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use sealfile_crypto::{digest, encrypt, KeyPair};
    use std::sync::OnceLock;

    fn engine() -> &'static CryptoEngine {
        static ENGINE: OnceLock<CryptoEngine> = OnceLock::new();
        ENGINE.get_or_init(|| CryptoEngine::new(KeyPair::generate(2048).unwrap()))
    }

    #[test]
    fn mismatch_reports_both_digests() {
        let key = SymmetricKey::from_bytes([3; 32]);
        let (iv, ct) = encrypt(b"abc", &key).unwrap();
        let wrong = digest(b"abd");

        match decrypt_verified(engine(), &ct, &key, &iv, Some(&wrong)) {
            Err(SealError::Integrity { expected, actual }) => {
                assert_eq!(expected, wrong.to_hex());
                assert_eq!(actual, digest(b"abc").to_hex());
            }
            other => panic!("expected integrity error, got {other:?}"),
        }
    }

    proptest! {
        #[test]
        fn verified_decrypt_returns_exact_plaintext(
            data in proptest::collection::vec(any::<u8>(), 0..=1024),
            key_bytes in any::<[u8; 32]>(),
        ) {
            let key = SymmetricKey::from_bytes(key_bytes);
            let (iv, ct) = encrypt(&data, &key).unwrap();
            let hash = digest(&data);
            prop_assert_eq!(decrypt_verified(engine(), &ct, &key, &iv, Some(&hash)).unwrap(), data);
        }

        #[test]
        fn any_other_expected_hash_is_rejected(
            data in proptest::collection::vec(any::<u8>(), 0..=256),
            other in any::<[u8; 32]>(),
        ) {
            let key = SymmetricKey::from_bytes([9; 32]);
            let (iv, ct) = encrypt(&data, &key).unwrap();
            let other = FileHash::from_bytes(other);
            prop_assume!(other != digest(&data));
            let rejected = matches!(
                decrypt_verified(engine(), &ct, &key, &iv, Some(&other)),
                Err(SealError::Integrity { .. })
            );
            prop_assert!(rejected);
        }
    }
}
