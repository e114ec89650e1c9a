//! CryptoEngine: the one object holding process-wide key material
//!
//! Constructed explicitly and shared by reference (usually `Arc`), so tests
//! and embedders can inject their own key pair. Stateless apart from the
//! immutable RSA keys; safe to use from any number of tasks at once.

use std::path::Path;

use sealfile_core::{CryptoError, SealResult};

use crate::cipher;
use crate::digest::{self, FileHash};
use crate::keys::{self, Iv, SymmetricKey};
use crate::signing::{KeyPair, PublicKey};

#[derive(Debug, Clone)]
pub struct CryptoEngine {
    keys: KeyPair,
}

impl CryptoEngine {
    pub fn new(keys: KeyPair) -> Self {
        Self { keys }
    }

    /// Load the signing key pair from PEM files.
    pub fn load(private_key: &Path, public_key: Option<&Path>) -> SealResult<Self> {
        Ok(Self::new(KeyPair::load(private_key, public_key)?))
    }

    /// Fresh random per-backup key
    pub fn generate_key(&self) -> Result<SymmetricKey, CryptoError> {
        keys::generate_symmetric_key()
    }

    pub fn encrypt(
        &self,
        plaintext: &[u8],
        key: &SymmetricKey,
    ) -> Result<(Iv, Vec<u8>), CryptoError> {
        cipher::encrypt(plaintext, key)
    }

    pub fn decrypt(
        &self,
        ciphertext: &[u8],
        key: &SymmetricKey,
        iv: &Iv,
    ) -> Result<Vec<u8>, CryptoError> {
        cipher::decrypt(ciphertext, key, iv)
    }

    pub fn sign(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.keys.sign(data)
    }

    pub fn verify(&self, data: &[u8], signature: &[u8]) -> bool {
        self.keys.verify(data, signature)
    }

    pub fn digest(&self, data: &[u8]) -> FileHash {
        digest::digest(data)
    }

    pub fn public_key(&self) -> &PublicKey {
        self.keys.public_key()
    }
}
