//! RSA-SHA256 (PKCS#1 v1.5) signing key pair and public-key verification
//!
//! PEM loading accepts PKCS#8 / SPKI first and falls back to PKCS#1, which
//! covers keys from both `openssl genpkey` and older `openssl genrsa`.

use std::path::Path;

use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sealfile_core::{CryptoError, SealResult};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

/// Modulus size for newly generated keys
pub const DEFAULT_RSA_BITS: usize = 2048;

/// An RSA public key, enough to verify metadata signatures offline.
#[derive(Clone)]
pub struct PublicKey {
    key: RsaPublicKey,
    verifying: VerifyingKey<Sha256>,
}

impl PublicKey {
    fn new(key: RsaPublicKey) -> Self {
        let verifying = VerifyingKey::<Sha256>::new(key.clone());
        Self { key, verifying }
    }

    /// Parse an SPKI (`BEGIN PUBLIC KEY`) or PKCS#1 (`BEGIN RSA PUBLIC KEY`) PEM.
    pub fn from_pem(pem: &str) -> Result<Self, CryptoError> {
        let key = RsaPublicKey::from_public_key_pem(pem)
            .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
            .map_err(|e| CryptoError::KeyMaterial(format!("public key PEM: {e}")))?;
        Ok(Self::new(key))
    }

    pub fn load(path: &Path) -> SealResult<Self> {
        let pem = std::fs::read_to_string(path)?;
        Ok(Self::from_pem(&pem)?)
    }

    /// SPKI PEM encoding
    pub fn to_pem(&self) -> Result<String, CryptoError> {
        self.key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| CryptoError::KeyMaterial(format!("encoding public key: {e}")))
    }

    /// `sha256:<hex>` over the DER-encoded SPKI
    pub fn fingerprint(&self) -> Result<String, CryptoError> {
        let der = self
            .key
            .to_public_key_der()
            .map_err(|e| CryptoError::KeyMaterial(format!("encoding public key: {e}")))?;
        Ok(format!("sha256:{}", hex::encode(Sha256::digest(der.as_bytes()))))
    }

    /// Check `signature` over `data`. Any malformed or non-matching
    /// signature is simply `false`.
    pub fn verify(&self, data: &[u8], signature: &[u8]) -> bool {
        let Ok(signature) = Signature::try_from(signature) else {
            return false;
        };
        self.verifying.verify(data, &signature).is_ok()
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublicKey")
            .field("fingerprint", &self.fingerprint().unwrap_or_default())
            .finish()
    }
}

/// The signing authority's RSA key pair.
#[derive(Clone)]
pub struct KeyPair {
    private: RsaPrivateKey,
    signing: SigningKey<Sha256>,
    public: PublicKey,
}

impl KeyPair {
    fn from_private(private: RsaPrivateKey) -> Self {
        let public = PublicKey::new(RsaPublicKey::from(&private));
        let signing = SigningKey::<Sha256>::new(private.clone());
        Self {
            private,
            signing,
            public,
        }
    }

    /// Generate a new key pair with a `bits`-bit modulus.
    pub fn generate(bits: usize) -> Result<Self, CryptoError> {
        let private = RsaPrivateKey::new(&mut rand::thread_rng(), bits)
            .map_err(|e| CryptoError::KeyMaterial(format!("RSA key generation: {e}")))?;
        Ok(Self::from_private(private))
    }

    /// Parse a private key PEM. When `public_pem` is given it must match the
    /// private key, so a mismatched pair fails at startup rather than at
    /// the first verification.
    pub fn from_pem(private_pem: &str, public_pem: Option<&str>) -> Result<Self, CryptoError> {
        let private = RsaPrivateKey::from_pkcs8_pem(private_pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(private_pem))
            .map_err(|e| CryptoError::KeyMaterial(format!("private key PEM: {e}")))?;
        let pair = Self::from_private(private);

        if let Some(pem) = public_pem {
            if PublicKey::from_pem(pem)? != pair.public {
                return Err(CryptoError::KeyMaterial(
                    "public key does not belong to the private key".into(),
                ));
            }
        }
        Ok(pair)
    }

    /// Load the key pair from PEM files.
    pub fn load(private_path: &Path, public_path: Option<&Path>) -> SealResult<Self> {
        let private_pem = Zeroizing::new(std::fs::read_to_string(private_path)?);
        let public_pem = public_path.map(std::fs::read_to_string).transpose()?;
        let pair = Self::from_pem(&private_pem, public_pem.as_deref())?;
        tracing::info!(
            private_key = %private_path.display(),
            fingerprint = %pair.public.fingerprint().unwrap_or_default(),
            "signing key loaded"
        );
        Ok(pair)
    }

    /// PKCS#8 PEM of the private key
    pub fn private_key_pem(&self) -> Result<Zeroizing<String>, CryptoError> {
        self.private
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| CryptoError::KeyMaterial(format!("encoding private key: {e}")))
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// RSA-SHA256 PKCS#1 v1.5 signature over `data`. Deterministic.
    pub fn sign(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.signing
            .try_sign(data)
            .map(|sig| sig.to_vec())
            .map_err(|e| CryptoError::Signing(e.to_string()))
    }

    pub fn verify(&self, data: &[u8], signature: &[u8]) -> bool {
        self.public.verify(data, signature)
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("private", &"[REDACTED]")
            .field("public", &self.public)
            .finish()
    }
}
