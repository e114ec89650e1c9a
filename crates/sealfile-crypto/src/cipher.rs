//! Whole-file AES-256-CBC encryption/decryption
//!
//! Ciphertext format: raw CBC output with PKCS#7 padding, no header. The IV
//! travels separately (in the metadata record), so the stored blob is
//! `ceil((len + 1) / 16) * 16` bytes of ciphertext and nothing else.
//!
//! CBC is not authenticated. Decrypting with the wrong key or IV usually
//! trips the padding check, but can yield well-padded garbage; callers must
//! compare the plaintext digest before trusting the output.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use sealfile_core::CryptoError;

use crate::keys::{Iv, SymmetricKey};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// AES block size in bytes
pub const BLOCK_SIZE: usize = 16;

/// Encrypt `plaintext` under `key` with a freshly generated IV.
///
/// Returns the IV and the padded ciphertext. Only fails if the OS random
/// source does.
pub fn encrypt(plaintext: &[u8], key: &SymmetricKey) -> Result<(Iv, Vec<u8>), CryptoError> {
    let iv = Iv::generate()?;
    let ciphertext = encrypt_with_iv(plaintext, key, &iv);
    Ok((iv, ciphertext))
}

/// Encrypt with a caller-chosen IV. Never reuse an IV under the same key.
pub fn encrypt_with_iv(plaintext: &[u8], key: &SymmetricKey, iv: &Iv) -> Vec<u8> {
    Aes256CbcEnc::new(key.as_bytes().into(), iv.as_bytes().into())
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext)
}

/// Decrypt `ciphertext` produced by [`encrypt`].
///
/// Fails with `InvalidPadding` when the length is not a positive multiple of
/// the block size or the padding is malformed. Neither case says whether the
/// key was wrong or the data was altered; either way the output is untrusted.
pub fn decrypt(ciphertext: &[u8], key: &SymmetricKey, iv: &Iv) -> Result<Vec<u8>, CryptoError> {
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(CryptoError::InvalidPadding);
    }

    Aes256CbcDec::new(key.as_bytes().into(), iv.as_bytes().into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CryptoError::InvalidPadding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::generate_symmetric_key;
    use proptest::prelude::*;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = generate_symmetric_key().unwrap();
        let plaintext = b"hello, encrypted world!";

        let (iv, ciphertext) = encrypt(plaintext, &key).unwrap();
        let decrypted = decrypt(&ciphertext, &key, &iv).unwrap();

        assert_eq!(&decrypted, plaintext);
    }

    #[test]
    fn test_empty_plaintext_is_one_block() {
        let key = generate_symmetric_key().unwrap();

        let (iv, ciphertext) = encrypt(b"", &key).unwrap();
        assert_eq!(ciphertext.len(), BLOCK_SIZE);
        assert_eq!(decrypt(&ciphertext, &key, &iv).unwrap(), b"");
    }

    #[test]
    fn test_ciphertext_size() {
        let key = generate_symmetric_key().unwrap();

        // Full block of padding when the input is block-aligned
        let (_, ct) = encrypt(&[0u8; 32], &key).unwrap();
        assert_eq!(ct.len(), 48);

        let (_, ct) = encrypt(&[0u8; 1000], &key).unwrap();
        assert_eq!(ct.len(), 1008);
    }

    #[test]
    fn test_fresh_iv_per_call() {
        let key = generate_symmetric_key().unwrap();
        let (iv1, ct1) = encrypt(b"same input", &key).unwrap();
        let (iv2, ct2) = encrypt(b"same input", &key).unwrap();

        assert_ne!(iv1, iv2);
        assert_ne!(ct1, ct2);
    }

    #[test]
    fn test_known_vector() {
        // NIST SP 800-38A F.2.5, first block (padding block appended by PKCS#7)
        let key = SymmetricKey::from_hex(
            "603deb1015ca71be2b73aef0857d77811f352c073b6108d72d9810a30914dff4",
        )
        .unwrap();
        let iv = Iv::from_hex("000102030405060708090a0b0c0d0e0f").unwrap();
        let plaintext = hex::decode("6bc1bee22e409f96e93d7e117393172a").unwrap();

        let ct = encrypt_with_iv(&plaintext, &key, &iv);
        assert_eq!(hex::encode(&ct[..16]), "f58c4c04d6e5f1ba779eabfb5f7bfbd6");
        assert_eq!(decrypt(&ct, &key, &iv).unwrap(), plaintext);
    }

    #[test]
    fn test_truncated_ciphertext_rejected() {
        let key = generate_symmetric_key().unwrap();
        let (iv, ct) = encrypt(b"some file contents", &key).unwrap();

        let err = decrypt(&ct[..ct.len() - 1], &key, &iv).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidPadding));

        let err = decrypt(&[], &key, &iv).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidPadding));
    }

    #[test]
    fn test_wrong_key_never_returns_plaintext() {
        let key1 = generate_symmetric_key().unwrap();
        let key2 = generate_symmetric_key().unwrap();
        let plaintext = b"secret data that should stay secret";

        let (iv, ct) = encrypt(plaintext, &key1).unwrap();
        match decrypt(&ct, &key2, &iv) {
            Err(e) => assert!(matches!(e, CryptoError::InvalidPadding)),
            Ok(garbage) => assert_ne!(garbage, plaintext),
        }
    }

    #[test]
    fn test_wrong_iv_corrupts_first_block_only() {
        let key = generate_symmetric_key().unwrap();
        let plaintext = vec![0x42u8; 64];
        let (iv, ct) = encrypt(&plaintext, &key).unwrap();

        let mut other = *iv.as_bytes();
        other[0] ^= 0x01;
        // CBC: a wrong IV flips bits in block 0 only, so padding still checks out
        let out = decrypt(&ct, &key, &Iv::from_bytes(other)).unwrap();
        assert_ne!(out, plaintext);
        assert_eq!(out[16..], plaintext[16..]);
    }

    proptest! {
        #[test]
        fn roundtrip_any_length(data in proptest::collection::vec(any::<u8>(), 0..=2048)) {
            let key = generate_symmetric_key().unwrap();
            let (iv, ct) = encrypt(&data, &key).unwrap();
            prop_assert_eq!(ct.len() % BLOCK_SIZE, 0);
            prop_assert!(ct.len() > data.len());
            prop_assert_eq!(decrypt(&ct, &key, &iv).unwrap(), data);
        }
    }
}
