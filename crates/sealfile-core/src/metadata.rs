//! Backup metadata record and its canonical serialization
//!
//! Canonical form (the bytes that get signed):
//! ```text
//! {"filename":..,"timestamp":..,"version":1,"iv":..,"symmetricKey":..,"fileHash":..}
//! ```
//! Compact JSON, fixed key order, no `signature` key. Producer and verifier
//! both go through [`CanonicalView`], so the order cannot drift between them.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{SealError, SealResult, HASH_SIZE, IV_SIZE, KEY_SIZE};

/// The signed record of one backup. Created once, never mutated.
///
/// `symmetric_key` and `iv` live in the record itself: whoever holds the
/// record can decrypt the blob. The store only ever sees ciphertext.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BackupMetadata {
    /// Original file name (advisory only)
    pub filename: String,
    /// ISO-8601 UTC creation time
    pub timestamp: String,
    pub version: u32,
    /// AES-CBC IV (hex, 16 bytes)
    pub iv: String,
    /// AES-256 key for this backup only (hex, 32 bytes)
    pub symmetric_key: String,
    /// SHA-256 of the plaintext (hex, 32 bytes)
    pub file_hash: String,
    /// RSA-SHA256 signature over the canonical form (hex)
    pub signature: String,
}

/// A metadata record whose fields are final but which is not signed yet.
#[derive(Clone, PartialEq, Eq)]
pub struct UnsignedMetadata {
    pub filename: String,
    pub timestamp: String,
    pub version: u32,
    pub iv: String,
    pub symmetric_key: String,
    pub file_hash: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CanonicalView<'a> {
    filename: &'a str,
    timestamp: &'a str,
    version: u32,
    iv: &'a str,
    symmetric_key: &'a str,
    file_hash: &'a str,
}

impl CanonicalView<'_> {
    fn to_bytes(&self) -> SealResult<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| SealError::Validation(format!("canonical serialization: {e}")))
    }
}

impl UnsignedMetadata {
    fn view(&self) -> CanonicalView<'_> {
        CanonicalView {
            filename: &self.filename,
            timestamp: &self.timestamp,
            version: self.version,
            iv: &self.iv,
            symmetric_key: &self.symmetric_key,
            file_hash: &self.file_hash,
        }
    }

    /// The exact bytes to sign.
    pub fn canonical_bytes(&self) -> SealResult<Vec<u8>> {
        self.view().to_bytes()
    }

    /// Attach a signature produced over [`Self::canonical_bytes`].
    pub fn with_signature(self, signature: &[u8]) -> BackupMetadata {
        BackupMetadata {
            filename: self.filename,
            timestamp: self.timestamp,
            version: self.version,
            iv: self.iv,
            symmetric_key: self.symmetric_key,
            file_hash: self.file_hash,
            signature: hex::encode(signature),
        }
    }
}

impl BackupMetadata {
    fn view(&self) -> CanonicalView<'_> {
        CanonicalView {
            filename: &self.filename,
            timestamp: &self.timestamp,
            version: self.version,
            iv: &self.iv,
            symmetric_key: &self.symmetric_key,
            file_hash: &self.file_hash,
        }
    }

    /// Canonical bytes of every field except `signature`.
    pub fn canonical_bytes(&self) -> SealResult<Vec<u8>> {
        self.view().to_bytes()
    }

    /// Parse a record from JSON and check its structure.
    ///
    /// Missing or unknown fields and malformed hex are `Validation` errors.
    /// A well-formed record with a bad signature parses fine; signature
    /// checking is the verifier's job.
    pub fn from_json(s: &str) -> SealResult<Self> {
        let metadata: Self = serde_json::from_str(s)
            .map_err(|e| SealError::Validation(format!("metadata: {e}")))?;
        metadata.validate()?;
        Ok(metadata)
    }

    pub fn to_json(&self) -> SealResult<String> {
        serde_json::to_string(self)
            .map_err(|e| SealError::Validation(format!("metadata serialization: {e}")))
    }

    /// Structural checks: hex fields decode to the right lengths.
    pub fn validate(&self) -> SealResult<()> {
        decode_field("iv", &self.iv, Some(IV_SIZE))?;
        decode_field("symmetricKey", &self.symmetric_key, Some(KEY_SIZE))?;
        decode_field("fileHash", &self.file_hash, Some(HASH_SIZE))?;
        let sig = decode_field("signature", &self.signature, None)?;
        if sig.is_empty() {
            return Err(SealError::Validation("signature is empty".into()));
        }
        Ok(())
    }

    /// Signature bytes (hex-decoded)
    pub fn signature_bytes(&self) -> SealResult<Vec<u8>> {
        decode_field("signature", &self.signature, None)
    }
}

/// Decode a lowercase hex field, optionally requiring an exact byte length.
///
/// Uppercase digits are rejected: each byte string has exactly one accepted
/// spelling, so an edited field can never decode to the original bytes.
pub fn decode_field(name: &str, value: &str, len: Option<usize>) -> SealResult<Vec<u8>> {
    if let Some(c) = value.chars().find(|c| !matches!(c, '0'..='9' | 'a'..='f')) {
        return Err(SealError::Validation(format!(
            "{name} must be lowercase hex, found {c:?}"
        )));
    }
    let bytes = hex::decode(value)
        .map_err(|e| SealError::Validation(format!("{name} is not valid hex: {e}")))?;
    if let Some(expected) = len {
        if bytes.len() != expected {
            return Err(SealError::Validation(format!(
                "{name} must be {expected} bytes, got {}",
                bytes.len()
            )));
        }
    }
    Ok(bytes)
}

impl fmt::Debug for BackupMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackupMetadata")
            .field("filename", &self.filename)
            .field("timestamp", &self.timestamp)
            .field("version", &self.version)
            .field("iv", &self.iv)
            .field("symmetric_key", &"[REDACTED]")
            .field("file_hash", &self.file_hash)
            .field("signature", &self.signature)
            .finish()
    }
}

impl fmt::Debug for UnsignedMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnsignedMetadata")
            .field("filename", &self.filename)
            .field("timestamp", &self.timestamp)
            .field("version", &self.version)
            .field("iv", &self.iv)
            .field("symmetric_key", &"[REDACTED]")
            .field("file_hash", &self.file_hash)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BackupMetadata {
        BackupMetadata {
            filename: "notes.txt".into(),
            timestamp: "2025-03-01T12:00:00.000Z".into(),
            version: 1,
            iv: "00".repeat(IV_SIZE),
            symmetric_key: "11".repeat(KEY_SIZE),
            file_hash: "22".repeat(HASH_SIZE),
            signature: "abcd".into(),
        }
    }

    #[test]
    fn canonical_form_has_fixed_order_and_no_signature() {
        let bytes = sample().canonical_bytes().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let expected = format!(
            r#"{{"filename":"notes.txt","timestamp":"2025-03-01T12:00:00.000Z","version":1,"iv":"{}","symmetricKey":"{}","fileHash":"{}"}}"#,
            "00".repeat(16),
            "11".repeat(32),
            "22".repeat(32)
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn unsigned_and_signed_serialize_identically() {
        let m = sample();
        let unsigned = UnsignedMetadata {
            filename: m.filename.clone(),
            timestamp: m.timestamp.clone(),
            version: m.version,
            iv: m.iv.clone(),
            symmetric_key: m.symmetric_key.clone(),
            file_hash: m.file_hash.clone(),
        };
        assert_eq!(
            unsigned.canonical_bytes().unwrap(),
            m.canonical_bytes().unwrap()
        );

        let signed = unsigned.with_signature(&[0xab, 0xcd]);
        assert_eq!(signed, m);
    }

    #[test]
    fn input_key_order_does_not_matter() {
        let m = sample();
        let reordered = format!(
            r#"{{"signature":"abcd","fileHash":"{}","symmetricKey":"{}","iv":"{}","version":1,"timestamp":"2025-03-01T12:00:00.000Z","filename":"notes.txt"}}"#,
            m.file_hash, m.symmetric_key, m.iv
        );
        let parsed = BackupMetadata::from_json(&reordered).unwrap();
        assert_eq!(
            parsed.canonical_bytes().unwrap(),
            m.canonical_bytes().unwrap()
        );
    }

    #[test]
    fn json_roundtrip_preserves_canonical_bytes() {
        let m = sample();
        let parsed = BackupMetadata::from_json(&m.to_json().unwrap()).unwrap();
        assert_eq!(parsed, m);
    }

    #[test]
    fn missing_field_is_validation_error() {
        let json = r#"{"filename":"a","timestamp":"t","version":1,"iv":"00","fileHash":"00","signature":"00"}"#;
        let err = BackupMetadata::from_json(json).unwrap_err();
        assert!(matches!(err, SealError::Validation(_)));
        assert!(err.to_string().contains("symmetricKey"));
    }

    #[test]
    fn unknown_field_is_validation_error() {
        let mut value = serde_json::to_value(sample()).unwrap();
        value["cid"] = serde_json::json!("blake3:00");
        let err = BackupMetadata::from_json(&value.to_string()).unwrap_err();
        assert!(matches!(err, SealError::Validation(_)));
    }

    #[test]
    fn non_hex_and_short_fields_rejected() {
        let mut m = sample();
        m.iv = "zz".repeat(IV_SIZE);
        assert!(matches!(m.validate(), Err(SealError::Validation(_))));

        let mut m = sample();
        m.symmetric_key = "11".repeat(16);
        let err = m.validate().unwrap_err();
        assert!(err.to_string().contains("symmetricKey must be 32 bytes"));

        let mut m = sample();
        m.signature = String::new();
        assert!(matches!(m.validate(), Err(SealError::Validation(_))));
    }

    #[test]
    fn uppercase_hex_rejected() {
        let mut m = sample();
        m.signature = "ABCD".into();
        let err = m.validate().unwrap_err();
        assert!(err.to_string().contains("signature must be lowercase hex"));

        let mut m = sample();
        m.file_hash = "2A".repeat(HASH_SIZE);
        assert!(matches!(m.validate(), Err(SealError::Validation(_))));
        assert!(matches!(
            decode_field("iv", &"0F".repeat(IV_SIZE), Some(IV_SIZE)),
            Err(SealError::Validation(_))
        ));
    }

    #[test]
    fn debug_redacts_key() {
        let rendered = format!("{:?}", sample());
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains(&"11".repeat(KEY_SIZE)));
    }
}
