//! sealfile-backup: the backup/restore pipeline
//!
//! ```text
//! backup:  plaintext ─ SHA-256 ─┐
//!                    ─ AES-256-CBC(fresh key, fresh iv) ─ ciphertext ─ store.put ─ ContentId
//!          {filename, timestamp, version, iv, key, fileHash} ─ canonical JSON ─ RSA sign
//!
//! restore: store.get(ContentId) ─ AES-256-CBC⁻¹(key, iv) ─ SHA-256 == expected? ─ plaintext
//! ```
//!
//! The metadata record is the capability to decrypt: it carries the key and
//! IV. The store only ever holds ciphertext. The signature proves the record
//! came from the signing authority; it does not name the ContentId.

pub mod backup;
pub mod restore;
pub mod service;
pub mod verify;

pub use backup::BackupPipeline;
pub use restore::{decrypt_verified, RestorePipeline};
pub use service::BackupService;
pub use verify::MetadataVerifier;
