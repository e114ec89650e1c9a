//! sealfile-crypto: primitives behind the backup/restore pipeline
//!
//! - File bytes: AES-256-CBC with PKCS#7 padding, fresh random IV per call
//! - Integrity: SHA-256 over the plaintext
//! - Metadata authenticity: RSA-SHA256, PKCS#1 v1.5 padding
//!
//! ```text
//! RSA key pair (process-wide, loaded once, held by CryptoEngine)
//!   └── signs BackupMetadata canonical bytes
//! Symmetric key (per backup, 256-bit random, stored in the metadata record)
//!   └── AES-256-CBC(key, iv=random 128-bit) over the whole file
//! ```

pub mod cipher;
pub mod digest;
pub mod engine;
pub mod keys;
pub mod signing;

pub use cipher::{decrypt, encrypt, BLOCK_SIZE};
pub use digest::{digest, FileHash};
pub use engine::CryptoEngine;
pub use keys::{generate_symmetric_key, Iv, SymmetricKey};
pub use signing::{KeyPair, PublicKey, DEFAULT_RSA_BITS};
