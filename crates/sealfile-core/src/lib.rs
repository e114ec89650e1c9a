pub mod config;
pub mod error;
pub mod metadata;
pub mod types;

pub use error::{CryptoError, ErrorKind, SealError, SealResult};
pub use metadata::BackupMetadata;
pub use types::{BackupReceipt, ContentId};

/// Size of the AES-256 key in bytes
pub const KEY_SIZE: usize = 32;

/// Size of the AES-CBC initialization vector in bytes
pub const IV_SIZE: usize = 16;

/// Size of a SHA-256 digest in bytes
pub const HASH_SIZE: usize = 32;

/// Current metadata schema version
pub const METADATA_VERSION: u32 = 1;

/// Generated gRPC types and service traits (from sealfile.proto)
pub mod proto {
    tonic::include_proto!("sealfile");
}
