use thiserror::Error;

use crate::types::ContentId;

pub type SealResult<T> = Result<T, SealError>;

/// Failures of the symmetric/asymmetric primitives.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid key or IV: {0}")]
    InvalidKeyOrIv(String),

    #[error("invalid padding: ciphertext is corrupt or the key/IV is wrong")]
    InvalidPadding,

    #[error("entropy source failed: {0}")]
    Entropy(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("key material: {0}")]
    KeyMaterial(String),
}

#[derive(Debug, Error)]
pub enum SealError {
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("content not found: {0}")]
    NotFound(ContentId),

    /// The decrypted bytes do not hash to the expected digest. The plaintext
    /// is dropped before this error is returned.
    #[error("integrity check failed: expected {expected}, got {actual}")]
    Integrity { expected: String, actual: String },

    #[error("invalid metadata: {0}")]
    Validation(String),

    #[error("metadata signature does not verify")]
    Unauthenticated,

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Fieldless discriminant of [`SealError`], for transports and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Crypto,
    Storage,
    NotFound,
    Integrity,
    Validation,
    Unauthenticated,
    Config,
    Io,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Crypto => "crypto",
            Self::Storage => "storage",
            Self::NotFound => "not_found",
            Self::Integrity => "integrity",
            Self::Validation => "validation",
            Self::Unauthenticated => "unauthenticated",
            Self::Config => "config",
            Self::Io => "io",
        }
    }
}

impl SealError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Crypto(_) => ErrorKind::Crypto,
            Self::Storage(_) => ErrorKind::Storage,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Integrity { .. } => ErrorKind::Integrity,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Unauthenticated => ErrorKind::Unauthenticated,
            Self::Config(_) => ErrorKind::Config,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    /// Only storage failures are worth retrying; everything else reproduces.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

impl From<SealError> for tonic::Status {
    fn from(err: SealError) -> Self {
        let msg = err.to_string();
        match err.kind() {
            ErrorKind::Crypto | ErrorKind::Validation => tonic::Status::invalid_argument(msg),
            ErrorKind::NotFound => tonic::Status::not_found(msg),
            ErrorKind::Integrity => tonic::Status::data_loss(msg),
            ErrorKind::Unauthenticated => tonic::Status::unauthenticated(msg),
            ErrorKind::Storage => tonic::Status::unavailable(msg),
            ErrorKind::Config | ErrorKind::Io => tonic::Status::internal(msg),
        }
    }
}
