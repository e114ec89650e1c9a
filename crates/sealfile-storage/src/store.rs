//! Content-addressed blob store
//!
//! Identifiers are `blake3:<64 hex>` of the stored bytes. Objects live at
//! `{prefix}/blobs/{hex}`. Writing the same bytes twice is a no-op, so
//! independent backups may `put` concurrently without coordination.

use std::future::Future;

use opendal::{ErrorKind as DalErrorKind, Operator};
use sealfile_core::{ContentId, SealError, SealResult};
use tracing::debug;

const SCHEME: &str = "blake3:";

/// `put(bytes) -> ContentId` / `get(ContentId) -> bytes`.
///
/// Implementations must return blobs verbatim and report unknown ids as
/// [`SealError::NotFound`]; any other backend failure is
/// [`SealError::Storage`].
pub trait ContentStore: Send + Sync {
    fn put(&self, bytes: Vec<u8>) -> impl Future<Output = SealResult<ContentId>> + Send;

    fn get(&self, id: &ContentId) -> impl Future<Output = SealResult<Vec<u8>>> + Send;
}

/// The identifier a blob with these bytes gets.
pub fn content_id_for(bytes: &[u8]) -> ContentId {
    ContentId::new(format!("{SCHEME}{}", blake3::hash(bytes).to_hex()))
}

/// Lowercase hex digest of a well-formed identifier, `None` for anything
/// else. Keys are always lowercase, so `blake3:ABC..` finds `blake3:abc..`.
fn digest_hex(id: &ContentId) -> Option<String> {
    let hex = id.as_str().strip_prefix(SCHEME)?;
    (hex.len() == 64 && hex.bytes().all(|b| b.is_ascii_hexdigit()))
        .then(|| hex.to_ascii_lowercase())
}

/// [`ContentStore`] over an OpenDAL operator.
#[derive(Debug, Clone)]
pub struct OpendalStore {
    op: Operator,
    prefix: String,
}

impl OpendalStore {
    pub fn new(op: Operator, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into().trim_matches('/').to_string();
        Self { op, prefix }
    }

    /// Fresh in-memory store, contents lost on drop.
    pub fn memory() -> SealResult<Self> {
        let op = Operator::new(opendal::services::Memory::default())
            .map_err(|e| SealError::Storage(format!("creating memory operator: {e}")))?
            .finish();
        Ok(Self::new(op, ""))
    }

    pub fn operator(&self) -> &Operator {
        &self.op
    }

    /// Object key for a blob digest
    pub fn blob_key(&self, hex: &str) -> String {
        format!("{}{hex}", self.blob_dir())
    }

    fn blob_dir(&self) -> String {
        if self.prefix.is_empty() {
            "blobs/".to_string()
        } else {
            format!("{}/blobs/", self.prefix)
        }
    }

    /// Reachability probe. Fetches at most the first listing page, so the
    /// cost does not grow with the number of stored blobs. An empty store
    /// is healthy; only backend errors count.
    pub async fn health(&self) -> SealResult<()> {
        self.op
            .check()
            .await
            .map_err(|e| SealError::Storage(format!("storage health check failed: {e}")))
    }
}

impl ContentStore for OpendalStore {
    async fn put(&self, bytes: Vec<u8>) -> SealResult<ContentId> {
        let id = content_id_for(&bytes);
        let key = match digest_hex(&id) {
            Some(hex) => self.blob_key(&hex),
            None => return Err(SealError::Storage(format!("malformed content id {id}"))),
        };

        let exists = self
            .op
            .exists(&key)
            .await
            .map_err(|e| SealError::Storage(format!("checking {key}: {e}")))?;
        if exists {
            debug!(content_id = %id, "dedup: blob already stored");
            return Ok(id);
        }

        let len = bytes.len();
        self.op
            .write(&key, bytes)
            .await
            .map_err(|e| SealError::Storage(format!("writing {key}: {e}")))?;
        debug!(content_id = %id, bytes = len, "blob stored");
        Ok(id)
    }

    async fn get(&self, id: &ContentId) -> SealResult<Vec<u8>> {
        let Some(hex) = digest_hex(id) else {
            return Err(SealError::NotFound(id.clone()));
        };
        let key = self.blob_key(&hex);

        match self.op.read(&key).await {
            Ok(buf) => Ok(buf.to_vec()),
            Err(e) if e.kind() == DalErrorKind::NotFound => Err(SealError::NotFound(id.clone())),
            Err(e) => Err(SealError::Storage(format!("reading {key}: {e}"))),
        }
    }
}
