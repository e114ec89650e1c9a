#![allow(dead_code)]

use std::sync::{Arc, OnceLock};

use sealfile_core::{ContentId, SealError, SealResult};
use sealfile_crypto::{CryptoEngine, KeyPair};
use sealfile_storage::{ContentStore, OpendalStore};

/// One 2048-bit signing key for the whole test binary.
pub fn engine() -> Arc<CryptoEngine> {
    static ENGINE: OnceLock<Arc<CryptoEngine>> = OnceLock::new();
    ENGINE
        .get_or_init(|| Arc::new(CryptoEngine::new(KeyPair::generate(2048).expect("keygen"))))
        .clone()
}

/// A second, unrelated signing authority.
pub fn foreign_engine() -> Arc<CryptoEngine> {
    static ENGINE: OnceLock<Arc<CryptoEngine>> = OnceLock::new();
    ENGINE
        .get_or_init(|| Arc::new(CryptoEngine::new(KeyPair::generate(2048).expect("keygen"))))
        .clone()
}

pub fn memory_store() -> OpendalStore {
    OpendalStore::memory().expect("memory store")
}

/// Replace the bytes stored under `id` without changing the id.
pub async fn overwrite_blob(store: &OpendalStore, id: &ContentId, bytes: Vec<u8>) {
    let hex = id.as_str().strip_prefix("blake3:").expect("blake3 id");
    store
        .operator()
        .write(&store.blob_key(hex), bytes)
        .await
        .expect("overwrite blob");
}

/// Store whose backend is always down.
#[derive(Clone, Default)]
pub struct FailingStore;

impl ContentStore for FailingStore {
    async fn put(&self, _bytes: Vec<u8>) -> SealResult<ContentId> {
        Err(SealError::Storage("backend unavailable".into()))
    }

    async fn get(&self, _id: &ContentId) -> SealResult<Vec<u8>> {
        Err(SealError::Storage("backend unavailable".into()))
    }
}
