//! sealfile-storage: content-addressed blob storage
//!
//! The backup pipeline only needs `put(bytes) -> ContentId` and
//! `get(ContentId) -> bytes`; [`ContentStore`] is that contract and
//! [`OpendalStore`] implements it over any OpenDAL backend (S3, local fs,
//! in-memory).

pub mod operator;
pub mod store;

pub use operator::{build_from_core_config, build_operator, S3Credentials};
pub use store::{content_id_for, ContentStore, OpendalStore};
