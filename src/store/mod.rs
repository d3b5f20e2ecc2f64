//! Object store adapters for uploads and staged outputs.

mod gcs;
mod memory;

pub use gcs::{GcsStore, GcsStoreBuilder};
pub use memory::MemoryStore;

use crate::error::Result;
use async_trait::async_trait;

/// A persisted object and where to retrieve it from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Key the object was stored under.
    pub key: String,
    /// Retrieval URI, understood by the same adapter's `get`.
    pub uri: String,
    /// Stored size in bytes.
    pub size: usize,
}

/// Trait for blob storage backends.
///
/// `put` has overwrite semantics: re-storing under an existing key replaces
/// the object, so a user re-uploading the same filename always wins.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Persists bytes under a key, returning the stored object's URI.
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<StoredObject>;

    /// Retrieves the bytes behind a URI previously returned by `put`.
    async fn get(&self, uri: &str) -> Result<Vec<u8>>;

    /// Checks whether an object exists under the given key.
    async fn exists(&self, key: &str) -> Result<bool>;
}
