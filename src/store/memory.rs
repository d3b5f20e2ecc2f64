//! In-memory object store, for tests and offline runs.

use crate::error::{Result, StageError};
use crate::store::{ObjectStore, StoredObject};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

const URI_SCHEME: &str = "mem://";

/// Object store backed by a process-local map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.lock().expect("store lock poisoned").len()
    }

    /// Whether the store holds no objects.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, _content_type: &str) -> Result<StoredObject> {
        let size = bytes.len();
        self.objects
            .lock()
            .expect("store lock poisoned")
            .insert(key.to_string(), bytes);

        Ok(StoredObject {
            key: key.to_string(),
            uri: format!("{URI_SCHEME}{key}"),
            size,
        })
    }

    async fn get(&self, uri: &str) -> Result<Vec<u8>> {
        let key = uri
            .strip_prefix(URI_SCHEME)
            .ok_or_else(|| StageError::Storage(format!("not a memory store URI: {uri}")))?;

        self.objects
            .lock()
            .expect("store lock poisoned")
            .get(key)
            .cloned()
            .ok_or_else(|| StageError::Storage(format!("no object under key: {key}")))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self
            .objects
            .lock()
            .expect("store lock poisoned")
            .contains_key(key))
    }
}
