use std::collections::HashMap;

use parking_lot::Mutex;
use shared_types::ContentHash;

use crate::domain::errors::{StoreError, StoreResult};
use crate::ports::outbound::ContentStore;

/// Volatile store for tests and small deployments.
#[derive(Default)]
pub struct InMemoryContentStore {
    blobs: Mutex<HashMap<ContentHash, Vec<u8>>>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.lock().is_empty()
    }
}

impl ContentStore for InMemoryContentStore {
    fn store(&self, data: &[u8]) -> StoreResult<ContentHash> {
        let hash = ContentHash::of(data);
        self.blobs
            .lock()
            .entry(hash)
            .or_insert_with(|| data.to_vec());
        Ok(hash)
    }

    fn get(&self, hash: &ContentHash) -> StoreResult<Vec<u8>> {
        self.blobs
            .lock()
            .get(hash)
            .cloned()
            .ok_or(StoreError::NotFound(*hash))
    }

    fn delete(&self, hash: &ContentHash) -> StoreResult<()> {
        self.blobs
            .lock()
            .remove(hash)
            .map(|_| ())
            .ok_or(StoreError::NotFound(*hash))
    }

    fn contains(&self, hash: &ContentHash) -> StoreResult<bool> {
        Ok(self.blobs.lock().contains_key(hash))
    }
}
