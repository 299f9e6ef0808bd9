//! Storage port implemented by every backend.

use shared_types::ContentHash;

use crate::domain::errors::StoreResult;

/// Content-addressed blob storage.
///
/// Implementations must be safe to share between threads; concurrent
/// `store` calls with identical bytes must converge to a single entry.
pub trait ContentStore: Send + Sync {
    /// Stores `data` and returns its digest. Storing existing content is a no-op.
    fn store(&self, data: &[u8]) -> StoreResult<ContentHash>;

    /// Returns the bytes stored under `hash`, or `StoreError::NotFound`.
    fn get(&self, hash: &ContentHash) -> StoreResult<Vec<u8>>;

    /// Removes the blob, or fails with `StoreError::NotFound`.
    fn delete(&self, hash: &ContentHash) -> StoreResult<()>;

    fn contains(&self, hash: &ContentHash) -> StoreResult<bool>;
}
