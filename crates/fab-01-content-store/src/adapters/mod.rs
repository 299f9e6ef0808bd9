//! Storage backends and location parsing.

mod file;
mod memory;

use std::sync::Arc;

pub use file::FileContentStore;
pub use memory::InMemoryContentStore;

use crate::domain::errors::{StoreError, StoreResult};
use crate::ports::outbound::ContentStore;

/// Opens a backend from a location string.
///
/// - `mem://` (anything after the scheme is ignored): in-memory store
/// - `file:///var/lib/fabrico/content`: filesystem store rooted at that path
pub fn open_store(location: &str) -> StoreResult<Arc<dyn ContentStore>> {
    if location.starts_with("mem://") {
        return Ok(Arc::new(InMemoryContentStore::new()));
    }
    if let Some(path) = location.strip_prefix("file://") {
        if path.is_empty() {
            return Err(StoreError::InvalidLocation(location.to_string()));
        }
        return Ok(Arc::new(FileContentStore::open(path)?));
    }
    Err(StoreError::InvalidLocation(location.to_string()))
}
