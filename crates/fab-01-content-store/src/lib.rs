//! # Content Store Subsystem (fab-01)
//!
//! Content-addressed blob storage. A blob's key is the SHA3-512 digest of its
//! bytes, so stored content is immutable and storing the same bytes twice
//! converges to one entry.
//!
//! ## Backends
//!
//! | Backend | Location | Durability |
//! |---------|----------|------------|
//! | [`InMemoryContentStore`] | `mem://` | Volatile |
//! | [`FileContentStore`] | `file:///path` | Survives restarts |
//!
//! The filesystem backend writes each blob under a temporary name and renames
//! it to its hex digest, so readers never observe a partially written blob.

pub mod adapters;
pub mod domain;
pub mod ports;

pub use adapters::{open_store, FileContentStore, InMemoryContentStore};
pub use domain::errors::{StoreError, StoreResult};
pub use ports::outbound::ContentStore;
