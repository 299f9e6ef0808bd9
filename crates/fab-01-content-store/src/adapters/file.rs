use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use shared_types::ContentHash;
use tracing::{debug, info};

use crate::domain::errors::{StoreError, StoreResult};
use crate::ports::outbound::ContentStore;

/// Durable store keeping one file per blob, named by its hex digest.
///
/// Writes go to a hidden temporary file in the same directory which is
/// flushed and then renamed into place. A rename within one directory is
/// atomic, so a digest-named file is always complete.
pub struct FileContentStore {
    root: PathBuf,
}

impl FileContentStore {
    /// Opens (creating if needed) a store rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|e| StoreError::io("create root", e))?;
        info!("[fab-01] 📁 Content store at {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, hash: &ContentHash) -> PathBuf {
        self.root.join(hash.to_hex())
    }

    fn temp_path(&self) -> PathBuf {
        self.root.join(format!(".{}.tmp", uuid::Uuid::new_v4()))
    }
}

impl ContentStore for FileContentStore {
    fn store(&self, data: &[u8]) -> StoreResult<ContentHash> {
        let hash = ContentHash::of(data);
        let final_path = self.blob_path(&hash);
        if final_path.exists() {
            debug!("[fab-01] {} already stored", hash);
            return Ok(hash);
        }

        let temp_path = self.temp_path();
        let write = || -> std::io::Result<()> {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(data)?;
            file.sync_all()?;
            fs::rename(&temp_path, &final_path)
        };
        if let Err(e) = write() {
            let _ = fs::remove_file(&temp_path);
            return Err(StoreError::io("store", e));
        }

        debug!("[fab-01] Stored {} ({} bytes)", hash, data.len());
        Ok(hash)
    }

    fn get(&self, hash: &ContentHash) -> StoreResult<Vec<u8>> {
        fs::read(self.blob_path(hash)).map_err(|e| match e.kind() {
            ErrorKind::NotFound => StoreError::NotFound(*hash),
            _ => StoreError::io("read", e),
        })
    }

    fn delete(&self, hash: &ContentHash) -> StoreResult<()> {
        fs::remove_file(self.blob_path(hash)).map_err(|e| match e.kind() {
            ErrorKind::NotFound => StoreError::NotFound(*hash),
            _ => StoreError::io("delete", e),
        })
    }

    fn contains(&self, hash: &ContentHash) -> StoreResult<bool> {
        self.blob_path(hash)
            .try_exists()
            .map_err(|e| StoreError::io("stat", e))
    }
}
