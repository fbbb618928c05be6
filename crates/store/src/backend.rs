use std::sync::RwLock;

use crate::StoreError;

/// Trait for a key-value blob store backing one puzzle session.
///
/// Keys are opaque identifiers chosen by the engine (tile blobs,
/// thumbnails, feature vectors, hierarchy snapshots). A missing key on
/// `get` is a normal, handleable condition (`Ok(None)`), never an error.
pub trait BlobStore: Send + Sync {
    /// Insert or overwrite a blob.
    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;
    /// Retrieve a blob by key; `None` when absent.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
    /// Delete a blob; deleting an absent key is not an error.
    fn delete(&self, key: &str) -> Result<(), StoreError>;
    /// Remove every blob. Called on session reset.
    fn clear(&self) -> Result<(), StoreError>;
}

/// Configuration for selecting and building a store backend.
#[derive(Clone, Debug, Default)]
pub enum StoreConfig {
    /// In-memory HashMap store. The default; also what tests use.
    #[default]
    InMemory,
    /// One file per key under `root`. Survives process restarts.
    Fs { root: std::path::PathBuf },
}

impl StoreConfig {
    pub fn in_memory() -> Self {
        StoreConfig::InMemory
    }

    pub fn fs<P: Into<std::path::PathBuf>>(root: P) -> Self {
        StoreConfig::Fs { root: root.into() }
    }

    /// Build the backend described by this configuration.
    pub fn build(&self) -> Result<Box<dyn BlobStore>, StoreError> {
        match self {
            StoreConfig::InMemory => Ok(Box::new(InMemoryStore::new())),
            StoreConfig::Fs { root } => Ok(Box::new(crate::fs::FsStore::open(root)?)),
        }
    }
}

/// An in-memory store using a `RwLock` around a `HashMap`.
pub struct InMemoryStore {
    blobs: RwLock<std::collections::HashMap<String, Vec<u8>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            blobs: RwLock::new(std::collections::HashMap::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BlobStore for InMemoryStore {
    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.blobs
            .write()
            .map_err(|_| StoreError::backend("poisoned lock"))?
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let guard = self
            .blobs
            .read()
            .map_err(|_| StoreError::backend("poisoned lock"))?;
        Ok(guard.get(key).cloned())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.blobs
            .write()
            .map_err(|_| StoreError::backend("poisoned lock"))?
            .remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.blobs
            .write()
            .map_err(|_| StoreError::backend("poisoned lock"))?
            .clear();
        Ok(())
    }
}
