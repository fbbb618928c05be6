//! Blob storage for one puzzle session.
//!
//! Tile images, thumbnails, cached feature vectors, and hierarchy snapshots
//! are all persisted through the [`BlobStore`] trait, keyed by opaque
//! engine-generated identifiers. Absence (`get` returning `None`) is a
//! normal condition: a feature vector that was never computed is simply not
//! there yet.
//!
//! Two backends ship out of the box, selected via [`StoreConfig::build`]:
//! an in-memory `HashMap` store (default, used by tests) and a
//! one-file-per-key filesystem store. Structured values (vectors, node
//! lists) go through the bincode helpers [`put_encoded`] / [`get_decoded`].

mod backend;
mod fs;

pub use crate::backend::{BlobStore, InMemoryStore, StoreConfig};
pub use crate::fs::FsStore;

use bincode::config::standard;
use bincode::serde::{decode_from_slice, encode_to_vec};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Errors raised by store backends and the encoding helpers.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),
    #[error("store encode error: {0}")]
    Encode(String),
    #[error("store decode error: {0}")]
    Decode(String),
}

impl StoreError {
    pub fn backend<E: std::fmt::Display>(err: E) -> Self {
        StoreError::Backend(err.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Bincode-encode `value` and store it under `key`.
pub fn put_encoded<T: Serialize>(
    store: &dyn BlobStore,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    let bytes = encode_to_vec(value, standard()).map_err(|err| StoreError::Encode(err.to_string()))?;
    store.put(key, &bytes)
}

/// Fetch and bincode-decode the value under `key`; `None` when absent.
pub fn get_decoded<T: DeserializeOwned>(
    store: &dyn BlobStore,
    key: &str,
) -> Result<Option<T>, StoreError> {
    match store.get(key)? {
        Some(bytes) => {
            let (value, _) = decode_from_slice(&bytes, standard())
                .map_err(|err| StoreError::Decode(err.to_string()))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}
