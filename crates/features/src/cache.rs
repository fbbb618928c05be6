//! Per-session feature cache with read-through-compute-on-miss semantics.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use hierarchy::HierarchyNode;
use store::{get_decoded, put_encoded, BlobStore, StoreError};
use tiling::TileRecord;
use tracing::debug;

use crate::{ExtractionError, FeatureExtractor};

/// Errors raised while resolving a feature vector.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum CacheError {
    /// A tile blob that should exist was absent from the store. Surfaced,
    /// never silently skipped.
    #[error("stored blob missing for key {0}")]
    StorageMissing(String),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

struct CacheInner {
    vectors: HashMap<String, Arc<Vec<f32>>>,
    /// Session vector dimension, established by the first vector computed.
    dimension: Option<usize>,
}

/// Identifier-keyed memo of feature vectors for tiles and hierarchy nodes.
///
/// Resolution order for a tile: in-memory cache, then the persisted vector
/// in the blob store, then extraction from the tile's image blob (the
/// result is persisted and cached). A node's vector is the element-wise
/// mean of its member tiles' vectors; a node with zero resolvable members
/// gets a zero vector at the session dimension so hierarchy traversal
/// stays total.
///
/// Caching is by identifier, not content: two tiles with identical pixels
/// still get separate entries. One mutex guards the whole map across the
/// compute, so concurrent requests for the same identifier collapse into a
/// single extraction; vectors are computed one at a time by design.
pub struct FeatureCache {
    store: Arc<dyn BlobStore>,
    extractor: Arc<dyn FeatureExtractor>,
    inner: Mutex<CacheInner>,
}

impl FeatureCache {
    pub fn new(store: Arc<dyn BlobStore>, extractor: Arc<dyn FeatureExtractor>) -> Self {
        Self {
            store,
            extractor,
            inner: Mutex::new(CacheInner {
                vectors: HashMap::new(),
                dimension: None,
            }),
        }
    }

    /// Resolve the feature vector for one tile, computing and persisting it
    /// on first access.
    pub fn ensure_tile(&self, tile: &TileRecord) -> Result<Arc<Vec<f32>>, CacheError> {
        let mut inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        self.ensure_tile_locked(&mut inner, tile)
    }

    /// Resolve the feature vector for a hierarchy node as the mean of its
    /// member tiles' vectors. Members absent from `tiles` are skipped; a
    /// node with no resolvable members yields a zero vector.
    pub fn ensure_node(
        &self,
        node: &HierarchyNode,
        tiles: &HashMap<String, TileRecord>,
    ) -> Result<Arc<Vec<f32>>, CacheError> {
        let mut inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(hit) = inner.vectors.get(&node.id) {
            return Ok(Arc::clone(hit));
        }

        let mut members = Vec::new();
        for piece_id in &node.piece_ids {
            let Some(tile) = tiles.get(piece_id) else {
                continue;
            };
            members.push(self.ensure_tile_locked(&mut inner, tile)?);
        }

        let vector = if members.is_empty() {
            debug!(node_id = %node.id, "node_without_resolvable_members");
            Arc::new(vec![0.0; inner.dimension.unwrap_or(1)])
        } else {
            let dimension = members[0].len();
            let mut mean = vec![0.0f32; dimension];
            for member in &members {
                for (slot, value) in mean.iter_mut().zip(member.iter()) {
                    *slot += value;
                }
            }
            for slot in &mut mean {
                *slot /= members.len() as f32;
            }
            Arc::new(mean)
        };

        inner.vectors.insert(node.id.clone(), Arc::clone(&vector));
        Ok(vector)
    }

    /// Session vector dimension, once established.
    pub fn dimension(&self) -> Option<usize> {
        self.inner
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .dimension
    }

    /// Drop every cached vector and the established dimension. Called on
    /// session reset; persisted vectors are cleared with the store itself.
    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        inner.vectors.clear();
        inner.dimension = None;
    }

    fn ensure_tile_locked(
        &self,
        inner: &mut CacheInner,
        tile: &TileRecord,
    ) -> Result<Arc<Vec<f32>>, CacheError> {
        if let Some(hit) = inner.vectors.get(&tile.id) {
            return Ok(Arc::clone(hit));
        }

        let feature_key = tile
            .feature_key
            .clone()
            .unwrap_or_else(|| tile.default_feature_key());

        if let Some(stored) = get_decoded::<Vec<f32>>(self.store.as_ref(), &feature_key)? {
            inner.dimension.get_or_insert(stored.len());
            let vector = Arc::new(stored);
            inner.vectors.insert(tile.id.clone(), Arc::clone(&vector));
            return Ok(vector);
        }

        let blob = self
            .store
            .get(&tile.blob_key)?
            .ok_or_else(|| CacheError::StorageMissing(tile.blob_key.clone()))?;
        let vector = self.extractor.extract(&blob)?;
        inner.dimension.get_or_insert(vector.len());

        put_encoded(self.store.as_ref(), &feature_key, &vector)?;
        let vector = Arc::new(vector);
        inner.vectors.insert(tile.id.clone(), Arc::clone(&vector));
        Ok(vector)
    }
}
