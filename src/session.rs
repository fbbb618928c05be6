//! Session state machine and background-task orchestration.
//!
//! One [`PuzzleSession`] owns everything for one puzzle: the grid, the tile
//! records, the spatial hierarchy, the feature cache, the blob store, and
//! the two single-in-flight task runners (split, match). All of it is
//! invalidated together on re-upload, piece-count change, or reset.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use features::{FeatureCache, FeatureExtractor};
use hierarchy::{build_hierarchy, HierarchyConfig, HierarchyNode};
use matcher::{HierarchyPathItem, MatchConfig, MatchOutcome, NodeVector, PieceVector};
use store::{BlobStore, StoreConfig};
use tiling::{
    calculate_tile_size, decode_image, derive_grid, split_image, PuzzleGrid, SplitConfig,
    SplitOutcome, TileRecord,
};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::task::{ProgressSink, TaskHandle, TaskRunner};

/// Processing phase of a session. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Idle,
    Splitting,
    Ready,
    Matching,
    MatchFound,
    MatchNotFound,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Splitting => "splitting",
            Phase::Ready => "ready",
            Phase::Matching => "matching",
            Phase::MatchFound => "match-found",
            Phase::MatchNotFound => "match-not-found",
        };
        f.write_str(name)
    }
}

struct SessionState {
    phase: Phase,
    /// Bumped by every state-changing operation. Workers capture the epoch
    /// at submit time and only write back if it is unchanged, so a stale or
    /// superseded worker can never clobber a newer operation's state.
    epoch: u64,
    puzzle_id: Option<String>,
    grid: Option<PuzzleGrid>,
    image_size: Option<(u32, u32)>,
    source: Option<DynamicImage>,
    tiles: Vec<TileRecord>,
    hierarchy: Vec<HierarchyNode>,
    last_match: Option<MatchOutcome>,
}

impl SessionState {
    fn new() -> Self {
        Self {
            phase: Phase::Idle,
            epoch: 0,
            puzzle_id: None,
            grid: None,
            image_size: None,
            source: None,
            tiles: Vec::new(),
            hierarchy: Vec::new(),
            last_match: None,
        }
    }

    fn discard_artifacts(&mut self) {
        self.tiles.clear();
        self.hierarchy.clear();
        self.last_match = None;
    }
}

/// The piece localization engine for one puzzle session.
///
/// `upload` and `set_piece_count` validate synchronously; `split` and
/// `match_piece` hand back a [`TaskHandle`] whose channel carries progress
/// messages followed by exactly one terminal. Issuing a new split or match
/// while the previous one is pending supersedes it (see the task module).
pub struct PuzzleSession {
    state: Arc<Mutex<SessionState>>,
    store: Arc<dyn BlobStore>,
    extractor: Arc<dyn FeatureExtractor>,
    cache: Arc<FeatureCache>,
    split_runner: TaskRunner<SplitOutcome>,
    match_runner: TaskRunner<MatchOutcome>,
    config: EngineConfig,
}

impl PuzzleSession {
    /// Build a session over an explicit store and extractor.
    pub fn new(
        store: Arc<dyn BlobStore>,
        extractor: Arc<dyn FeatureExtractor>,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let cache = Arc::new(FeatureCache::new(
            Arc::clone(&store),
            Arc::clone(&extractor),
        ));
        Ok(Self {
            state: Arc::new(Mutex::new(SessionState::new())),
            store,
            extractor,
            cache,
            split_runner: TaskRunner::new(),
            match_runner: TaskRunner::new(),
            config,
        })
    }

    /// Convenience constructor over an in-memory store with defaults.
    pub fn in_memory(extractor: Arc<dyn FeatureExtractor>) -> Result<Self, EngineError> {
        let store: Arc<dyn BlobStore> = Arc::from(StoreConfig::in_memory().build()?);
        Self::new(store, extractor, EngineConfig::default())
    }

    /// Upload a new puzzle photo with a requested piece count.
    ///
    /// Validation (piece count, image decode) happens first and returns
    /// synchronously; only a valid upload discards the previous session's
    /// tiles, hierarchy, caches, and stored blobs. The source bytes are
    /// also persisted so a failed split can be retried without re-upload.
    pub fn upload(&self, bytes: &[u8], requested_pieces: f64) -> Result<PuzzleGrid, EngineError> {
        let grid = derive_grid(requested_pieces)?;
        let image = decode_image(bytes)?;
        let puzzle_id = format!("puzzle-{}", Uuid::new_v4());

        self.store.clear()?;
        self.cache.clear();
        self.store.put(&source_key(&puzzle_id), bytes)?;

        let mut state = self.lock_state();
        state.epoch += 1;
        state.discard_artifacts();
        state.image_size = Some((image.width(), image.height()));
        state.source = Some(image);
        state.grid = Some(grid);
        state.puzzle_id = Some(puzzle_id.clone());
        state.phase = Phase::Idle;
        drop(state);

        info!(
            puzzle_id = %puzzle_id,
            rows = grid.rows,
            cols = grid.cols,
            "puzzle_uploaded"
        );
        Ok(grid)
    }

    /// Change the requested piece count for the current image.
    ///
    /// Discards tiles, hierarchy, cached vectors, and any match result;
    /// the next split uses the recomputed grid.
    pub fn set_piece_count(&self, requested_pieces: f64) -> Result<PuzzleGrid, EngineError> {
        let grid = derive_grid(requested_pieces)?;

        let mut state = self.lock_state();
        if state.puzzle_id.is_none() {
            return Err(EngineError::NoSourceImage);
        }
        state.epoch += 1;
        state.discard_artifacts();
        state.grid = Some(grid);
        state.phase = Phase::Idle;
        drop(state);

        self.cache.clear();
        Ok(grid)
    }

    /// Split the uploaded image into tiles on a background task.
    ///
    /// Allowed from `idle` and `ready` (and from `splitting`, which
    /// supersedes the pending split). On success the session moves to
    /// `ready` with the tile list and a freshly built hierarchy; on failure
    /// it rolls back to `idle`.
    pub fn split(&self) -> Result<TaskHandle<SplitOutcome>, EngineError> {
        let (epoch, puzzle_id, grid, image_size, source) = {
            let mut state = self.lock_state();
            match state.phase {
                Phase::Idle | Phase::Ready | Phase::Splitting => {}
                other => {
                    return Err(EngineError::InvalidPhase {
                        operation: "split",
                        phase: other,
                    })
                }
            }
            let puzzle_id = state.puzzle_id.clone().ok_or(EngineError::NoSourceImage)?;
            let grid = state.grid.ok_or(EngineError::NoSourceImage)?;
            let image_size = state.image_size.ok_or(EngineError::NoSourceImage)?;
            // Ownership of the decoded image moves into the worker; the
            // session-side handle is gone from here on.
            let source = state.source.take();
            state.epoch += 1;
            state.discard_artifacts();
            state.phase = Phase::Splitting;
            (state.epoch, puzzle_id, grid, image_size, source)
        };

        let state_arc = Arc::clone(&self.state);
        let store = Arc::clone(&self.store);
        let split_cfg = SplitConfig {
            thumbnail_max_dim: self.config.thumbnail_max_dim,
        };
        let hierarchy_cfg = self.config.hierarchy;

        let handle = self.split_runner.submit(move |sink| {
            let result = run_split(
                &store,
                source,
                &puzzle_id,
                &grid,
                image_size,
                &split_cfg,
                &hierarchy_cfg,
                sink,
            );
            match result {
                Ok((outcome, nodes)) => {
                    let mut state = state_arc.lock().unwrap_or_else(|p| p.into_inner());
                    if state.epoch == epoch {
                        state.tiles = outcome.tiles.clone();
                        state.hierarchy = nodes;
                        state.phase = Phase::Ready;
                    }
                    Ok(outcome)
                }
                Err(err) => {
                    warn!(error = %err, "split_task_failed");
                    let mut state = state_arc.lock().unwrap_or_else(|p| p.into_inner());
                    if state.epoch == epoch {
                        state.phase = Phase::Idle;
                    }
                    Err(err)
                }
            }
        });
        Ok(handle)
    }

    /// Locate a photographed piece on a background task.
    ///
    /// Allowed from `ready` and both match-result phases (and from
    /// `matching`, which supersedes the pending match). Terminal phases:
    /// `match-found` when a candidate clears the accept threshold,
    /// `match-not-found` otherwise; failures roll back to `ready`.
    pub fn match_piece(&self, query_bytes: Vec<u8>) -> Result<TaskHandle<MatchOutcome>, EngineError> {
        let (epoch, tiles, nodes) = {
            let mut state = self.lock_state();
            match state.phase {
                Phase::Ready | Phase::Matching | Phase::MatchFound | Phase::MatchNotFound => {}
                other => {
                    return Err(EngineError::InvalidPhase {
                        operation: "match",
                        phase: other,
                    })
                }
            }
            if state.tiles.is_empty() {
                return Err(EngineError::NoTiles);
            }
            state.epoch += 1;
            state.phase = Phase::Matching;
            (state.epoch, state.tiles.clone(), state.hierarchy.clone())
        };

        let state_arc = Arc::clone(&self.state);
        let cache = Arc::clone(&self.cache);
        let extractor = Arc::clone(&self.extractor);
        let match_cfg = self.config.matching;

        let handle = self.match_runner.submit(move |sink| {
            let result = run_match_task(
                &cache,
                extractor.as_ref(),
                &query_bytes,
                &tiles,
                &nodes,
                &match_cfg,
                sink,
            );
            match result {
                Ok(outcome) => {
                    let mut state = state_arc.lock().unwrap_or_else(|p| p.into_inner());
                    if state.epoch == epoch {
                        apply_match_outcome(&mut state, &outcome);
                    }
                    Ok(outcome)
                }
                Err(err) => {
                    warn!(error = %err, "match_task_failed");
                    let mut state = state_arc.lock().unwrap_or_else(|p| p.into_inner());
                    if state.epoch == epoch {
                        state.phase = Phase::Ready;
                    }
                    Err(err)
                }
            }
        });
        Ok(handle)
    }

    /// Drop every session artifact and return to `idle`.
    pub fn reset(&self) -> Result<(), EngineError> {
        {
            let mut state = self.lock_state();
            state.epoch += 1;
            state.discard_artifacts();
            state.puzzle_id = None;
            state.grid = None;
            state.image_size = None;
            state.source = None;
            state.phase = Phase::Idle;
        }
        self.cache.clear();
        self.store.clear()?;
        Ok(())
    }

    pub fn phase(&self) -> Phase {
        self.lock_state().phase
    }

    pub fn grid(&self) -> Option<PuzzleGrid> {
        self.lock_state().grid
    }

    pub fn puzzle_id(&self) -> Option<String> {
        self.lock_state().puzzle_id.clone()
    }

    pub fn tiles(&self) -> Vec<TileRecord> {
        self.lock_state().tiles.clone()
    }

    pub fn hierarchy(&self) -> Vec<HierarchyNode> {
        self.lock_state().hierarchy.clone()
    }

    /// Result of the most recent match, if one has completed.
    pub fn last_match(&self) -> Option<MatchOutcome> {
        self.lock_state().last_match.clone()
    }

    /// Traversal trace of the most recent match, for diagnostics.
    pub fn hierarchy_path(&self) -> Vec<HierarchyPathItem> {
        self.lock_state()
            .last_match
            .as_ref()
            .map(|outcome| outcome.path.clone())
            .unwrap_or_default()
    }

    /// Shared handle to the session's blob store.
    pub fn store(&self) -> Arc<dyn BlobStore> {
        Arc::clone(&self.store)
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }
}

fn source_key(puzzle_id: &str) -> String {
    format!("{puzzle_id}-source")
}

fn hierarchy_key(puzzle_id: &str) -> String {
    format!("{puzzle_id}-hierarchy")
}

#[allow(clippy::too_many_arguments)]
fn run_split(
    store: &Arc<dyn BlobStore>,
    source: Option<DynamicImage>,
    puzzle_id: &str,
    grid: &PuzzleGrid,
    image_size: (u32, u32),
    split_cfg: &SplitConfig,
    hierarchy_cfg: &HierarchyConfig,
    sink: &ProgressSink<SplitOutcome>,
) -> Result<(SplitOutcome, Vec<HierarchyNode>), EngineError> {
    // The in-memory handle may already have been consumed by a superseded
    // split; recover the source from its persisted bytes in that case.
    let source = match source {
        Some(image) => image,
        None => {
            let bytes = store
                .get(&source_key(puzzle_id))?
                .ok_or(EngineError::NoSourceImage)?;
            decode_image(&bytes)?
        }
    };

    let (image_width, image_height) = image_size;
    let tile_size = calculate_tile_size(image_width, image_height, grid);
    let pieces = split_image(source, puzzle_id, grid, tile_size, split_cfg, |p, t| {
        sink.emit(p, t)
    })?;

    for piece in &pieces {
        store.put(&piece.record.blob_key, &piece.blob)?;
        store.put(&piece.record.thumbnail_key, &piece.thumbnail)?;
    }

    let tiles: Vec<TileRecord> = pieces.into_iter().map(|piece| piece.record).collect();
    let nodes = build_hierarchy(&tiles, image_width, image_height, grid, hierarchy_cfg);
    store::put_encoded(store.as_ref(), &hierarchy_key(puzzle_id), &nodes)?;

    info!(
        puzzle_id = %puzzle_id,
        tiles = tiles.len(),
        nodes = nodes.len(),
        "split_complete"
    );
    Ok((
        SplitOutcome {
            puzzle_id: puzzle_id.to_string(),
            tiles,
        },
        nodes,
    ))
}

fn run_match_task(
    cache: &FeatureCache,
    extractor: &dyn FeatureExtractor,
    query_bytes: &[u8],
    tiles: &[TileRecord],
    nodes: &[HierarchyNode],
    cfg: &MatchConfig,
    sink: &ProgressSink<MatchOutcome>,
) -> Result<MatchOutcome, EngineError> {
    // Validate the query photo before running the extractor on it, so an
    // unreadable upload reports as a decode failure rather than an
    // extractor-specific one.
    decode_image(query_bytes)?;
    let query = extractor.extract(query_bytes)?;

    let mut pieces = Vec::with_capacity(tiles.len());
    for tile in tiles {
        let vector = cache.ensure_tile(tile)?;
        pieces.push(PieceVector {
            piece_id: tile.id.clone(),
            row: tile.row,
            col: tile.col,
            vector,
        });
    }

    let (node_vectors, root_ids) = if nodes.is_empty() {
        (Vec::new(), None)
    } else {
        let by_id: HashMap<String, TileRecord> = tiles
            .iter()
            .map(|tile| (tile.id.clone(), tile.clone()))
            .collect();
        let mut node_vectors = Vec::with_capacity(nodes.len());
        for node in nodes {
            let vector = cache.ensure_node(node, &by_id)?;
            node_vectors.push(NodeVector {
                node: node.clone(),
                vector,
            });
        }
        let roots: Vec<String> = nodes
            .iter()
            .filter(|node| node.level == 0)
            .map(|node| node.id.clone())
            .collect();
        (node_vectors, Some(roots))
    };

    let outcome = matcher::run_match(
        &query,
        &pieces,
        &node_vectors,
        root_ids.as_deref(),
        cfg,
        &|p, t| sink.emit(p, t),
    )?;
    Ok(outcome)
}

/// Write a completed match back onto the session: candidate scores onto
/// their tile records, the outcome itself, and the terminal phase.
fn apply_match_outcome(state: &mut SessionState, outcome: &MatchOutcome) {
    for candidate in &outcome.candidates {
        if let Some(tile) = state
            .tiles
            .iter_mut()
            .find(|tile| tile.id == candidate.piece_id)
        {
            tile.score = Some(candidate.score);
        }
    }
    // Every tile's vector was ensured during the run, so record the keys.
    for tile in &mut state.tiles {
        if tile.feature_key.is_none() {
            tile.feature_key = Some(tile.default_feature_key());
        }
    }
    state.last_match = Some(outcome.clone());
    state.phase = if outcome.best_match.is_some() {
        Phase::MatchFound
    } else {
        Phase::MatchNotFound
    };
}
