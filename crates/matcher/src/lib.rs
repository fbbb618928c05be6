//! # Piece Matcher
//!
//! Ranks candidate tile positions for a photographed puzzle piece by cosine
//! similarity between feature vectors, using the spatial hierarchy from the
//! `hierarchy` crate to prune the search.
//!
//! ## How a match runs
//!
//! 1. **Descent** - starting from the root nodes (an explicit id list, or
//!    every level-0 node), the node most similar to the query wins at each
//!    step and its children become the next candidate set, down to a leaf.
//!    Each step is recorded as a [`HierarchyPathItem`] for diagnostics.
//! 2. **Leaf scoring** - only the leaf's tiles are scored, with one
//!    progress callback per tile. Without a hierarchy, every tile is
//!    scored.
//! 3. **Fallback** - when the leaf's best score is below the confidence
//!    threshold (0.55 by default), the whole piece list is re-checked
//!    silently; that ranking wins only if strictly better. This trades one
//!    full scan for recall when camera noise routed the descent into the
//!    wrong branch, keeping the common case at
//!    `O(depth x branching + leaf)` comparisons.
//! 4. **Decision** - the top candidate is accepted as [`MatchOutcome::best_match`]
//!    only at or above the match threshold (0.78 by default); the ranked
//!    top-K (K = 5) is returned either way.
//!
//! Scoring is deterministic: ties break toward the first-encountered entry,
//! and repeated runs over the same inputs produce identical outcomes.

pub mod engine;
pub mod types;

pub use crate::engine::{cosine_similarity, run_match};
pub use crate::types::{
    HierarchyPathItem, MatchCandidate, MatchConfig, MatchError, MatchOutcome, NodeVector,
    PieceVector,
};
