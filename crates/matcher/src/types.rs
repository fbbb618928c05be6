use std::sync::Arc;

use hierarchy::{HierarchyNode, RegionBounds};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration for a single match run.
///
/// Cheap to clone and serde-friendly so it can be embedded in higher-level
/// engine configs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchConfig {
    /// Number of ranked candidates to return.
    pub top_k: usize,
    /// Minimum score for the top-ranked candidate to be accepted as the
    /// confirmed match.
    pub match_threshold: f32,
    /// Minimum leaf-local best score below which the matcher re-checks the
    /// entire tile list.
    pub hierarchy_confidence_threshold: f32,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            match_threshold: 0.78,
            hierarchy_confidence_threshold: 0.55,
        }
    }
}

impl MatchConfig {
    /// Validate the configuration for a single run.
    pub fn validate(&self) -> Result<(), MatchError> {
        if self.top_k == 0 {
            return Err(MatchError::InvalidConfig(
                "top_k must be greater than zero".into(),
            ));
        }
        if !self.match_threshold.is_finite()
            || !(-1.0..=1.0).contains(&self.match_threshold)
        {
            return Err(MatchError::InvalidConfig(
                "match_threshold must be within [-1.0, 1.0]".into(),
            ));
        }
        if !self.hierarchy_confidence_threshold.is_finite()
            || !(-1.0..=1.0).contains(&self.hierarchy_confidence_threshold)
        {
            return Err(MatchError::InvalidConfig(
                "hierarchy_confidence_threshold must be within [-1.0, 1.0]".into(),
            ));
        }
        Ok(())
    }

    /// Whether a candidate score clears the accept threshold.
    pub fn accepts(&self, score: f32) -> bool {
        score >= self.match_threshold
    }
}

/// One ranked candidate position for the query piece.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub piece_id: String,
    pub row: u32,
    pub col: u32,
    pub score: f32,
    /// 1-based rank in descending score order.
    pub rank: usize,
}

/// One step of the hierarchy descent, for diagnostics and visualization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchyPathItem {
    pub node_id: String,
    pub level: u32,
    pub score: f32,
    pub bounds: RegionBounds,
}

/// Result of a match run: an accepted best match (if any candidate cleared
/// the threshold), the ranked top-K, and the traversal trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchOutcome {
    pub best_match: Option<MatchCandidate>,
    pub candidates: Vec<MatchCandidate>,
    pub path: Vec<HierarchyPathItem>,
}

/// A tile's feature vector plus the position metadata the ranking carries.
#[derive(Debug, Clone)]
pub struct PieceVector {
    pub piece_id: String,
    pub row: u32,
    pub col: u32,
    pub vector: Arc<Vec<f32>>,
}

/// A hierarchy node paired with its aggregate feature vector.
#[derive(Debug, Clone)]
pub struct NodeVector {
    pub node: HierarchyNode,
    pub vector: Arc<Vec<f32>>,
}

/// Errors produced by the matching layer.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum MatchError {
    /// Invalid configuration for this run.
    #[error("invalid match config: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = MatchConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.top_k, 5);
    }

    #[test]
    fn zero_top_k_rejected() {
        let cfg = MatchConfig {
            top_k: 0,
            ..Default::default()
        };
        let err = cfg.validate().expect_err("config should be invalid");
        match err {
            MatchError::InvalidConfig(msg) => assert!(msg.contains("top_k")),
        }
    }

    #[test]
    fn out_of_range_thresholds_rejected() {
        let cfg = MatchConfig {
            match_threshold: 1.5,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = MatchConfig {
            hierarchy_confidence_threshold: f32::NAN,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn accept_threshold_is_inclusive() {
        let cfg = MatchConfig::default();
        assert!(cfg.accepts(0.78));
        assert!(cfg.accepts(0.99));
        assert!(!cfg.accepts(0.779999));
    }
}
