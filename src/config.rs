//! Engine configuration.

use hierarchy::HierarchyConfig;
use matcher::MatchConfig;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Tuning knobs for one engine instance.
///
/// Grouped from the per-stage configs so callers hold a single struct;
/// validated once at session construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum edge length of generated tile thumbnails, in pixels.
    pub thumbnail_max_dim: u32,
    /// Spatial hierarchy shape (root partition, leaf size, max depth).
    pub hierarchy: HierarchyConfig,
    /// Matching thresholds and ranking size.
    pub matching: MatchConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            thumbnail_max_dim: 160,
            hierarchy: HierarchyConfig::default(),
            matching: MatchConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Validate every stage config.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.thumbnail_max_dim == 0 {
            return Err(EngineError::InvalidConfig(
                "thumbnail_max_dim must be >= 1".into(),
            ));
        }
        self.hierarchy
            .validate()
            .map_err(|err| EngineError::InvalidConfig(err.to_string()))?;
        self.matching.validate()?;
        Ok(())
    }
}
