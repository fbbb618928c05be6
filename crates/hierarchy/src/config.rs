//! Configuration for hierarchy construction.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by [`HierarchyConfig::validate`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum HierarchyConfigError {
    #[error("invalid hierarchy config: {0}")]
    Invalid(String),
}

/// Shape parameters for the spatial hierarchy.
///
/// The image is first partitioned into `root_rows x root_cols` regions;
/// each region is then recursively quartered while it holds more than
/// `leaf_size` pieces and its depth is below `max_depth`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyConfig {
    pub root_rows: u32,
    pub root_cols: u32,
    pub leaf_size: usize,
    pub max_depth: u32,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            root_rows: 3,
            root_cols: 4,
            leaf_size: 4,
            max_depth: 6,
        }
    }
}

impl HierarchyConfig {
    pub fn validate(&self) -> Result<(), HierarchyConfigError> {
        if self.root_rows == 0 || self.root_cols == 0 {
            return Err(HierarchyConfigError::Invalid(
                "root_rows and root_cols must be >= 1".into(),
            ));
        }
        if self.leaf_size == 0 {
            return Err(HierarchyConfigError::Invalid(
                "leaf_size must be >= 1".into(),
            ));
        }
        if self.max_depth == 0 {
            return Err(HierarchyConfigError::Invalid(
                "max_depth must be >= 1".into(),
            ));
        }
        Ok(())
    }
}
