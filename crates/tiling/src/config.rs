//! Configuration for the tile splitter.

use serde::{Deserialize, Serialize};

use crate::error::SplitError;

/// Runtime configuration for splitting behavior.
///
/// Cheap to clone and serde-friendly so it can be embedded in higher-level
/// engine configs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Maximum edge length of generated thumbnails, in pixels. Thumbnails
    /// are scaled proportionally and never upscaled beyond the tile size.
    pub thumbnail_max_dim: u32,
}

impl SplitConfig {
    /// Validate the configuration before use.
    pub fn validate(&self) -> Result<(), SplitError> {
        if self.thumbnail_max_dim == 0 {
            return Err(SplitError::InvalidConfig(
                "thumbnail_max_dim must be >= 1".into(),
            ));
        }
        Ok(())
    }
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            thumbnail_max_dim: 160,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = SplitConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.thumbnail_max_dim, 160);
    }

    #[test]
    fn zero_thumbnail_dim_rejected() {
        let cfg = SplitConfig {
            thumbnail_max_dim: 0,
        };
        assert!(matches!(cfg.validate(), Err(SplitError::InvalidConfig(_))));
    }
}
