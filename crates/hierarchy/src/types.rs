//! Spatial node types for the tile hierarchy.

use serde::{Deserialize, Serialize};

/// Axis-aligned region in full-image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionBounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl RegionBounds {
    /// Inclusive containment test on all four edges.
    ///
    /// A point exactly on a shared edge between two regions is inside both;
    /// that double assignment is observed, accepted behavior for tile
    /// centers (see the builder tests).
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x && x <= self.x + self.width && y >= self.y && y <= self.y + self.height
    }
}

/// One node of the spatial hierarchy.
///
/// Level 0 nodes are the root regions of the image partition; deeper levels
/// are quadrant subdivisions. Parent/child links are id references into the
/// flattened node list, not pointers. A node whose `child_ids` is empty is
/// a leaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchyNode {
    pub id: String,
    pub level: u32,
    pub parent_id: Option<String>,
    pub child_ids: Vec<String>,
    pub bounds: RegionBounds,
    pub piece_ids: Vec<String>,
}

impl HierarchyNode {
    pub fn is_leaf(&self) -> bool {
        self.child_ids.is_empty()
    }

    pub fn is_root(&self) -> bool {
        self.level == 0
    }
}
