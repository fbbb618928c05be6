//! Spatial hierarchy over puzzle tiles.
//!
//! Organizes tile identifiers into a multi-level index: the image is
//! partitioned into a small set of root regions, and each region is
//! recursively quartered into quadrants while it holds more than a
//! configured number of pieces. The matcher descends this structure to
//! prune similarity search to one leaf's worth of tiles instead of the
//! whole piece set.
//!
//! The output is a flat node list with parent/child id references; there
//! are no linked nodes, no empty nodes, and no I/O. Construction is pure
//! and deterministic, so it can be rebuilt from the same tile list at any
//! time and snapshotted cheaply.

mod builder;
mod config;
mod types;

pub use crate::builder::build_hierarchy;
pub use crate::config::{HierarchyConfig, HierarchyConfigError};
pub use crate::types::{HierarchyNode, RegionBounds};
