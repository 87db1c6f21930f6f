//! Cluster Library - Zoom-Dependent Point Clustering for Slippy Maps
//!
//! This library groups large sets of geolocated points into aggregate cluster markers
//! that split apart as the map zooms in. Clusters form a multi-resolution tree where
//! every node is valid over a contiguous zoom range, and a zoom-indexed lookup table
//! limits the work done on each zoom change to the clusters whose range boundary is
//! actually crossed.
//!
//! # Architecture
//!
//! - **[`ObjectGraph`]**: Arena of map objects (points, markers, containers) with
//!   parent/child containment, live aggregate locations and event listeners
//! - **[`grid`]**: Pixel projection and fixed-radius grid bucketing per zoom level
//! - **[`ClusterTreeBuilder`]**: Builds the per-zoom grid trie and folds it into a
//!   minimal [`ClusterData`] forest
//! - **[`ClusterForest`]**: Runtime cluster nodes with display state
//! - **[`ZoomVisibilityIndex`]**: Zoom level to cluster lookup for selective redisplay
//! - **[`ClusterLayer`]**: High-level owner tying everything together
//!
//! # Performance Characteristics
//!
//! - **Build Time**: O(P × Z) cell computations (P=points, Z=zoom levels), parallel per point
//! - **Zoom Change**: O(C) where C = clusters bucketed at the old or new zoom level
//! - **Memory**: O(P × Z) transient during build, O(S) after folding (S=actual splits)

mod builder;
mod cluster;
pub mod graph;
pub mod grid;
mod layer;
pub mod utils;
mod zoom_index;

// Public API exports
pub use builder::{ClusterData, ClusterTreeBuilder};
pub use cluster::{ClusterForest, ClusterId, ClusterNode};
pub use graph::{Event, EventKind, ListenerId, LocationMode, ObjectGraph, ObjectId};
pub use grid::{GridCell, MapView, Projection};
pub use layer::{ClusterLayer, Config, VisibleItem, ZoomChange, build_cluster_layer};
pub use utils::WebMercatorMap;
pub use zoom_index::ZoomVisibilityIndex;

/// Geographic location of a map object: `x` is longitude, `y` is latitude (degrees)
pub type Location = geo::Point<f64>;

/// Discrete map zoom level
pub type Zoom = u8;

/// Error types for the clustering engine
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClusterError {
    #[error("Map is not ready: projection or zoom bounds are unavailable")]
    MapNotReady,

    #[error("Invalid zoom range: min {min} > max {max}")]
    InvalidZoomRange { min: Zoom, max: Zoom },

    #[error("Invalid cluster radius: {0} pixels")]
    InvalidRadius(f64),

    #[error("Unknown object: {0}")]
    UnknownObject(ObjectId),

    #[error("Object {child} is not a child of {parent}")]
    NotAChild { parent: ObjectId, child: ObjectId },

    #[error("Adding {child} under {parent} would create a cycle")]
    Cycle { parent: ObjectId, child: ObjectId },

    #[error("Layer has been deleted")]
    LayerDeleted,
}

pub type Result<T> = std::result::Result<T, ClusterError>;
