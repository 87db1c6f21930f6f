//! Pixel projection and fixed-radius grid bucketing
//!
//! Points are grouped by projecting them to pixel space at a zoom level and
//! dividing by the cluster radius. Two points share a cell at a zoom level iff
//! they fall into the same `radius × radius` pixel square.

use crate::{Location, Zoom};
use geo::Coord;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Projection from geographic locations to pixel space
///
/// Must be deterministic and monotonic within a zoom level, or grid cells
/// stop being stable.
pub trait Projection: Sync {
    /// Project a location to global pixel coordinates at the given zoom level
    fn project(&self, location: Location, zoom: Zoom) -> Coord<f64>;
}

/// The parts of a map widget the clustering engine depends on
pub trait MapView: Projection {
    /// Current (integral) zoom level
    fn zoom(&self) -> Zoom;

    /// Minimum zoom level, inclusive
    fn min_zoom(&self) -> Zoom;

    /// Maximum zoom level, inclusive
    fn max_zoom(&self) -> Zoom;

    /// Whether projection and zoom bounds are available yet
    fn is_ready(&self) -> bool {
        true
    }
}

/// A grid cell at one zoom level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GridCell {
    pub zoom: Zoom,
    pub x: i64,
    pub y: i64,
}

impl GridCell {
    /// Cell coordinates without the zoom level, used as a key among siblings
    #[inline]
    pub fn key(&self) -> (i64, i64) {
        (self.x, self.y)
    }
}

/// Compute the grid cell of a location at a zoom level
///
/// NaN coordinates produce an unspecified (but non-panicking) cell.
#[inline]
pub fn cell_index<P: Projection + ?Sized>(
    projection: &P,
    location: Location,
    zoom: Zoom,
    radius: f64,
) -> GridCell {
    let pixel = projection.project(location, zoom);
    GridCell {
        zoom,
        x: (pixel.x / radius).floor() as i64,
        y: (pixel.y / radius).floor() as i64,
    }
}
