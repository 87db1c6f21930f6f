//! Utility functions for coordinate conversions and a Web Mercator map model

use crate::grid::{MapView, Projection};
use crate::{Location, Zoom};
use geo::{Coord, Point};

/// Web Mercator bounds in meters (EPSG:3857)
pub const EARTH_MERCATOR_MAX: f64 = 20037508.34;
pub const EARTH_MERCATOR_MIN: f64 = -20037508.34;
pub const EARTH_SIZE_METERS: f64 = EARTH_MERCATOR_MAX - EARTH_MERCATOR_MIN;

/// Maximum latitude that can be represented in Web Mercator
pub const MAX_LATITUDE: f64 = 85.05112878;

/// Size in pixels of one map tile (the whole world at zoom 0)
pub const DEFAULT_TILE_SIZE: f64 = 256.0;

/// Precomputed constant: EARTH_MERCATOR_MAX / 180.0
const LON_TO_X_FACTOR: f64 = EARTH_MERCATOR_MAX / 180.0;

/// Precomputed constant: EARTH_MERCATOR_MAX / PI
const Y_FACTOR: f64 = EARTH_MERCATOR_MAX / std::f64::consts::PI;

/// Build a [`Location`] from latitude and longitude in degrees
#[inline(always)]
pub fn lat_lon(lat: f64, lon: f64) -> Location {
    Point::new(lon, lat)
}

/// Convert WGS84 (lat, lon) to Web Mercator (x, y) in meters
///
/// # Arguments
/// * `lat` - Latitude in degrees (-85.05 to 85.05)
/// * `lon` - Longitude in degrees (-180 to 180)
///
/// # Returns
/// A `Point<f64>` with x (easting) and y (northing) in meters
#[inline(always)]
pub fn wgs84_to_mercator(lat: f64, lon: f64) -> Point<f64> {
    // Clamp latitude to valid Web Mercator range
    let lat = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE);

    let x = lon * LON_TO_X_FACTOR;
    let lat_rad = lat.to_radians();
    let y = (lat_rad.tan() + (1.0 / lat_rad.cos())).ln() * Y_FACTOR;

    Point::new(x, y)
}

/// Number of pixels spanned by the whole world at the given zoom level
#[inline(always)]
pub fn world_size_pixels(zoom: Zoom, tile_size: f64) -> f64 {
    tile_size * 2f64.powi(zoom as i32)
}

/// Project a location to global pixel coordinates at the given zoom level
///
/// The origin is the north-west corner of the world; `x` grows eastwards and
/// `y` grows southwards, matching slippy-map tile numbering.
#[inline(always)]
pub fn location_to_pixels(location: Location, zoom: Zoom, tile_size: f64) -> Coord<f64> {
    let mercator = wgs84_to_mercator(location.y(), location.x());
    let scale = world_size_pixels(zoom, tile_size) / EARTH_SIZE_METERS;
    Coord {
        x: (mercator.x() - EARTH_MERCATOR_MIN) * scale,
        y: (EARTH_MERCATOR_MAX - mercator.y()) * scale,
    }
}

/// Self-contained Web Mercator map model
///
/// Implements [`MapView`] with the standard 256 px tile pyramid. Map widgets that
/// use the same projection (like most slippy maps) can mirror their zoom level
/// into this model instead of implementing [`MapView`] themselves.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WebMercatorMap {
    zoom: Zoom,
    min_zoom: Zoom,
    max_zoom: Zoom,
    tile_size: f64,
}

impl Default for WebMercatorMap {
    fn default() -> Self {
        Self {
            zoom: 0,
            min_zoom: 0,
            max_zoom: 18,
            tile_size: DEFAULT_TILE_SIZE,
        }
    }
}

impl WebMercatorMap {
    /// Create a map with the given zoom bounds, starting at `min_zoom`
    pub fn new(min_zoom: Zoom, max_zoom: Zoom) -> Self {
        Self {
            zoom: min_zoom,
            min_zoom,
            max_zoom,
            ..Self::default()
        }
    }

    /// Set the tile size in pixels
    pub fn with_tile_size(mut self, tile_size: f64) -> Self {
        self.tile_size = tile_size;
        self
    }

    /// Set the current zoom level, clamped to the map's bounds
    ///
    /// Returns `true` if the zoom level changed.
    pub fn set_zoom(&mut self, zoom: Zoom) -> bool {
        let zoom = zoom.clamp(self.min_zoom, self.max_zoom.max(self.min_zoom));
        let changed = zoom != self.zoom;
        self.zoom = zoom;
        changed
    }

    pub fn tile_size(&self) -> f64 {
        self.tile_size
    }
}

impl Projection for WebMercatorMap {
    #[inline]
    fn project(&self, location: Location, zoom: Zoom) -> Coord<f64> {
        location_to_pixels(location, zoom, self.tile_size)
    }
}

impl MapView for WebMercatorMap {
    fn zoom(&self) -> Zoom {
        self.zoom
    }

    fn min_zoom(&self) -> Zoom {
        self.min_zoom
    }

    fn max_zoom(&self) -> Zoom {
        self.max_zoom
    }

    fn is_ready(&self) -> bool {
        self.tile_size.is_finite() && self.tile_size > 0.0 && self.min_zoom <= self.max_zoom
    }
}
