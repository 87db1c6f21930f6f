//! Application state management
//!
//! This module owns the object graph, the cluster layer and the map model the
//! layer is driven by, and loads the points shown on the map.

use crate::app::plugin::Marker;
use crate::app::settings::Settings;
use cluster_lib::utils::{MAX_LATITUDE, lat_lon};
use cluster_lib::{
    ClusterLayer, Location, MapView, ObjectGraph, ObjectId, VisibleItem, WebMercatorMap,
    build_cluster_layer,
};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Golden angle in radians, spreads demo points evenly without clumping
const GOLDEN_ANGLE: f64 = 2.399_963_229_728_653;

/// Errors while loading points from a file
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Failed to open file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse GPX: {0}")]
    Gpx(#[from] gpx::errors::GpxError),
}

/// Main application state
pub struct AppState {
    /// Every point, marker and container on the map
    pub graph: ObjectGraph,

    /// Map model mirroring the widget's zoom level
    pub map: WebMercatorMap,

    /// The cluster layer (None if building it failed)
    pub layer: Option<ClusterLayer<String>>,

    /// Files that could not be loaded, with the reason
    pub errors: Vec<(PathBuf, String)>,

    /// Statistics shown in the sidebar
    pub stats: Stats,

    /// Whether the sidebar is open
    pub sidebar_open: bool,
}

/// Statistics about the clustered data and the last updates
#[derive(Debug, Clone, Default)]
pub struct Stats {
    pub total_points: usize,
    pub total_clusters: usize,
    pub root_clusters: usize,
    pub build_time_ms: f64,
    /// Clusters redisplayed by the last zoom change
    pub last_zoom_visited: usize,
    pub last_zoom_time_ms: f64,
    pub visible_clusters: usize,
    pub visible_points: usize,
}

impl AppState {
    /// Load the configured points and build the cluster layer
    pub fn new(settings: &Settings) -> Self {
        let mut graph = ObjectGraph::new();
        let mut map = WebMercatorMap::new(0, settings.max_zoom);
        map.set_zoom(settings.initial_zoom);

        let mut locations = demo_locations(
            settings.random_points,
            lat_lon(settings.center_lat, settings.center_lon),
            settings.spread,
        );

        let mut errors = Vec::new();
        for path in &settings.gpx_files {
            match load_gpx_locations(path) {
                Ok(loaded) => {
                    tracing::info!("Loaded {} points from {}", loaded.len(), path.display());
                    locations.extend(loaded);
                }
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", path.display(), e);
                    errors.push((path.clone(), e.to_string()));
                }
            }
        }

        let points: Vec<ObjectId> = locations
            .iter()
            .enumerate()
            .map(|(i, location)| graph.create(format!("point-{i}"), *location))
            .collect();

        let build_start = Instant::now();
        let layer = match build_cluster_layer(
            &mut graph,
            &map,
            &points,
            format_count,
            settings.cluster_config(),
        ) {
            Ok(layer) => Some(layer),
            Err(e) => {
                tracing::error!("Failed to build cluster layer: {}", e);
                errors.push((PathBuf::from("<cluster layer>"), e.to_string()));
                None
            }
        };
        let build_time_ms = build_start.elapsed().as_secs_f64() * 1000.0;

        let mut state = Self {
            graph,
            map,
            layer,
            errors,
            stats: Stats {
                total_points: points.len(),
                build_time_ms,
                ..Default::default()
            },
            sidebar_open: true,
        };
        state.refresh_cluster_stats();

        tracing::info!(
            "Clustered {} points into {} clusters in {:.1} ms",
            state.stats.total_points,
            state.stats.total_clusters,
            build_time_ms
        );
        state
    }

    /// Mirror the map widget's zoom level into the engine
    ///
    /// Returns `true` if the discrete zoom level changed.
    pub fn sync_zoom(&mut self, widget_zoom: f64) -> bool {
        let zoom = widget_zoom
            .round()
            .clamp(self.map.min_zoom() as f64, self.map.max_zoom() as f64) as u8;
        if !self.map.set_zoom(zoom) {
            return false;
        }

        if let Some(layer) = &mut self.layer {
            let start = Instant::now();
            match layer.on_zoom_change(&mut self.graph, &self.map) {
                Ok(change) => {
                    self.stats.last_zoom_visited = change.visited.len();
                    self.stats.last_zoom_time_ms = start.elapsed().as_secs_f64() * 1000.0;
                }
                Err(e) => tracing::warn!("Zoom change to {} ignored: {}", zoom, e),
            }
        }
        true
    }

    pub fn is_layer_active(&self) -> bool {
        self.layer
            .as_ref()
            .is_some_and(|layer| layer.is_active())
    }

    /// Show or hide every cluster and point of the layer
    pub fn set_layer_active(&mut self, active: bool) {
        if let Some(layer) = &mut self.layer
            && let Err(e) = layer.set_active(&mut self.graph, &self.map, active)
        {
            tracing::warn!("Failed to toggle cluster layer: {}", e);
        }
    }

    /// Owned snapshot of everything the layer currently shows
    pub fn visible_markers(&mut self) -> Vec<Marker> {
        let Some(layer) = &self.layer else {
            return Vec::new();
        };

        let markers: Vec<Marker> = layer
            .visible(&self.graph)
            .into_iter()
            .map(|item| match item {
                VisibleItem::Point { location, .. } => Marker::Point {
                    position: to_position(location),
                },
                VisibleItem::Cluster {
                    location,
                    count,
                    aggregate,
                    expand_zoom,
                    ..
                } => Marker::Cluster {
                    position: to_position(location),
                    count,
                    label: aggregate.clone(),
                    expand_zoom,
                },
            })
            .collect();

        self.stats.visible_clusters = markers
            .iter()
            .filter(|m| matches!(m, Marker::Cluster { .. }))
            .count();
        self.stats.visible_points = markers.len() - self.stats.visible_clusters;
        markers
    }

    fn refresh_cluster_stats(&mut self) {
        if let Some(layer) = &self.layer {
            self.stats.total_clusters = layer.clusters().len();
            self.stats.root_clusters = layer.clusters().roots().len();
        }
    }
}

fn to_position(location: Location) -> walkers::Position {
    walkers::lat_lon(location.y(), location.x())
}

/// Short label for a point count ("999", "1.2k", "15k", "3.4M")
pub fn format_count(count: usize) -> String {
    match count {
        0..=999 => count.to_string(),
        1_000..=9_999 => format!("{:.1}k", count as f64 / 1_000.0),
        10_000..=999_999 => format!("{}k", count / 1_000),
        _ => format!("{:.1}M", count as f64 / 1_000_000.0),
    }
}

/// Deterministic demo points scattered around `center`
///
/// Points follow a golden-angle spiral with a little radial jitter, so every
/// run shows the same map. All points lie within `spread` degrees of the center.
pub fn demo_locations(count: usize, center: Location, spread: f64) -> Vec<Location> {
    (0..count)
        .map(|i| {
            let t = (i as f64 + 0.5) / count as f64;
            let jitter = 0.75 + 0.25 * (i as f64 * 12.9898).sin().abs();
            let radius = spread * t.sqrt() * jitter;
            let angle = i as f64 * GOLDEN_ANGLE;

            let lat = (center.y() + radius * angle.sin()).clamp(-MAX_LATITUDE, MAX_LATITUDE);
            let lon = center.x() + radius * angle.cos();
            lat_lon(lat, lon)
        })
        .collect()
}

/// Every waypoint and track point of a GPX file
pub fn load_gpx_locations(path: &Path) -> Result<Vec<Location>, LoadError> {
    let file = std::fs::File::open(path)?;
    let gpx = gpx::read(BufReader::new(file))?;
    Ok(gpx_locations(&gpx))
}

pub fn gpx_locations(gpx: &gpx::Gpx) -> Vec<Location> {
    let track_points = gpx
        .tracks
        .iter()
        .flat_map(|track| &track.segments)
        .flat_map(|segment| &segment.points);

    gpx.waypoints
        .iter()
        .chain(track_points)
        .map(|waypoint| waypoint.point())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use geo::Point;
    use gpx::{Gpx, Track, TrackSegment, Waypoint};

    fn settings(args: &[&str]) -> Settings {
        Settings::parse_from(std::iter::once("cluster-viewer").chain(args.iter().copied()))
    }

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(7), "7");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1_234), "1.2k");
        assert_eq!(format_count(15_600), "15k");
        assert_eq!(format_count(3_400_000), "3.4M");
    }

    #[test]
    fn test_demo_locations() {
        let center = lat_lon(50.0, 14.0);
        let locations = demo_locations(1_000, center, 2.0);
        assert_eq!(locations.len(), 1_000);
        assert_eq!(locations, demo_locations(1_000, center, 2.0));

        for location in &locations {
            let d = ((location.x() - 14.0).powi(2) + (location.y() - 50.0).powi(2)).sqrt();
            assert!(d <= 2.0 + 1e-9);
        }
        assert!(demo_locations(0, center, 2.0).is_empty());
    }

    #[test]
    fn test_gpx_locations() {
        let mut gpx = Gpx::default();
        gpx.waypoints.push(Waypoint::new(Point::new(14.0, 50.0)));

        let mut segment = TrackSegment::default();
        segment.points.push(Waypoint::new(Point::new(14.1, 50.1)));
        segment.points.push(Waypoint::new(Point::new(14.2, 50.2)));
        let mut track = Track::default();
        track.segments.push(segment);
        gpx.tracks.push(track);

        assert_eq!(
            gpx_locations(&gpx),
            vec![lat_lon(50.0, 14.0), lat_lon(50.1, 14.1), lat_lon(50.2, 14.2)]
        );
    }

    #[test]
    fn test_state_builds_layer_and_reports_errors() {
        let state = AppState::new(&settings(&[
            "--random-points",
            "300",
            "--gpx-files",
            "/nonexistent/file.gpx",
        ]));

        assert_eq!(state.stats.total_points, 300);
        assert!(state.stats.total_clusters > 0);
        assert!(state.is_layer_active());
        assert_eq!(state.errors.len(), 1);
        assert_eq!(state.errors[0].0, PathBuf::from("/nonexistent/file.gpx"));
    }

    #[test]
    fn test_sync_zoom_and_toggle() {
        let mut state = AppState::new(&settings(&["--random-points", "500"]));
        assert_eq!(state.map.zoom(), 6);

        assert!(!state.sync_zoom(6.3));
        assert!(state.sync_zoom(9.7));
        assert_eq!(state.map.zoom(), 10);
        assert!(state.stats.last_zoom_visited > 0);

        // Beyond the maximum zoom the map is clamped
        state.sync_zoom(40.0);
        assert_eq!(state.map.zoom(), 18);

        let markers = state.visible_markers();
        assert_eq!(markers.len(), 500);
        assert_eq!(state.stats.visible_points, 500);

        state.set_layer_active(false);
        assert!(!state.is_layer_active());
        assert!(state.visible_markers().is_empty());
    }
}
