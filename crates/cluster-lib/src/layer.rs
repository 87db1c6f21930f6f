//! Cluster layer: the high-level owner of a cluster forest
//!
//! A [`ClusterLayer`] owns one container object in the graph, the current
//! [`ClusterForest`] and its [`ZoomVisibilityIndex`]. The map widget drives it by
//! calling [`ClusterLayer::on_zoom_change`] once per completed zoom transition.

use crate::builder::ClusterTreeBuilder;
use crate::cluster::{ClusterForest, ClusterId};
use crate::graph::{LocationMode, ObjectGraph, ObjectId};
use crate::grid::MapView;
use crate::utils::lat_lon;
use crate::zoom_index::ZoomVisibilityIndex;
use crate::{ClusterError, Location, Result, Zoom};
use std::collections::HashSet;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for a cluster layer
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Config {
    /// Grid cell size in pixels, shared by all zoom levels
    pub radius_pixels: f64,
    /// How cluster markers derive their location from their members
    pub location_mode: LocationMode,
    /// Enable the advisory "all children share one active state" bookkeeping
    /// on the graph (see [`ObjectGraph::with_active_convergence`])
    pub converge_active_state: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            radius_pixels: 200.0,
            location_mode: LocationMode::Average,
            converge_active_state: false,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if !self.radius_pixels.is_finite() || self.radius_pixels <= 0.0 {
            return Err(ClusterError::InvalidRadius(self.radius_pixels));
        }
        Ok(())
    }
}

/// Outcome of a zoom change
#[derive(Debug, Clone, PartialEq)]
pub struct ZoomChange {
    pub previous: Option<Zoom>,
    pub current: Zoom,
    /// Nodes that were redisplayed, in visiting order
    pub visited: Vec<ClusterId>,
}

/// Something the layer currently shows on the map
#[derive(Debug, Clone, PartialEq)]
pub enum VisibleItem<'a, R> {
    /// A single point
    Point { id: ObjectId, location: Location },
    /// An aggregate marker
    Cluster {
        id: ClusterId,
        location: Location,
        count: usize,
        aggregate: &'a R,
        /// Zoom level at which the cluster splits
        expand_zoom: Zoom,
    },
}

/// A layer of points grouped into zoom-dependent clusters
pub struct ClusterLayer<R> {
    object: ObjectId,
    config: Config,
    render: Box<dyn Fn(usize) -> R>,
    points: Vec<ObjectId>,
    members: HashSet<ObjectId>,
    forest: ClusterForest<R>,
    zoom_index: ZoomVisibilityIndex,
    last_zoom: Option<Zoom>,
    /// Shown or hidden by the caller, independent of the graph's flags
    active: bool,
    deleted: bool,
}

impl<R> std::fmt::Debug for ClusterLayer<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterLayer")
            .field("object", &self.object)
            .field("config", &self.config)
            .field("points", &self.points.len())
            .field("clusters", &self.forest.len())
            .field("last_zoom", &self.last_zoom)
            .field("active", &self.active)
            .field("deleted", &self.deleted)
            .finish_non_exhaustive()
    }
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl<R> ClusterLayer<R> {
    /// Create an empty layer
    ///
    /// # Arguments
    /// * `graph` - Graph the layer's objects live in
    /// * `config` - Layer configuration (validated here)
    /// * `render` - Builds the renderable of an aggregate marker from its point count
    pub fn new<F>(graph: &mut ObjectGraph, config: Config, render: F) -> Result<Self>
    where
        F: Fn(usize) -> R + 'static,
    {
        config.validate()?;
        if config.converge_active_state {
            graph.set_active_convergence(true);
        }

        let object = graph.create("cluster-layer", lat_lon(0.0, 0.0));
        graph.set_location_mode(object, config.location_mode)?;

        Ok(Self {
            object,
            config,
            render: Box::new(render),
            points: Vec::new(),
            members: HashSet::new(),
            forest: ClusterForest::default(),
            zoom_index: ZoomVisibilityIndex::default(),
            last_zoom: None,
            active: true,
            deleted: false,
        })
    }

    /// Add points and rebuild the cluster tree from all points of the layer
    ///
    /// The previous tree is released first. The new tree is displayed at the
    /// map's current zoom level. Points deleted from the graph since the last
    /// build are dropped. Fails without changing anything if the map is not ready
    /// or a new point is unknown.
    pub fn add(
        &mut self,
        graph: &mut ObjectGraph,
        map: &dyn MapView,
        points: &[ObjectId],
    ) -> Result<()> {
        #[cfg(feature = "profiling")]
        profiling::scope!("layer::add");

        self.ensure_usable(map)?;
        let builder = ClusterTreeBuilder::new(
            map,
            map.min_zoom(),
            map.max_zoom(),
            self.config.radius_pixels,
        )
        .inspect_err(|err| tracing::warn!("Cannot cluster points: {}", err))?;
        if let Some(&unknown) = points.iter().find(|p| !graph.contains(**p)) {
            tracing::warn!("Cannot add unknown object {} to cluster layer", unknown);
            return Err(ClusterError::UnknownObject(unknown));
        }

        let before = self.points.len();
        self.points.retain(|&p| graph.contains(p));
        if self.points.len() < before {
            tracing::debug!(
                "Dropping {} deleted points from cluster layer",
                before - self.points.len()
            );
            self.members = self.points.iter().copied().collect();
        }
        for &point in points {
            if self.members.insert(point) {
                self.points.push(point);
            }
        }

        let mut located = Vec::with_capacity(self.points.len());
        for &point in &self.points {
            graph.set_active(point, false, false, false)?;
            let location = graph
                .location(point)
                .ok_or(ClusterError::UnknownObject(point))?;
            located.push((point, location));
        }
        let data = builder.build(&located);

        std::mem::take(&mut self.forest).release(graph)?;
        self.forest = ClusterForest::build(
            graph,
            self.object,
            data,
            self.config.location_mode,
            &*self.render,
        )?;
        self.zoom_index = ZoomVisibilityIndex::build(&self.forest);

        let zoom = map.zoom();
        self.forest.set_active_all(graph, self.active, true, zoom)?;
        self.last_zoom = Some(zoom);

        tracing::debug!(
            "Rebuilt cluster layer: {} points, {} roots, {} clusters, {} index entries",
            self.points.len(),
            self.forest.roots().len(),
            self.forest.len(),
            self.zoom_index.entry_count()
        );
        tracing::trace!("Cluster tree:\n{}", self.forest.describe());
        Ok(())
    }

    /// Show or hide the whole layer
    pub fn set_active(
        &mut self,
        graph: &mut ObjectGraph,
        map: &dyn MapView,
        active: bool,
    ) -> Result<()> {
        self.ensure_usable(map)?;
        self.active = active;
        graph.set_active(self.object, active, true, true)?;
        self.forest.set_active_all(graph, active, true, map.zoom())
    }

    pub fn is_active(&self) -> bool {
        !self.deleted && self.active
    }

    /// Centroid of the layer's root clusters
    pub fn location(&self, graph: &ObjectGraph) -> Option<Location> {
        if self.deleted {
            return None;
        }
        graph.location(self.object)
    }

    /// Redisplay the clusters affected by a move to the map's current zoom level
    ///
    /// Only nodes bucketed at the previous or the current zoom level are visited.
    pub fn on_zoom_change(
        &mut self,
        graph: &mut ObjectGraph,
        map: &dyn MapView,
    ) -> Result<ZoomChange> {
        self.ensure_usable(map)?;

        let current = map.zoom();
        let previous = self.last_zoom;
        let visited = self.zoom_index.transition(previous, current);
        for &id in &visited {
            self.forest.redisplay(graph, id, current)?;
        }
        self.last_zoom = Some(current);

        tracing::trace!(
            "Zoom {:?} -> {}: redisplayed {} of {} clusters",
            previous,
            current,
            visited.len(),
            self.forest.len()
        );

        Ok(ZoomChange {
            previous,
            current,
            visited,
        })
    }

    /// Release the cluster tree and delete the layer's objects
    ///
    /// The points survive, detached and inactive. Every later call on the layer
    /// fails with [`ClusterError::LayerDeleted`].
    pub fn delete(&mut self, graph: &mut ObjectGraph) -> Result<()> {
        if self.deleted {
            tracing::warn!("Cluster layer deleted twice");
            return Err(ClusterError::LayerDeleted);
        }
        std::mem::take(&mut self.forest).release(graph)?;
        self.zoom_index = ZoomVisibilityIndex::default();
        self.points.clear();
        self.members.clear();
        self.last_zoom = None;
        self.deleted = true;
        graph.delete(self.object)
    }

    /// Everything the layer currently shows, clusters first
    pub fn visible(&self, graph: &ObjectGraph) -> Vec<VisibleItem<'_, R>> {
        let Some(zoom) = self.last_zoom else {
            return Vec::new();
        };

        let mut clusters = Vec::new();
        let mut points = Vec::new();
        for &id in self.zoom_index.at(zoom) {
            let Some(node) = self.forest.get(id) else {
                continue;
            };
            if graph.is_active(node.marker())
                && let Some(location) = graph.location(node.marker())
            {
                clusters.push(VisibleItem::Cluster {
                    id,
                    location,
                    count: node.point_count(),
                    aggregate: node.aggregate(),
                    expand_zoom: node.expand_zoom(),
                });
            }
            for &point in node.points() {
                if graph.is_active(point)
                    && let Some(location) = graph.location(point)
                {
                    points.push(VisibleItem::Point {
                        id: point,
                        location,
                    });
                }
            }
        }

        clusters.extend(points);
        clusters
    }

    /// The container object of the layer
    pub fn object(&self) -> ObjectId {
        self.object
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// All points of the layer, in insertion order
    pub fn points(&self) -> &[ObjectId] {
        &self.points
    }

    pub fn clusters(&self) -> &ClusterForest<R> {
        &self.forest
    }

    pub fn zoom_index(&self) -> &ZoomVisibilityIndex {
        &self.zoom_index
    }

    /// Zoom level of the last display update
    pub fn last_zoom(&self) -> Option<Zoom> {
        self.last_zoom
    }

    fn ensure_usable(&self, map: &dyn MapView) -> Result<()> {
        if self.deleted {
            tracing::warn!("Ignoring call on a deleted cluster layer");
            return Err(ClusterError::LayerDeleted);
        }
        if !map.is_ready() {
            tracing::warn!("Ignoring cluster layer update: map is not ready");
            return Err(ClusterError::MapNotReady);
        }
        Ok(())
    }
}

/// Create a cluster layer and add `points` to it
pub fn build_cluster_layer<R, F>(
    graph: &mut ObjectGraph,
    map: &dyn MapView,
    points: &[ObjectId],
    render: F,
    config: Config,
) -> Result<ClusterLayer<R>>
where
    F: Fn(usize) -> R + 'static,
{
    let mut layer = ClusterLayer::new(graph, config, render)?;
    layer.add(graph, map, points)?;
    Ok(layer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WebMercatorMap;
    use std::collections::HashSet;

    fn prague(graph: &mut ObjectGraph) -> Vec<ObjectId> {
        [
            (50.0181, 14.2963),
            (50.0281, 14.3063),
            (50.0081, 14.3163),
            (50.0231, 14.2863),
        ]
        .iter()
        .map(|(lat, lon)| graph.create("point", lat_lon(*lat, *lon)))
        .collect()
    }

    /// Deterministic scatter over a few hundred kilometres
    fn scatter(graph: &mut ObjectGraph, count: usize) -> Vec<ObjectId> {
        (0..count)
            .map(|i| {
                let t = i as f64 / count as f64;
                let lat = 49.0 + (t * 53.0).sin() * 1.5;
                let lon = 15.0 + (t * 31.0).cos() * 2.5;
                graph.create("point", lat_lon(lat, lon))
            })
            .collect()
    }

    fn render(count: usize) -> String {
        count.to_string()
    }

    /// Owned view of what the layer shows
    fn shown(layer: &ClusterLayer<String>, graph: &ObjectGraph) -> Vec<(String, Location)> {
        layer
            .visible(graph)
            .into_iter()
            .map(|item| match item {
                VisibleItem::Point { id, location } => (id.to_string(), location),
                VisibleItem::Cluster { id, location, .. } => (id.to_string(), location),
            })
            .collect()
    }

    /// How many times each point is represented (itself or an ancestor marker)
    fn representations(graph: &ObjectGraph, layer: &ClusterLayer<String>, point: ObjectId) -> usize {
        let forest = layer.clusters();
        let Some((leaf, _)) = forest.iter().find(|(_, n)| n.points().contains(&point)) else {
            return 0;
        };

        let mut shown = usize::from(graph.is_active(point));
        let mut current = Some(leaf);
        while let Some(id) = current {
            let node = forest.get(id).unwrap();
            shown += usize::from(graph.is_active(node.marker()));
            current = node.parent();
        }
        shown
    }

    #[test]
    fn test_config_validation() {
        let mut graph = ObjectGraph::new();
        let config = Config {
            radius_pixels: -1.0,
            ..Config::default()
        };
        assert!(matches!(
            ClusterLayer::new(&mut graph, config, render),
            Err(ClusterError::InvalidRadius(_))
        ));
        assert!(graph.is_empty());
    }

    #[test]
    fn test_four_points_single_aggregate() {
        let mut graph = ObjectGraph::new();
        let map = WebMercatorMap::default();
        let points = prague(&mut graph);
        let layer =
            build_cluster_layer(&mut graph, &map, &points, render, Config::default()).unwrap();

        assert_eq!(layer.clusters().roots().len(), 1);
        let visible = layer.visible(&graph);
        assert_eq!(visible.len(), 1);
        match &visible[0] {
            VisibleItem::Cluster {
                count,
                aggregate,
                expand_zoom,
                ..
            } => {
                assert_eq!(*count, 4);
                assert_eq!(aggregate.as_str(), "4");
                assert!(*expand_zoom > 0);
            }
            other => panic!("expected a cluster, got {other:?}"),
        }
    }

    #[test]
    fn test_points_visible_at_max_zoom() {
        let mut graph = ObjectGraph::new();
        let mut map = WebMercatorMap::default();
        let points = prague(&mut graph);
        let mut layer =
            build_cluster_layer(&mut graph, &map, &points, render, Config::default()).unwrap();

        map.set_zoom(18);
        layer.on_zoom_change(&mut graph, &map).unwrap();

        let visible: HashSet<ObjectId> = layer
            .visible(&graph)
            .into_iter()
            .map(|item| match item {
                VisibleItem::Point { id, .. } => id,
                VisibleItem::Cluster { .. } => panic!("no clusters at max zoom"),
            })
            .collect();
        assert_eq!(visible, points.iter().copied().collect());
    }

    #[test]
    fn test_visibility_exclusive_at_every_zoom() {
        let mut graph = ObjectGraph::new();
        let mut map = WebMercatorMap::default();
        let points = scatter(&mut graph, 400);
        let mut layer =
            build_cluster_layer(&mut graph, &map, &points, render, Config::default()).unwrap();

        // Sequential zooming in, then jumps in both directions
        let zooms = (0..=18).chain([3, 17, 0, 11, 11, 5, 18, 1]);
        for zoom in zooms {
            map.set_zoom(zoom);
            layer.on_zoom_change(&mut graph, &map).unwrap();
            for &point in &points {
                assert_eq!(
                    representations(&graph, &layer, point),
                    1,
                    "point {point} at zoom {zoom}"
                );
            }
        }
    }

    #[test]
    fn test_zoom_change_locality() {
        let mut graph = ObjectGraph::new();
        let mut map = WebMercatorMap::default();
        let points = scatter(&mut graph, 300);
        let mut layer =
            build_cluster_layer(&mut graph, &map, &points, render, Config::default()).unwrap();

        let mut previous = map.zoom();
        for zoom in [1, 2, 9, 4, 18, 12] {
            map.set_zoom(zoom);
            let change = layer.on_zoom_change(&mut graph, &map).unwrap();
            assert_eq!(change.previous, Some(previous));
            assert_eq!(change.current, zoom);

            let allowed: HashSet<ClusterId> = layer
                .zoom_index()
                .at(previous)
                .iter()
                .chain(layer.zoom_index().at(zoom))
                .copied()
                .collect();
            let visited: HashSet<ClusterId> = change.visited.iter().copied().collect();
            assert_eq!(visited.len(), change.visited.len());
            assert!(visited.is_subset(&allowed));
            assert!(change.visited.len() < layer.clusters().len());
            previous = zoom;
        }
    }

    #[test]
    fn test_set_active_hides_and_restores() {
        let mut graph = ObjectGraph::new();
        let mut map = WebMercatorMap::default();
        map.set_zoom(12);
        let points = scatter(&mut graph, 200);
        let mut layer =
            build_cluster_layer(&mut graph, &map, &points, render, Config::default()).unwrap();
        let before = shown(&layer, &graph);
        assert!(!before.is_empty());

        layer.set_active(&mut graph, &map, false).unwrap();
        assert!(!layer.is_active());
        assert!(layer.visible(&graph).is_empty());
        assert!(points.iter().all(|p| !graph.is_active(*p)));

        // Zooming while hidden keeps everything hidden
        map.set_zoom(14);
        layer.on_zoom_change(&mut graph, &map).unwrap();
        assert!(layer.visible(&graph).is_empty());

        map.set_zoom(12);
        layer.on_zoom_change(&mut graph, &map).unwrap();
        layer.set_active(&mut graph, &map, true).unwrap();
        assert_eq!(shown(&layer, &graph), before);
    }

    #[test]
    fn test_convergence_does_not_hide_layer() {
        let mut graph = ObjectGraph::new();
        let mut map = WebMercatorMap::default();
        let points = prague(&mut graph);
        let config = Config {
            converge_active_state: true,
            ..Config::default()
        };
        let mut layer = build_cluster_layer(&mut graph, &map, &points, render, config).unwrap();

        for zoom in 0..=18 {
            map.set_zoom(zoom);
            layer.on_zoom_change(&mut graph, &map).unwrap();
            assert!(layer.is_active(), "layer hidden at zoom {zoom}");
            for &point in &points {
                assert_eq!(representations(&graph, &layer, point), 1);
            }
        }

        let sydney = graph.create("sydney", lat_lon(-33.8688, 151.2093));
        layer.add(&mut graph, &map, &[sydney]).unwrap();
        assert!(layer.is_active());
        assert_eq!(layer.visible(&graph).len(), 5);
    }

    #[test]
    fn test_deleted_point_is_skipped_and_dropped() {
        let mut graph = ObjectGraph::new();
        let mut map = WebMercatorMap::default();
        let points = prague(&mut graph);
        let mut layer =
            build_cluster_layer(&mut graph, &map, &points, render, Config::default()).unwrap();
        graph.delete(points[0]).unwrap();

        map.set_zoom(18);
        layer.on_zoom_change(&mut graph, &map).unwrap();
        assert_eq!(layer.last_zoom(), Some(18));
        let visible: HashSet<ObjectId> = layer
            .visible(&graph)
            .into_iter()
            .map(|item| match item {
                VisibleItem::Point { id, .. } => id,
                VisibleItem::Cluster { .. } => panic!("no clusters at max zoom"),
            })
            .collect();
        assert_eq!(visible, points[1..].iter().copied().collect());

        let extra = graph.create("extra", lat_lon(50.0131, 14.3013));
        layer.add(&mut graph, &map, &[extra]).unwrap();
        assert_eq!(layer.points(), &[points[1], points[2], points[3], extra]);
        assert_eq!(layer.clusters().iter().map(|(_, n)| n.point_count()).max(), Some(4));
        assert_eq!(layer.visible(&graph).len(), 4);
    }

    #[test]
    fn test_map_not_ready_is_noop() {
        let mut graph = ObjectGraph::new();
        let map = WebMercatorMap::new(10, 4);
        let points = prague(&mut graph);
        let mut layer = ClusterLayer::new(&mut graph, Config::default(), render).unwrap();
        let objects = graph.len();

        assert_eq!(
            layer.add(&mut graph, &map, &points),
            Err(ClusterError::MapNotReady)
        );
        assert!(layer.points().is_empty());
        assert!(layer.clusters().is_empty());
        assert_eq!(graph.len(), objects);
        assert_eq!(
            layer.on_zoom_change(&mut graph, &map),
            Err(ClusterError::MapNotReady)
        );
    }

    #[test]
    fn test_unknown_point_is_rejected() {
        let mut graph = ObjectGraph::new();
        let map = WebMercatorMap::default();
        let stale = graph.create("stale", lat_lon(0.0, 0.0));
        graph.delete(stale).unwrap();
        let mut layer = ClusterLayer::new(&mut graph, Config::default(), render).unwrap();

        assert_eq!(
            layer.add(&mut graph, &map, &[stale]),
            Err(ClusterError::UnknownObject(stale))
        );
        assert!(layer.points().is_empty());
    }

    #[test]
    fn test_rebuild_releases_previous_tree() {
        let mut graph = ObjectGraph::new();
        let map = WebMercatorMap::default();
        let points = prague(&mut graph);
        let mut layer =
            build_cluster_layer(&mut graph, &map, &points[..2], render, Config::default())
                .unwrap();
        let first_markers: Vec<ObjectId> =
            layer.clusters().iter().map(|(_, n)| n.marker()).collect();

        layer.add(&mut graph, &map, &points[2..]).unwrap();
        assert_eq!(layer.points(), points.as_slice());
        assert!(first_markers.iter().all(|m| !graph.contains(*m)));

        // Points, the layer object and two objects per cluster node
        let nodes = layer.clusters().len();
        assert_eq!(graph.len(), points.len() + 1 + 2 * nodes);

        // Adding a point already in the layer does not duplicate it
        layer.add(&mut graph, &map, &points[..1]).unwrap();
        assert_eq!(layer.points().len(), 4);
        assert_eq!(layer.clusters().roots().len(), 1);
    }

    #[test]
    fn test_far_point_adds_root_and_keeps_cluster() {
        let mut graph = ObjectGraph::new();
        let map = WebMercatorMap::default();
        let points = prague(&mut graph);
        let mut layer =
            build_cluster_layer(&mut graph, &map, &points, render, Config::default()).unwrap();
        let root = layer.clusters().get(layer.clusters().roots()[0]).unwrap();
        let shape = (root.start_zoom(), root.end_zoom(), root.point_count());

        let sydney = graph.create("sydney", lat_lon(-33.8688, 151.2093));
        layer.add(&mut graph, &map, &[sydney]).unwrap();

        let forest = layer.clusters();
        assert_eq!(forest.roots().len(), 2);
        let root = forest.get(forest.roots()[0]).unwrap();
        assert_eq!((root.start_zoom(), root.end_zoom(), root.point_count()), shape);

        // At zoom 0 the far point is shown on its own next to the aggregate
        let visible = layer.visible(&graph);
        assert_eq!(visible.len(), 2);
        assert!(visible.contains(&VisibleItem::Point {
            id: sydney,
            location: lat_lon(-33.8688, 151.2093),
        }));
    }

    #[test]
    fn test_live_centroid_and_layer_location() {
        let mut graph = ObjectGraph::new();
        let map = WebMercatorMap::default();
        let points = prague(&mut graph);
        let layer =
            build_cluster_layer(&mut graph, &map, &points, render, Config::default()).unwrap();

        let cluster_location = |graph: &ObjectGraph| match layer.visible(graph)[0] {
            VisibleItem::Cluster { location, .. } => location,
            VisibleItem::Point { location, .. } => location,
        };
        let before = cluster_location(&graph);
        assert_eq!(layer.location(&graph), graph.location(layer.object()));

        graph.set_location(points[0], lat_lon(50.2, 14.5)).unwrap();
        let after = cluster_location(&graph);
        assert_ne!(before, after);
        assert!(after.y() > before.y());
        assert_eq!(layer.location(&graph), Some(after));
    }

    #[test]
    fn test_delete_layer() {
        let mut graph = ObjectGraph::new();
        let map = WebMercatorMap::default();
        let points = prague(&mut graph);
        let mut layer =
            build_cluster_layer(&mut graph, &map, &points, render, Config::default()).unwrap();

        layer.delete(&mut graph).unwrap();
        assert_eq!(graph.len(), points.len());
        assert!(points.iter().all(|p| !graph.is_active(*p)));
        assert!(layer.visible(&graph).is_empty());
        assert_eq!(layer.location(&graph), None);

        assert_eq!(layer.delete(&mut graph), Err(ClusterError::LayerDeleted));
        assert_eq!(
            layer.add(&mut graph, &map, &points),
            Err(ClusterError::LayerDeleted)
        );
    }

    #[test]
    fn test_middle_location_mode() {
        let mut graph = ObjectGraph::new();
        let map = WebMercatorMap::default();
        let points = prague(&mut graph);
        let config = Config {
            location_mode: LocationMode::Middle,
            ..Config::default()
        };
        let layer = build_cluster_layer(&mut graph, &map, &points, render, config).unwrap();

        for (_, node) in layer.clusters().iter() {
            assert_eq!(
                graph.location_mode(node.sub_layer()),
                Some(LocationMode::Middle)
            );
        }
        assert_eq!(
            graph.location_mode(layer.object()),
            Some(LocationMode::Middle)
        );
    }
}
