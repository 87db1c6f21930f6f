//! Runtime cluster nodes
//!
//! A [`ClusterForest`] wraps the static [`ClusterData`] forest with display state.
//! Every node owns two objects in the [`ObjectGraph`]:
//!
//! - a **sub-layer**, the container of the node's leaf points and of the aggregate
//!   markers of its child clusters; its location is their centroid
//! - an **aggregate marker** that follows the sub-layer's location through a
//!   location listener and is added to the parent cluster's sub-layer
//!
//! Moving a point therefore ripples up through every enclosing cluster marker.

use crate::builder::ClusterData;
use crate::graph::{Event, EventKind, ListenerId, LocationMode, ObjectGraph, ObjectId};
use crate::utils::lat_lon;
use crate::{ClusterError, Result, Zoom};
use std::fmt::{self, Write as _};

/// Index of a node in a [`ClusterForest`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClusterId(usize);

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// A displayable cluster valid over a contiguous zoom range
#[derive(Debug)]
pub struct ClusterNode<R> {
    start_zoom: Zoom,
    end_zoom: Zoom,
    points: Vec<ObjectId>,
    children: Vec<ClusterId>,
    parent: Option<ClusterId>,
    marker: ObjectId,
    sub_layer: ObjectId,
    centroid_listener: ListenerId,
    active: bool,
    point_count: usize,
    aggregate: R,
}

impl<R> ClusterNode<R> {
    pub fn start_zoom(&self) -> Zoom {
        self.start_zoom
    }

    pub fn end_zoom(&self) -> Zoom {
        self.end_zoom
    }

    /// Points owned directly by this node (only leaves own points)
    pub fn points(&self) -> &[ObjectId] {
        &self.points
    }

    pub fn children(&self) -> &[ClusterId] {
        &self.children
    }

    pub fn parent(&self) -> Option<ClusterId> {
        self.parent
    }

    /// The aggregate marker object
    pub fn marker(&self) -> ObjectId {
        self.marker
    }

    /// The container of this node's points and child markers
    pub fn sub_layer(&self) -> ObjectId {
        self.sub_layer
    }

    /// Whether the node is active (independent of being in range)
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Total number of leaf points in the subtree
    pub fn point_count(&self) -> usize {
        self.point_count
    }

    /// The renderable built for this node's point count
    pub fn aggregate(&self) -> &R {
        &self.aggregate
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Whether `zoom` lies within `[start_zoom, end_zoom]`
    pub fn contains_zoom(&self, zoom: Zoom) -> bool {
        zoom >= self.start_zoom && zoom <= self.end_zoom
    }

    /// Zoom level at which this cluster splits into its children
    pub fn expand_zoom(&self) -> Zoom {
        self.end_zoom.saturating_add(1)
    }

    /// Whether the aggregate marker should be shown at `zoom`
    fn shows_marker(&self, zoom: Zoom) -> bool {
        self.active && !self.children.is_empty() && self.contains_zoom(zoom)
    }

    /// Whether the directly-owned points should be shown at `zoom`
    fn shows_points(&self, zoom: Zoom) -> bool {
        self.active && zoom >= self.start_zoom
    }
}

/// Arena of runtime cluster nodes
#[derive(Debug)]
pub struct ClusterForest<R> {
    nodes: Vec<ClusterNode<R>>,
    roots: Vec<ClusterId>,
}

impl<R> Default for ClusterForest<R> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            roots: Vec::new(),
        }
    }
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl<R> ClusterForest<R> {
    /// Materialize a cluster forest in the graph
    ///
    /// The sub-layers of the roots are added to `container`. Every aggregate marker
    /// starts inactive and every node starts inactive; use [`set_active`] to
    /// display the forest.
    ///
    /// [`set_active`]: ClusterForest::set_active
    pub fn build(
        graph: &mut ObjectGraph,
        container: ObjectId,
        data: Vec<ClusterData<ObjectId>>,
        location_mode: LocationMode,
        render: &dyn Fn(usize) -> R,
    ) -> Result<Self> {
        let mut forest = Self::default();
        for root in data {
            let id = forest.initialize(graph, root, None, location_mode, render)?;
            graph.add_child(container, forest.nodes[id.0].sub_layer)?;
            forest.roots.push(id);
        }
        Ok(forest)
    }

    /// Create the graph objects of a node and its subtree
    ///
    /// Children are materialized first so the marker is created at the final
    /// centroid of the sub-layer.
    fn initialize(
        &mut self,
        graph: &mut ObjectGraph,
        data: ClusterData<ObjectId>,
        parent_sub_layer: Option<ObjectId>,
        location_mode: LocationMode,
        render: &dyn Fn(usize) -> R,
    ) -> Result<ClusterId> {
        let ClusterData {
            start_zoom,
            end_zoom,
            children,
            points,
        } = data;

        let sub_layer = graph.create("cluster-sub-layer", lat_lon(0.0, 0.0));
        graph.set_location_mode(sub_layer, location_mode)?;

        let mut child_ids = Vec::with_capacity(children.len());
        for child in children {
            child_ids.push(self.initialize(graph, child, Some(sub_layer), location_mode, render)?);
        }
        graph.add_children(sub_layer, &points)?;

        let point_count = points.len()
            + child_ids
                .iter()
                .map(|c| self.nodes[c.0].point_count)
                .sum::<usize>();

        let location = graph
            .location(sub_layer)
            .ok_or(ClusterError::UnknownObject(sub_layer))?;
        let marker = graph.create("cluster-marker", location);
        graph.set_active(marker, false, false, false)?;
        if let Some(parent_sub_layer) = parent_sub_layer {
            graph.add_child(parent_sub_layer, marker)?;
        }

        let centroid_listener = graph.add_listener(
            sub_layer,
            EventKind::LocationChange,
            move |graph: &mut ObjectGraph, _: ObjectId, event: &Event| {
                if let Event::LocationChanged(location) = event
                    && let Err(err) = graph.set_location(marker, *location)
                {
                    tracing::warn!("Failed to move cluster marker {}: {}", marker, err);
                }
            },
        )?;

        let id = ClusterId(self.nodes.len());
        for child in &child_ids {
            self.nodes[child.0].parent = Some(id);
        }
        self.nodes.push(ClusterNode {
            start_zoom,
            end_zoom,
            points,
            children: child_ids,
            parent: None,
            marker,
            sub_layer,
            centroid_listener,
            active: false,
            point_count,
            aggregate: render(point_count),
        });
        Ok(id)
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn roots(&self) -> &[ClusterId] {
        &self.roots
    }

    pub fn get(&self, id: ClusterId) -> Option<&ClusterNode<R>> {
        self.nodes.get(id.0)
    }

    /// All nodes in arena order (children before their parent)
    pub fn iter(&self) -> impl Iterator<Item = (ClusterId, &ClusterNode<R>)> {
        self.nodes.iter().enumerate().map(|(i, n)| (ClusterId(i), n))
    }

    /// Update the graph's active flags for one node at `zoom`
    ///
    /// Shows the aggregate marker iff the node is in range, has children and is
    /// active. Shows the node's own points iff `zoom >= start_zoom` and the node is
    /// active. Points deleted from the graph since the build are skipped.
    pub fn redisplay(&self, graph: &mut ObjectGraph, id: ClusterId, zoom: Zoom) -> Result<()> {
        let Some(node) = self.nodes.get(id.0) else {
            return Ok(());
        };

        graph.set_active(node.marker, node.shows_marker(zoom), false, false)?;

        let show_points = node.shows_points(zoom);
        for &point in &node.points {
            if !graph.contains(point) {
                tracing::warn!("Cluster {} skips deleted point {}", id, point);
                continue;
            }
            graph.set_active(point, show_points, false, false)?;
        }
        Ok(())
    }

    /// Set the active flag of a node and all of its descendants
    ///
    /// Descendants are always visited. A node whose flag does not change is only
    /// redisplayed when `force` is set.
    pub fn set_active(
        &mut self,
        graph: &mut ObjectGraph,
        id: ClusterId,
        active: bool,
        force: bool,
        zoom: Zoom,
    ) -> Result<()> {
        let Some(node) = self.nodes.get(id.0) else {
            return Ok(());
        };
        for child in node.children.clone() {
            self.set_active(graph, child, active, false, zoom)?;
        }

        let node = &mut self.nodes[id.0];
        if node.active == active && !force {
            return Ok(());
        }
        node.active = active;
        self.redisplay(graph, id, zoom)
    }

    /// Set the active flag of every root (and thereby every node)
    pub fn set_active_all(
        &mut self,
        graph: &mut ObjectGraph,
        active: bool,
        force: bool,
        zoom: Zoom,
    ) -> Result<()> {
        for root in self.roots.clone() {
            self.set_active(graph, root, active, force, zoom)?;
        }
        Ok(())
    }

    /// Every cluster below `id`, in pre-order (excluding `id` itself)
    pub fn descendants(&self, id: ClusterId) -> Vec<ClusterId> {
        let mut out = Vec::new();
        let mut stack: Vec<ClusterId> = self
            .get(id)
            .map(|n| n.children.iter().rev().copied().collect())
            .unwrap_or_default();
        while let Some(next) = stack.pop() {
            out.push(next);
            if let Some(node) = self.get(next) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    /// Number of clusters below `id`
    pub fn total_subclusters(&self, id: ClusterId) -> usize {
        self.get(id)
            .map(|n| {
                n.children.len()
                    + n.children
                        .iter()
                        .map(|c| self.total_subclusters(*c))
                        .sum::<usize>()
            })
            .unwrap_or(0)
    }

    /// Human-readable dump of the forest with zoom ranges and counts
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for &root in &self.roots {
            self.describe_node(&mut out, root, 0);
        }
        out
    }

    fn describe_node(&self, out: &mut String, id: ClusterId, depth: usize) {
        let Some(node) = self.get(id) else {
            return;
        };
        let indent = "  ".repeat(depth);
        let _ = if node.is_leaf() {
            writeln!(
                out,
                "{indent}{id} zoom {}..={} points {}",
                node.start_zoom,
                node.end_zoom,
                node.points.len()
            )
        } else {
            writeln!(
                out,
                "{indent}{id} zoom {}..={} count {} subclusters {}",
                node.start_zoom,
                node.end_zoom,
                node.point_count,
                self.total_subclusters(id)
            )
        };
        for &child in &node.children {
            self.describe_node(out, child, depth + 1);
        }
    }

    /// Tear down the graph objects of the forest, bottom-up
    ///
    /// Centroid listeners are removed and markers and sub-layers are deleted. The
    /// points themselves survive: they are detached and left inactive.
    pub fn release(self, graph: &mut ObjectGraph) -> Result<()> {
        for &root in &self.roots {
            self.release_node(graph, root)?;
        }
        Ok(())
    }

    fn release_node(&self, graph: &mut ObjectGraph, id: ClusterId) -> Result<()> {
        let Some(node) = self.get(id) else {
            return Ok(());
        };
        for &child in &node.children {
            self.release_node(graph, child)?;
        }

        graph.remove_listener(node.sub_layer, node.centroid_listener);
        graph.delete(node.marker)?;
        for point in graph.take_children(node.sub_layer)? {
            graph.set_active(point, false, false, false)?;
        }
        graph.delete(node.sub_layer)
    }
}
