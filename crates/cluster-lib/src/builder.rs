//! Cluster tree construction
//!
//! Building happens in two passes over plain values:
//!
//! 1. Every point walks the zoom levels from min to max and descends a trie of
//!    grid-cell groups, one trie level per zoom level. The cell path of each point
//!    is independent of the others, so paths are computed in parallel and then
//!    inserted sequentially (keeping insertion order deterministic).
//! 2. The trie is folded top-down: a group with exactly one child group is merged
//!    with it, so every resulting [`ClusterData`] node is a grouping that stays the
//!    same across its whole zoom range.

use crate::grid::{GridCell, Projection, cell_index};
use crate::{ClusterError, Location, Result, Zoom};
use rayon::prelude::*;
use smallvec::SmallVec;
use std::collections::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Typical zoom ranges fit inline (slippy maps stop around zoom 20-22)
type CellPath = SmallVec<[GridCell; 24]>;

/// A node of the minimized cluster tree
///
/// Invariant: a node has either at least two children or none; leaf nodes hold the
/// points and always extend to the maximum zoom level.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClusterData<P> {
    /// First zoom level at which this grouping exists
    pub start_zoom: Zoom,
    /// Last zoom level before the grouping splits
    pub end_zoom: Zoom,
    /// Sub-groupings valid from `end_zoom + 1`
    pub children: Vec<ClusterData<P>>,
    /// Points held directly by this node
    pub points: Vec<P>,
}

impl<P> ClusterData<P> {
    /// Total number of points in this subtree
    pub fn point_count(&self) -> usize {
        self.points.len() + self.children.iter().map(|c| c.point_count()).sum::<usize>()
    }

    /// Number of nodes in this subtree, including itself
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(|c| c.node_count()).sum::<usize>()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Whether `zoom` lies within `[start_zoom, end_zoom]`
    pub fn contains_zoom(&self, zoom: Zoom) -> bool {
        zoom >= self.start_zoom && zoom <= self.end_zoom
    }

    /// All points of the subtree, depth-first in child order
    pub fn collect_points(&self) -> Vec<&P> {
        let mut points = Vec::with_capacity(self.point_count());
        self.collect_points_into(&mut points);
        points
    }

    fn collect_points_into<'a>(&'a self, out: &mut Vec<&'a P>) {
        out.extend(self.points.iter());
        for child in &self.children {
            child.collect_points_into(out);
        }
    }
}

/// A group of the build-time trie: one grid cell at one zoom level
#[derive(Debug)]
struct Group<P> {
    cell: GridCell,
    /// Points whose path ends here (only at the maximum zoom level)
    points: Vec<P>,
    /// Child groups at the next zoom level, by cell
    lookup: HashMap<(i64, i64), usize>,
    /// Child groups in insertion order
    children: Vec<usize>,
}

impl<P> Group<P> {
    fn new(cell: GridCell) -> Self {
        Self {
            cell,
            points: Vec::new(),
            lookup: HashMap::new(),
            children: Vec::new(),
        }
    }
}

/// The per-zoom grid-membership trie
#[derive(Debug)]
struct GroupTrie<P> {
    groups: Vec<Group<P>>,
    root_lookup: HashMap<(i64, i64), usize>,
    roots: Vec<usize>,
}

impl<P> GroupTrie<P> {
    fn new() -> Self {
        Self {
            groups: Vec::new(),
            root_lookup: HashMap::new(),
            roots: Vec::new(),
        }
    }

    /// Find or create the group for `cell` under `parent` (a root group if `None`)
    fn descend(&mut self, parent: Option<usize>, cell: GridCell) -> usize {
        let existing = match parent {
            Some(parent) => self.groups[parent].lookup.get(&cell.key()),
            None => self.root_lookup.get(&cell.key()),
        };
        if let Some(&index) = existing {
            return index;
        }

        let index = self.groups.len();
        self.groups.push(Group::new(cell));
        match parent {
            Some(parent) => {
                let parent = &mut self.groups[parent];
                parent.lookup.insert(cell.key(), index);
                parent.children.push(index);
            }
            None => {
                self.root_lookup.insert(cell.key(), index);
                self.roots.push(index);
            }
        }
        index
    }

    /// Fold the trie into the minimized cluster forest
    fn fold(mut self) -> Vec<ClusterData<P>> {
        let roots = std::mem::take(&mut self.roots);
        roots
            .into_iter()
            .map(|root| fold_group(&mut self.groups, root))
            .collect()
    }
}

/// Simplify one group, merging single-child chains
fn fold_group<P>(groups: &mut [Group<P>], index: usize) -> ClusterData<P> {
    let zoom = groups[index].cell.zoom;
    let points = std::mem::take(&mut groups[index].points);
    let child_indices = std::mem::take(&mut groups[index].children);

    let mut children: Vec<ClusterData<P>> = child_indices
        .into_iter()
        .map(|child| fold_group(groups, child))
        .collect();

    let mut data = ClusterData {
        start_zoom: zoom,
        end_zoom: zoom,
        children: Vec::new(),
        points,
    };

    if children.len() == 1 {
        if let Some(only) = children.pop() {
            data.end_zoom = only.end_zoom;
            data.children = only.children;
            data.points.extend(only.points);
        }
    } else if children.len() > 1 {
        data.children = children;
    }

    data
}

/// Builds cluster forests for a fixed projection, zoom range and radius
pub struct ClusterTreeBuilder<'a, M: Projection + ?Sized> {
    projection: &'a M,
    min_zoom: Zoom,
    max_zoom: Zoom,
    radius: f64,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl<'a, M: Projection + ?Sized> ClusterTreeBuilder<'a, M> {
    /// Create a builder
    ///
    /// # Arguments
    /// * `projection` - Pixel projection used to bucket points
    /// * `min_zoom`, `max_zoom` - Inclusive zoom range to build for
    /// * `radius` - Grid cell size in pixels, shared by every zoom level
    pub fn new(projection: &'a M, min_zoom: Zoom, max_zoom: Zoom, radius: f64) -> Result<Self> {
        if min_zoom > max_zoom {
            return Err(ClusterError::InvalidZoomRange {
                min: min_zoom,
                max: max_zoom,
            });
        }
        if !radius.is_finite() || radius <= 0.0 {
            return Err(ClusterError::InvalidRadius(radius));
        }
        Ok(Self {
            projection,
            min_zoom,
            max_zoom,
            radius,
        })
    }

    /// Build the cluster forest for a batch of points
    ///
    /// Each root covers `min_zoom` onwards; every input point appears exactly once
    /// among the leaves. Points and groups keep their input order.
    pub fn build<P>(&self, points: &[(P, Location)]) -> Vec<ClusterData<P>>
    where
        P: Clone + Sync,
    {
        #[cfg(feature = "profiling")]
        profiling::scope!("builder::build");

        // Pass 1: cell path of every point (independent per point)
        let paths: Vec<CellPath> = points
            .par_iter()
            .map(|(_, location)| self.cell_path(*location))
            .collect();

        // Pass 2: insert the paths into the trie in input order
        let mut trie = GroupTrie::new();
        for ((point, _), path) in points.iter().zip(&paths) {
            let mut parent = None;
            for cell in path {
                parent = Some(trie.descend(parent, *cell));
            }
            if let Some(leaf) = parent {
                trie.groups[leaf].points.push(point.clone());
            }
        }

        let group_count = trie.groups.len();
        let forest = trie.fold();

        tracing::debug!(
            "Built {} cluster roots from {} points ({} trie groups, zoom {}..={})",
            forest.len(),
            points.len(),
            group_count,
            self.min_zoom,
            self.max_zoom
        );

        forest
    }

    /// Grid cells of a location at every zoom level of the range
    fn cell_path(&self, location: Location) -> CellPath {
        (self.min_zoom..=self.max_zoom)
            .map(|zoom| cell_index(self.projection, location, zoom, self.radius))
            .collect()
    }
}
