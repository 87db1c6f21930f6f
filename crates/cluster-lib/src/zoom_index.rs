//! Zoom level to cluster lookup
//!
//! Because a child cluster starts right after its parent ends, exactly one node on
//! every root-to-leaf path covers any given zoom level. A zoom change can therefore
//! only alter the display state of nodes bucketed at the old or the new level.

use crate::Zoom;
use crate::cluster::{ClusterForest, ClusterId};
use std::collections::{BTreeMap, HashSet};

/// Buckets of cluster nodes per zoom level
///
/// A node appears in every bucket of its `[start_zoom, end_zoom]` range.
#[derive(Debug, Clone, Default)]
pub struct ZoomVisibilityIndex {
    buckets: BTreeMap<Zoom, Vec<ClusterId>>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl ZoomVisibilityIndex {
    /// Build the index with one full walk of the forest
    pub fn build<R>(forest: &ClusterForest<R>) -> Self {
        let mut buckets: BTreeMap<Zoom, Vec<ClusterId>> = BTreeMap::new();
        for (id, node) in forest.iter() {
            for zoom in node.start_zoom()..=node.end_zoom() {
                buckets.entry(zoom).or_default().push(id);
            }
        }
        Self { buckets }
    }

    /// Nodes whose range includes `zoom`
    pub fn at(&self, zoom: Zoom) -> &[ClusterId] {
        self.buckets.get(&zoom).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Nodes to redisplay when moving from `previous` to `current`
    ///
    /// Every node of the `current` bucket comes first, followed by the nodes of
    /// the `previous` bucket that are not also in `current`. No node is listed
    /// twice.
    pub fn transition(&self, previous: Option<Zoom>, current: Zoom) -> Vec<ClusterId> {
        let entering = self.at(current);
        let mut nodes = entering.to_vec();

        if let Some(previous) = previous
            && previous != current
        {
            let entering: HashSet<ClusterId> = entering.iter().copied().collect();
            nodes.extend(
                self.at(previous)
                    .iter()
                    .copied()
                    .filter(|id| !entering.contains(id)),
            );
        }

        nodes
    }

    /// Total number of (zoom, node) entries
    pub fn entry_count(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ClusterTreeBuilder;
    use crate::graph::{LocationMode, ObjectGraph};
    use crate::utils::lat_lon;
    use crate::{Location, WebMercatorMap};

    fn forest(graph: &mut ObjectGraph) -> ClusterForest<usize> {
        let map = WebMercatorMap::default();
        let points: Vec<(_, Location)> = (0..60)
            .map(|i| {
                let t = i as f64 / 60.0;
                let location = lat_lon(48.0 + (t * 11.0).sin(), 2.0 + (t * 7.0).cos() * 3.0);
                (graph.create("point", location), location)
            })
            .collect();
        let data = ClusterTreeBuilder::new(&map, 0, 18, 200.0)
            .unwrap()
            .build(&points);
        let container = graph.create("layer", lat_lon(0.0, 0.0));
        ClusterForest::build(graph, container, data, LocationMode::Average, &|count: usize| count)
            .unwrap()
    }

    #[test]
    fn test_each_node_in_range_width_buckets() {
        let mut graph = ObjectGraph::new();
        let forest = forest(&mut graph);
        let index = ZoomVisibilityIndex::build(&forest);

        let mut expected = 0;
        for (id, node) in forest.iter() {
            let width = (node.end_zoom() - node.start_zoom()) as usize + 1;
            let buckets = (0..=18u8).filter(|z| index.at(*z).contains(&id)).count();
            assert_eq!(buckets, width);
            expected += width;
        }
        assert_eq!(index.entry_count(), expected);
    }

    #[test]
    fn test_one_node_per_path_at_every_zoom() {
        let mut graph = ObjectGraph::new();
        let forest = forest(&mut graph);
        let index = ZoomVisibilityIndex::build(&forest);

        for (id, node) in forest.iter().filter(|(_, n)| n.is_leaf()) {
            let mut path = vec![id];
            let mut current = node.parent();
            while let Some(parent) = current {
                path.push(parent);
                current = forest.get(parent).and_then(|n| n.parent());
            }
            for zoom in 0..=18u8 {
                let hits = path.iter().filter(|id| index.at(zoom).contains(*id)).count();
                assert_eq!(hits, 1, "zoom {zoom}");
            }
        }
    }

    #[test]
    fn test_transition_without_duplicates() {
        let mut graph = ObjectGraph::new();
        let forest = forest(&mut graph);
        let index = ZoomVisibilityIndex::build(&forest);

        // First display only visits the current bucket
        assert_eq!(index.transition(None, 7), index.at(7).to_vec());
        // Staying on the same zoom does not revisit the bucket twice
        assert_eq!(index.transition(Some(7), 7), index.at(7).to_vec());

        for (previous, current) in [(3, 4), (12, 2), (0, 18)] {
            let visited = index.transition(Some(previous), current);
            let unique: HashSet<_> = visited.iter().copied().collect();
            assert_eq!(unique.len(), visited.len());

            let allowed: HashSet<_> = index
                .at(previous)
                .iter()
                .chain(index.at(current))
                .copied()
                .collect();
            assert_eq!(unique, allowed);
        }
    }

    #[test]
    fn test_empty_index() {
        let index = ZoomVisibilityIndex::default();
        assert!(index.is_empty());
        assert!(index.at(3).is_empty());
        assert!(index.transition(Some(2), 3).is_empty());
    }
}
