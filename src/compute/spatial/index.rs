//! Zoom-indexed hierarchical clustering over R*-trees.
//!
//! Items are projected onto the unit Web-Mercator square. Level `max_zoom`
//! holds one leaf per item; each lower level is derived from the one above
//! by greedy radius clustering, so a node at zoom `z` is either carried over
//! unchanged or merged with its unconsumed neighbours into a new cluster node.
//! Every level is bulk-loaded into its own `RTree`, which keeps queries
//! proportional to the touched tree nodes plus the result size.
//!
//! Each node also records the extent of its member items. Tree envelopes are
//! those extents rather than the centroid, so a viewport query returns every
//! node owning at least one item inside the box even when the node's centroid
//! lies outside it.
//!
//! Nodes live in one arena shared by all levels. A node carried across levels
//! keeps its arena id, which is what makes cluster ids stable for repeated
//! queries against the same index.
//!
//! # Example
//!
//! ```rust
//! use clustermark::{BoundingBox2D, Config, Item, PointStore, SpatialIndex};
//!
//! let store = PointStore::from_items(vec![
//!     Item::new("a", 48.8566, 2.3522, "a.png"),
//!     Item::new("b", 48.8570, 2.3530, "b.png"),
//!     Item::new("c", 40.4168, -3.7038, "c.png"),
//! ])?;
//! let index = SpatialIndex::build(&store, &Config::default());
//!
//! assert_eq!(index.query(&BoundingBox2D::world(), 21).len(), 3);
//! assert!(index.query(&BoundingBox2D::world(), 0).len() < 3);
//! # Ok::<(), clustermark::ClusterError>(())
//! ```

use super::projection::{lat_y, lng_x, radius_at, x_lng, y_lat};
use crate::config::Config;
use crate::store::PointStore;
use clustermark_types::bbox::BoundingBox2D;
use clustermark_types::item::ClusterId;
use rstar::{AABB, PointDistance, RTree, RTreeObject};
use smallvec::SmallVec;
use std::time::Instant;

type NodeId = u32;

/// Raw result of an index query; item references are dense store indices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IndexHit {
    Leaf {
        item: usize,
    },
    Cluster {
        id: ClusterId,
        lng: f64,
        lat: f64,
        count: usize,
        /// First leaf of the first child, recursively.
        representative: usize,
    },
}

impl IndexHit {
    /// Number of items this hit stands for.
    pub fn count(&self) -> usize {
        match self {
            IndexHit::Leaf { .. } => 1,
            IndexHit::Cluster { count, .. } => *count,
        }
    }
}

/// Entry of one level's R*-tree.
#[derive(Debug, Clone, Copy, PartialEq)]
struct LevelEntry {
    x: f64,
    y: f64,
    min: [f64; 2],
    max: [f64; 2],
    /// Position in the level's node list.
    slot: u32,
    node: NodeId,
}

impl RTreeObject for LevelEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.min, self.max)
    }
}

// Distance is measured to the centroid, which lies inside the envelope, so
// envelope pruning in radius searches never skips a match.
impl PointDistance for LevelEntry {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.x - point[0];
        let dy = self.y - point[1];
        dx * dx + dy * dy
    }
}

#[derive(Debug, Clone)]
struct Node {
    x: f64,
    y: f64,
    /// Extent of the member items in projected units.
    min: [f64; 2],
    max: [f64; 2],
    count: usize,
    /// For a leaf, the item itself.
    first_item: usize,
    kind: NodeKind,
}

#[derive(Debug, Clone)]
enum NodeKind {
    Leaf,
    Cluster {
        /// Zoom of the level that created this cluster.
        zoom: u8,
        children: SmallVec<[NodeId; 8]>,
    },
}

struct Level {
    nodes: Vec<NodeId>,
    tree: RTree<LevelEntry>,
}

impl Level {
    fn new(ids: Vec<NodeId>, arena: &[Node]) -> Self {
        let entries = ids
            .iter()
            .enumerate()
            .map(|(slot, &node)| {
                let n = &arena[node as usize];
                LevelEntry {
                    x: n.x,
                    y: n.y,
                    min: n.min,
                    max: n.max,
                    slot: slot as u32,
                    node,
                }
            })
            .collect();

        Self {
            nodes: ids,
            tree: RTree::bulk_load(entries),
        }
    }
}

/// Immutable cluster hierarchy for one item snapshot.
///
/// Safe to share between threads; every query takes `&self`.
pub struct SpatialIndex {
    nodes: Vec<Node>,
    /// `levels[i]` is zoom `min_zoom + i`.
    levels: Vec<Level>,
    min_zoom: u8,
    max_zoom: u8,
    item_count: usize,
}

impl SpatialIndex {
    /// Build the hierarchy for every zoom in `[config.min_zoom, config.max_zoom]`.
    ///
    /// Leaf ids equal store indices. The arena is addressed with `u32`, which
    /// bounds the index to roughly `u32::MAX / (zoom levels)` items.
    pub fn build(store: &PointStore, config: &Config) -> Self {
        let started = Instant::now();
        let min_zoom = config.min_zoom.min(config.max_zoom);
        let max_zoom = config.max_zoom;

        let mut nodes: Vec<Node> = store
            .items()
            .iter()
            .enumerate()
            .map(|(idx, item)| {
                let (x, y) = (lng_x(item.longitude), lat_y(item.latitude));
                Node {
                    x,
                    y,
                    min: [x, y],
                    max: [x, y],
                    count: 1,
                    first_item: idx,
                    kind: NodeKind::Leaf,
                }
            })
            .collect();

        let leaves = (0..nodes.len() as NodeId).collect();
        let mut current = Level::new(leaves, &nodes);
        let mut levels = Vec::with_capacity(usize::from(max_zoom - min_zoom) + 1);

        for zoom in (min_zoom..max_zoom).rev() {
            let next = cluster_level(&mut nodes, &current, zoom, config);
            let finished = std::mem::replace(&mut current, Level::new(next, &nodes));
            levels.push(finished);
        }
        levels.push(current);
        levels.reverse();

        log::debug!(
            "built spatial index: {} items, {} nodes, zoom {}..={} in {:?}",
            store.len(),
            nodes.len(),
            min_zoom,
            max_zoom,
            started.elapsed()
        );

        Self {
            nodes,
            levels,
            min_zoom,
            max_zoom,
            item_count: store.len(),
        }
    }

    /// Features visible in `bbox` at `zoom`, sorted by node id.
    ///
    /// A node is visible when the extent of its members intersects `bbox`.
    /// Every item inside `bbox` therefore belongs to exactly one hit, while a
    /// cluster straddling the edge may also carry members outside it.
    ///
    /// `zoom` is clamped to the indexed range. `bbox` must not cross the
    /// antimeridian; split such boxes before calling.
    pub fn query(&self, bbox: &BoundingBox2D, zoom: i32) -> Vec<IndexHit> {
        let zoom = self.clamp_zoom(zoom);
        let Some(level) = self.levels.get(usize::from(zoom - self.min_zoom)) else {
            return Vec::new();
        };

        let envelope = AABB::from_corners(
            [lng_x(bbox.min_x()), lat_y(bbox.max_y())],
            [lng_x(bbox.max_x()), lat_y(bbox.min_y())],
        );

        let mut ids: Vec<NodeId> = level
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|entry| entry.node)
            .collect();
        ids.sort_unstable();

        ids.into_iter().map(|id| self.hit(id)).collect()
    }

    /// Direct children of a cluster, one level further in.
    pub fn children(&self, id: ClusterId) -> Option<Vec<IndexHit>> {
        let NodeKind::Cluster { children, .. } = &self.cluster_node(id)?.kind else {
            return None;
        };
        Some(children.iter().map(|&child| self.hit(child)).collect())
    }

    /// Store indices of the items under a cluster, in tree order.
    pub fn leaves(&self, id: ClusterId, limit: usize, offset: usize) -> Option<Vec<usize>> {
        let root = self.cluster_node(id)?;
        let mut stack: Vec<&Node> = vec![root];
        let mut skipped = 0;
        let mut out = Vec::new();

        while let Some(node) = stack.pop() {
            if out.len() >= limit {
                break;
            }
            match &node.kind {
                NodeKind::Leaf => {
                    if skipped < offset {
                        skipped += 1;
                    } else {
                        out.push(node.first_item);
                    }
                }
                NodeKind::Cluster { children, .. } => {
                    stack.extend(children.iter().rev().map(|&c| &self.nodes[c as usize]));
                }
            }
        }

        Some(out)
    }

    /// Zoom at which a cluster splits into its children.
    pub fn expansion_zoom(&self, id: ClusterId) -> Option<u8> {
        match self.cluster_node(id)?.kind {
            NodeKind::Cluster { zoom, .. } => Some(zoom.saturating_add(1).min(self.max_zoom)),
            NodeKind::Leaf => None,
        }
    }

    /// Clamp an arbitrary zoom into `[min_zoom, max_zoom]`.
    pub fn clamp_zoom(&self, zoom: i32) -> u8 {
        zoom.clamp(i32::from(self.min_zoom), i32::from(self.max_zoom)) as u8
    }

    pub fn min_zoom(&self) -> u8 {
        self.min_zoom
    }

    pub fn max_zoom(&self) -> u8 {
        self.max_zoom
    }

    /// Number of indexed items.
    pub fn len(&self) -> usize {
        self.item_count
    }

    pub fn is_empty(&self) -> bool {
        self.item_count == 0
    }

    fn cluster_node(&self, id: ClusterId) -> Option<&Node> {
        self.nodes
            .get(id.raw() as usize)
            .filter(|node| matches!(node.kind, NodeKind::Cluster { .. }))
    }

    fn hit(&self, id: NodeId) -> IndexHit {
        let node = &self.nodes[id as usize];
        match node.kind {
            NodeKind::Leaf => IndexHit::Leaf {
                item: node.first_item,
            },
            NodeKind::Cluster { .. } => IndexHit::Cluster {
                id: ClusterId::new(id),
                lng: x_lng(node.x),
                lat: y_lat(node.y),
                count: node.count,
                representative: node.first_item,
            },
        }
    }
}

/// Derive the node list of `zoom` from the level one zoom further in.
fn cluster_level(nodes: &mut Vec<Node>, level: &Level, zoom: u8, config: &Config) -> Vec<NodeId> {
    let radius = radius_at(config.cluster_radius_px, config.tile_extent, zoom);
    let max_distance_2 = radius * radius;

    let mut consumed = vec![false; level.nodes.len()];
    let mut next = Vec::with_capacity(level.nodes.len());
    let mut neighbours: Vec<LevelEntry> = Vec::new();

    for (slot, &id) in level.nodes.iter().enumerate() {
        if consumed[slot] {
            continue;
        }
        consumed[slot] = true;

        let (x, y, mut min, mut max, count, first_item) = {
            let node = &nodes[id as usize];
            (node.x, node.y, node.min, node.max, node.count, node.first_item)
        };

        neighbours.clear();
        neighbours.extend(
            level
                .tree
                .locate_within_distance([x, y], max_distance_2)
                .filter(|entry| !consumed[entry.slot as usize])
                .copied(),
        );
        // R*-tree traversal order is not part of the contract.
        neighbours.sort_unstable_by_key(|entry| entry.slot);

        let total = count
            + neighbours
                .iter()
                .map(|entry| nodes[entry.node as usize].count)
                .sum::<usize>();

        if total == count || total < config.min_cluster_points {
            next.push(id);
            continue;
        }

        let mut wx = x * count as f64;
        let mut wy = y * count as f64;
        let mut children: SmallVec<[NodeId; 8]> = SmallVec::with_capacity(neighbours.len() + 1);
        children.push(id);

        for entry in &neighbours {
            consumed[entry.slot as usize] = true;
            let node = &nodes[entry.node as usize];
            wx += node.x * node.count as f64;
            wy += node.y * node.count as f64;
            min = [min[0].min(node.min[0]), min[1].min(node.min[1])];
            max = [max[0].max(node.max[0]), max[1].max(node.max[1])];
            children.push(entry.node);
        }

        let cluster = nodes.len() as NodeId;
        nodes.push(Node {
            x: wx / total as f64,
            y: wy / total as f64,
            min,
            max,
            count: total,
            first_item,
            kind: NodeKind::Cluster { zoom, children },
        });
        next.push(cluster);
    }

    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use clustermark_types::item::Item;

    fn store(points: &[(&str, f64, f64)]) -> PointStore {
        PointStore::from_items(
            points
                .iter()
                .map(|&(id, lat, lng)| Item::new(id, lat, lng, format!("{id}.png")))
                .collect(),
        )
        .unwrap()
    }

    fn pair_and_outlier() -> PointStore {
        store(&[
            ("a", 0.0, 0.0),
            ("b", 0.0, 0.0001),
            ("c", 10.0, 10.0),
        ])
    }

    #[test]
    fn test_empty_index() {
        let index = SpatialIndex::build(&PointStore::empty(), &Config::default());
        assert!(index.is_empty());
        for zoom in [-3, 0, 10, 21, 40] {
            assert!(index.query(&BoundingBox2D::world(), zoom).is_empty());
        }
    }

    #[test]
    fn test_max_zoom_returns_every_leaf() {
        let index = SpatialIndex::build(&pair_and_outlier(), &Config::default());
        let hits = index.query(&BoundingBox2D::world(), 21);
        assert_eq!(
            hits,
            vec![
                IndexHit::Leaf { item: 0 },
                IndexHit::Leaf { item: 1 },
                IndexHit::Leaf { item: 2 },
            ]
        );
    }

    #[test]
    fn test_pair_clusters_before_outlier() {
        let index = SpatialIndex::build(&pair_and_outlier(), &Config::default());

        let hits = index.query(&BoundingBox2D::world(), 10);
        assert_eq!(hits.len(), 2);
        assert!(hits.contains(&IndexHit::Leaf { item: 2 }));
        let cluster = hits
            .iter()
            .find(|hit| matches!(hit, IndexHit::Cluster { .. }))
            .unwrap();
        match cluster {
            IndexHit::Cluster {
                count,
                representative,
                lng,
                lat,
                ..
            } => {
                assert_eq!(*count, 2);
                assert_eq!(*representative, 0);
                assert!((lng - 0.00005).abs() < 1e-9);
                assert!(lat.abs() < 1e-9);
            }
            IndexHit::Leaf { .. } => unreachable!(),
        }

        let top = index.query(&BoundingBox2D::world(), 0);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].count(), 3);
    }

    #[test]
    fn test_zoom_is_clamped() {
        let config = Config::default().with_zoom_range(3, 12);
        let index = SpatialIndex::build(&pair_and_outlier(), &config);
        let world = BoundingBox2D::world();
        assert_eq!(index.query(&world, -4), index.query(&world, 3));
        assert_eq!(index.query(&world, 99), index.query(&world, 12));
        assert_eq!(index.clamp_zoom(7), 7);
    }

    #[test]
    fn test_bbox_filters_hits() {
        let index = SpatialIndex::build(&pair_and_outlier(), &Config::default());
        let around_outlier = BoundingBox2D::new(9.0, 9.0, 11.0, 11.0);
        assert_eq!(
            index.query(&around_outlier, 21),
            vec![IndexHit::Leaf { item: 2 }]
        );
        let nowhere = BoundingBox2D::new(100.0, -50.0, 120.0, -40.0);
        assert!(index.query(&nowhere, 5).is_empty());
    }

    #[test]
    fn test_cluster_found_by_member_outside_centroid() {
        // At zoom 0 both items merge into one cluster centred near lng 10.5,
        // outside the box that only contains "a".
        let store = store(&[("a", 0.0, 1.0), ("b", 0.0, 20.0)]);
        let index = SpatialIndex::build(&store, &Config::default());
        let bbox = BoundingBox2D::new(0.0, -5.0, 5.0, 5.0);

        let hits = index.query(&bbox, 0);
        assert_eq!(hits.len(), 1);
        let IndexHit::Cluster { id, lng, count, .. } = hits[0] else {
            panic!("expected a cluster at zoom 0");
        };
        assert_eq!(count, 2);
        assert!(lng > 5.0);
        assert!(index.leaves(id, usize::MAX, 0).unwrap().contains(&0));

        assert_eq!(index.query(&bbox, 21), vec![IndexHit::Leaf { item: 0 }]);
    }

    #[test]
    fn test_queries_are_stable() {
        let store = pair_and_outlier();
        let index = SpatialIndex::build(&store, &Config::default());
        let rebuilt = SpatialIndex::build(&store, &Config::default());
        for zoom in 0..=21 {
            let first = index.query(&BoundingBox2D::world(), zoom);
            assert_eq!(first, index.query(&BoundingBox2D::world(), zoom));
            assert_eq!(first, rebuilt.query(&BoundingBox2D::world(), zoom));
        }
    }

    #[test]
    fn test_children_leaves_and_expansion() {
        let index = SpatialIndex::build(&pair_and_outlier(), &Config::default());
        let top = index.query(&BoundingBox2D::world(), 0);
        let IndexHit::Cluster { id, .. } = top[0] else {
            panic!("expected a cluster at zoom 0");
        };

        let children = index.children(id).unwrap();
        assert!(children.len() >= 2);
        assert_eq!(children.iter().map(IndexHit::count).sum::<usize>(), 3);

        let mut leaves = index.leaves(id, usize::MAX, 0).unwrap();
        leaves.sort_unstable();
        assert_eq!(leaves, vec![0, 1, 2]);
        assert_eq!(index.leaves(id, 1, 0).unwrap().len(), 1);
        assert_eq!(index.leaves(id, usize::MAX, 2).unwrap().len(), 1);

        assert_eq!(index.expansion_zoom(id), Some(1));
        assert!(index.children(ClusterId::new(0)).is_none());
        assert!(index.expansion_zoom(ClusterId::new(9999)).is_none());
    }

    #[test]
    fn test_min_cluster_points() {
        let config = Config::default().with_min_cluster_points(3);
        let store = store(&[("a", 0.0, 0.0), ("b", 0.0, 0.0001), ("c", 40.0, 100.0)]);
        let index = SpatialIndex::build(&store, &config);
        let hits = index.query(&BoundingBox2D::world(), 0);
        assert_eq!(hits.len(), 3);
        assert!(hits.iter().all(|hit| matches!(hit, IndexHit::Leaf { .. })));
    }
}
