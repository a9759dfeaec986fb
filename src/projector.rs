//! Domain view over spatial index results.
//!
//! `ClusterProjector` pairs one `PointStore` snapshot with the `SpatialIndex`
//! built from it and turns raw index hits into `ProjectedFeature`s that carry
//! item ids instead of store indices.

use crate::compute::geojson::features_to_geojson;
use crate::compute::spatial::{IndexHit, SpatialIndex};
use crate::error::{ClusterError, Result};
use crate::store::PointStore;
use clustermark_types::bbox::BoundingBox2D;
use clustermark_types::item::{ClusterId, Item, ItemId, MarkerId};
use geojson::FeatureCollection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A feature visible at one zoom level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProjectedFeature {
    Point {
        item_id: ItemId,
    },
    Cluster {
        cluster_id: ClusterId,
        centroid_lat: f64,
        centroid_lon: f64,
        member_count: usize,
        /// Item whose thumbnail represents the cluster.
        representative_item_id: ItemId,
    },
}

impl ProjectedFeature {
    pub fn marker_id(&self) -> MarkerId {
        match self {
            ProjectedFeature::Point { item_id } => MarkerId::Item(item_id.clone()),
            ProjectedFeature::Cluster { cluster_id, .. } => MarkerId::Cluster(*cluster_id),
        }
    }

    pub fn member_count(&self) -> usize {
        match self {
            ProjectedFeature::Point { .. } => 1,
            ProjectedFeature::Cluster { member_count, .. } => *member_count,
        }
    }

    /// The item whose thumbnail is drawn for this feature.
    pub fn thumbnail_item_id(&self) -> &ItemId {
        match self {
            ProjectedFeature::Point { item_id } => item_id,
            ProjectedFeature::Cluster {
                representative_item_id,
                ..
            } => representative_item_id,
        }
    }

    pub fn is_cluster(&self) -> bool {
        matches!(self, ProjectedFeature::Cluster { .. })
    }
}

/// Short form of a member count for badges: `999`, `1.5k`, `12k`.
///
/// # Examples
///
/// ```
/// use clustermark::projector::abbreviate_count;
///
/// assert_eq!(abbreviate_count(42), "42");
/// assert_eq!(abbreviate_count(1530), "1.5k");
/// assert_eq!(abbreviate_count(12_400), "12k");
/// ```
pub fn abbreviate_count(count: usize) -> String {
    if count >= 10_000 {
        format!("{}k", (count as f64 / 1000.0).round() as usize)
    } else if count >= 1000 {
        let tenths = (count as f64 / 100.0).round() / 10.0;
        if tenths.fract() == 0.0 {
            format!("{}k", tenths as usize)
        } else {
            format!("{tenths:.1}k")
        }
    } else {
        count.to_string()
    }
}

/// Projects index hits of one snapshot into features.
///
/// The epoch identifies the catalog load that produced the snapshot. Bitmaps
/// rendered for it are cached under that epoch, so a render that outlives its
/// snapshot cannot leak into the cache of a newer load.
#[derive(Clone)]
pub struct ClusterProjector {
    store: Arc<PointStore>,
    index: Arc<SpatialIndex>,
    epoch: u64,
}

impl ClusterProjector {
    /// Pair a store with the index built from it.
    ///
    /// Refuses pairs whose sizes disagree, since leaf ids are store indices.
    pub fn new(store: Arc<PointStore>, index: Arc<SpatialIndex>) -> Result<Self> {
        if store.len() != index.len() {
            return Err(ClusterError::IndexMismatch {
                index: index.len(),
                store: store.len(),
            });
        }
        Ok(Self {
            store,
            index,
            epoch: 0,
        })
    }

    /// Tag the snapshot with the cache epoch of the load that installs it.
    pub fn with_epoch(mut self, epoch: u64) -> Self {
        self.epoch = epoch;
        self
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// A projector over no items; every query is empty.
    pub fn empty(config: &crate::Config) -> Self {
        let store = Arc::new(PointStore::empty());
        let index = Arc::new(SpatialIndex::build(&store, config));
        Self {
            store,
            index,
            epoch: 0,
        }
    }

    pub fn store(&self) -> &Arc<PointStore> {
        &self.store
    }

    pub fn index(&self) -> &Arc<SpatialIndex> {
        &self.index
    }

    /// Query the index and project the result.
    pub fn query(&self, bbox: &BoundingBox2D, zoom: i32) -> Vec<ProjectedFeature> {
        if self.index.is_empty() {
            return Vec::new();
        }
        self.project(&self.index.query(bbox, zoom))
    }

    pub fn project(&self, hits: &[IndexHit]) -> Vec<ProjectedFeature> {
        hits.iter().map(|hit| self.project_hit(hit)).collect()
    }

    /// The item drawn for a feature: the point's own item, or the first leaf of
    /// a cluster's first child.
    pub fn representative_item_of(&self, feature: &ProjectedFeature) -> Option<&Item> {
        self.store.get(feature.thumbnail_item_id())
    }

    /// All member items of a cluster, in tree order.
    pub fn leaves_of(&self, cluster_id: ClusterId) -> Option<Vec<&Item>> {
        let leaves = self.index.leaves(cluster_id, usize::MAX, 0)?;
        Some(
            leaves
                .into_iter()
                .filter_map(|idx| self.store.item_at(idx))
                .collect(),
        )
    }

    /// Features one level below a cluster.
    pub fn children_of(&self, cluster_id: ClusterId) -> Option<Vec<ProjectedFeature>> {
        self.index
            .children(cluster_id)
            .map(|hits| self.project(&hits))
    }

    pub fn expansion_zoom(&self, cluster_id: ClusterId) -> Option<u8> {
        self.index.expansion_zoom(cluster_id)
    }

    /// GeoJSON for features projected from this snapshot.
    pub fn to_geojson(&self, features: &[ProjectedFeature]) -> Result<FeatureCollection> {
        features_to_geojson(features, &self.store)
    }

    fn project_hit(&self, hit: &IndexHit) -> ProjectedFeature {
        match *hit {
            IndexHit::Leaf { item } => ProjectedFeature::Point {
                item_id: self.item_id(item),
            },
            IndexHit::Cluster {
                id,
                lng,
                lat,
                count,
                representative,
            } => ProjectedFeature::Cluster {
                cluster_id: id,
                centroid_lat: lat,
                centroid_lon: lng,
                member_count: count,
                representative_item_id: self.item_id(representative),
            },
        }
    }

    fn item_id(&self, idx: usize) -> ItemId {
        // Leaves are store indices and `new` checked the sizes.
        self.store.items()[idx].id.clone()
    }
}
