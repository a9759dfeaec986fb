//! Concurrent marker assembly for one projection result.

use crate::config::Config;
use crate::error::RenderFailure;
use crate::projector::{ClusterProjector, ProjectedFeature};
use crate::render::{CacheKey, ImageSource, RenderedBitmap, ThumbnailCache};
use clustermark_types::item::MarkerId;
use futures::StreamExt;
use geo::Point;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// The externally published unit.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerRecord {
    pub id: MarkerId,
    /// x = longitude, y = latitude.
    pub position: Point,
    pub bitmap: RenderedBitmap,
    pub info_text: Option<String>,
}

pub type MarkerSet = FxHashMap<MarkerId, MarkerRecord>;

/// Result of one render call.
#[derive(Debug, Default)]
pub struct RenderOutcome {
    pub markers: MarkerSet,
    /// Features omitted from `markers`, with the reason.
    pub failures: Vec<(MarkerId, RenderFailure)>,
}

impl RenderOutcome {
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }
}

/// Renders projected features into marker records through the bitmap cache.
#[derive(Clone)]
pub struct MarkerRenderer {
    cache: Arc<ThumbnailCache>,
    thumbnail_size: u32,
    concurrency: usize,
}

impl MarkerRenderer {
    pub fn new(cache: Arc<ThumbnailCache>, config: &Config) -> Self {
        Self {
            cache,
            thumbnail_size: config.thumbnail_size,
            concurrency: config.render_concurrency.max(1),
        }
    }

    pub fn cache(&self) -> &Arc<ThumbnailCache> {
        &self.cache
    }

    /// Render every feature, at most `render_concurrency` at a time.
    ///
    /// Returns once each feature has produced a record or failed. Failures are
    /// isolated to their feature and listed in the outcome.
    pub async fn render(
        &self,
        projector: &ClusterProjector,
        features: Vec<ProjectedFeature>,
    ) -> RenderOutcome {
        let total = features.len();
        let results: Vec<(MarkerId, Result<MarkerRecord, RenderFailure>)> =
            futures::stream::iter(features)
                .map(|feature| async move {
                    let id = feature.marker_id();
                    let record = self.render_one(projector, feature).await;
                    (id, record)
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;

        let mut outcome = RenderOutcome::default();
        for (id, result) in results {
            match result {
                Ok(record) => {
                    outcome.markers.insert(id, record);
                }
                Err(failure) => outcome.failures.push((id, failure)),
            }
        }

        if !outcome.failures.is_empty() {
            log::warn!(
                "{} of {} markers failed to render",
                outcome.failures.len(),
                total
            );
        }
        outcome
    }

    async fn render_one(
        &self,
        projector: &ClusterProjector,
        feature: ProjectedFeature,
    ) -> Result<MarkerRecord, RenderFailure> {
        let item = projector
            .representative_item_of(&feature)
            .ok_or_else(|| RenderFailure::MissingItem(feature.thumbnail_item_id().clone()))?;

        let (key, position, info_text) = match &feature {
            ProjectedFeature::Point { .. } => (
                CacheKey::point(item.id.clone(), self.thumbnail_size),
                item.position(),
                item.label.clone(),
            ),
            ProjectedFeature::Cluster {
                centroid_lat,
                centroid_lon,
                member_count,
                ..
            } => (
                CacheKey::cluster(item.id.clone(), *member_count, self.thumbnail_size),
                Point::new(*centroid_lon, *centroid_lat),
                None,
            ),
        };

        let bitmap = self
            .cache
            .get_or_render_at(
                projector.epoch(),
                key,
                ImageSource::new(item.thumbnail_ref.clone()),
            )
            .await?;

        Ok(MarkerRecord {
            id: feature.marker_id(),
            position,
            bitmap,
            info_text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::spatial::SpatialIndex;
    use crate::render::{MemoryAssetStore, RenderSettings};
    use crate::store::PointStore;
    use clustermark_types::bbox::BoundingBox2D;
    use clustermark_types::item::{ClusterId, Item, ItemId};
    use image::{Rgba, RgbaImage};
    use std::io::Cursor;

    fn png() -> Vec<u8> {
        let img = RgbaImage::from_pixel(8, 8, Rgba([90, 120, 150, 255]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn setup(items: Vec<Item>, assets: &[&str]) -> (ClusterProjector, MarkerRenderer) {
        let config = Config::default().with_thumbnail_size(32);
        let store = Arc::new(PointStore::from_items(items).unwrap());
        let index = Arc::new(SpatialIndex::build(&store, &config));
        let projector = ClusterProjector::new(store, index).unwrap();

        let asset_store = MemoryAssetStore::new();
        for name in assets {
            asset_store.insert(*name, png());
        }
        let cache = Arc::new(ThumbnailCache::new(
            Arc::new(asset_store),
            RenderSettings::from_config(&config),
        ));
        (projector, MarkerRenderer::new(cache, &config))
    }

    #[tokio::test]
    async fn test_points_and_clusters_render() {
        let (projector, renderer) = setup(
            vec![
                Item::new("a", 50.0, 8.0, "a.png").with_label("Alpha"),
                Item::new("b", 50.0001, 8.0001, "b.png"),
                Item::new("c", -30.0, 120.0, "c.png"),
            ],
            &["a.png", "b.png", "c.png"],
        );

        let features = projector.query(&BoundingBox2D::world(), 5);
        assert_eq!(features.len(), 2);
        let outcome = renderer.render(&projector, features).await;
        assert_eq!(outcome.failure_count(), 0);
        assert_eq!(outcome.markers.len(), 2);

        let point = &outcome.markers[&MarkerId::Item(ItemId::new("c"))];
        assert_eq!(point.position, Point::new(120.0, -30.0));
        assert_eq!((point.bitmap.width, point.bitmap.height), (32, 32));

        let cluster = outcome
            .markers
            .values()
            .find(|record| record.id.is_cluster())
            .unwrap();
        assert!(cluster.info_text.is_none());

        let all = projector.query(&BoundingBox2D::world(), 21);
        let outcome = renderer.render(&projector, all).await;
        assert_eq!(
            outcome.markers[&MarkerId::Item(ItemId::new("a"))].info_text.as_deref(),
            Some("Alpha")
        );
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let (projector, renderer) = setup(
            vec![
                Item::new("ok", 10.0, 10.0, "ok.png"),
                Item::new("broken", -10.0, -10.0, "missing.png"),
            ],
            &["ok.png"],
        );

        let features = projector.query(&BoundingBox2D::world(), 21);
        let outcome = renderer.render(&projector, features).await;
        assert_eq!(outcome.markers.len(), 1);
        assert!(outcome.markers.contains_key(&MarkerId::Item(ItemId::new("ok"))));
        assert_eq!(
            outcome.failures,
            vec![(
                MarkerId::Item(ItemId::new("broken")),
                RenderFailure::AssetNotFound("missing.png".to_string())
            )]
        );
    }

    #[tokio::test]
    async fn test_unknown_representative_is_missing_item() {
        let (projector, renderer) = setup(vec![Item::new("a", 0.0, 0.0, "a.png")], &["a.png"]);
        let ghost = ProjectedFeature::Cluster {
            cluster_id: ClusterId::new(77),
            centroid_lat: 0.0,
            centroid_lon: 0.0,
            member_count: 4,
            representative_item_id: ItemId::new("ghost"),
        };

        let outcome = renderer.render(&projector, vec![ghost]).await;
        assert!(outcome.markers.is_empty());
        assert_eq!(
            outcome.failures[0].1,
            RenderFailure::MissingItem(ItemId::new("ghost"))
        );
    }

    #[tokio::test]
    async fn test_replaced_snapshot_does_not_fill_cache() {
        let (projector, renderer) = setup(vec![Item::new("a", 0.0, 0.0, "a.png")], &["a.png"]);
        let epoch = renderer.cache().clear();
        let features = projector.query(&BoundingBox2D::world(), 21);

        let outcome = renderer.render(&projector, features.clone()).await;
        assert_eq!(outcome.markers.len(), 1);
        assert!(renderer.cache().is_empty());

        let current = projector.with_epoch(epoch);
        let outcome = renderer.render(&current, features).await;
        assert_eq!(outcome.markers.len(), 1);
        assert_eq!(renderer.cache().len(), 1);
    }
}
