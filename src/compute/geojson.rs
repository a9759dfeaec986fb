//! GeoJSON conversion for projected features.

use crate::error::{ClusterError, Result};
use crate::projector::{ProjectedFeature, abbreviate_count};
use crate::store::PointStore;
use geojson::feature::Id;
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};
use serde_json::json;

/// Converts projected features into a `FeatureCollection`.
///
/// Clusters carry `cluster`, `cluster_id`, `point_count` and
/// `point_count_abbreviated`; points carry `item_id`, `label` and
/// `thumbnail_ref`. Points whose item is not in `store` are an error.
pub fn features_to_geojson(
    features: &[ProjectedFeature],
    store: &PointStore,
) -> Result<FeatureCollection> {
    let mut out = Vec::with_capacity(features.len());

    for feature in features {
        let mut properties = JsonObject::new();
        let (id, coordinates) = match feature {
            ProjectedFeature::Point { item_id } => {
                let item = store.get(item_id).ok_or_else(|| {
                    ClusterError::InvalidInput(format!("Item {} is not in the store", item_id))
                })?;
                properties.insert("cluster".into(), json!(false));
                properties.insert("item_id".into(), json!(item.id.as_str()));
                properties.insert("label".into(), json!(item.label));
                properties.insert("thumbnail_ref".into(), json!(item.thumbnail_ref));
                (
                    Id::String(feature.marker_id().to_string()),
                    vec![item.longitude, item.latitude],
                )
            }
            ProjectedFeature::Cluster {
                cluster_id,
                centroid_lat,
                centroid_lon,
                member_count,
                representative_item_id,
            } => {
                properties.insert("cluster".into(), json!(true));
                properties.insert("cluster_id".into(), json!(cluster_id.raw()));
                properties.insert("point_count".into(), json!(member_count));
                properties.insert(
                    "point_count_abbreviated".into(),
                    json!(abbreviate_count(*member_count)),
                );
                properties.insert(
                    "representative_item_id".into(),
                    json!(representative_item_id.as_str()),
                );
                (
                    Id::String(feature.marker_id().to_string()),
                    vec![*centroid_lon, *centroid_lat],
                )
            }
        };

        out.push(Feature {
            bbox: None,
            geometry: Some(Geometry::new(Value::Point(coordinates))),
            id: Some(id),
            properties: Some(properties),
            foreign_members: None,
        });
    }

    Ok(FeatureCollection {
        bbox: None,
        features: out,
        foreign_members: None,
    })
}

/// Serializes projected features to a GeoJSON string.
pub fn features_to_geojson_string(
    features: &[ProjectedFeature],
    store: &PointStore,
) -> Result<String> {
    let collection = features_to_geojson(features, store)?;
    serde_json::to_string(&collection).map_err(|e| {
        ClusterError::Serialization(format!("Failed to serialize feature collection: {}", e))
    })
}
