//! Validation for geographic coordinates, items and bounding boxes.

use crate::error::{ClusterError, Result};
use clustermark_types::bbox::BoundingBox2D;
use clustermark_types::item::Item;

/// What is wrong with a longitude/latitude pair, if anything.
fn coordinate_problem(lng: f64, lat: f64) -> Option<String> {
    if !lng.is_finite() || !lat.is_finite() {
        Some(format!("has a non-finite position ({}, {})", lng, lat))
    } else if !(-180.0..=180.0).contains(&lng) {
        Some(format!("has longitude {} outside [-180, 180]", lng))
    } else if !(-90.0..=90.0).contains(&lat) {
        Some(format!("has latitude {} outside [-90, 90]", lat))
    } else {
        None
    }
}

/// Validates an item's id, position and thumbnail reference.
///
/// Errors name the offending item.
///
/// # Examples
///
/// ```
/// use clustermark::compute::validation::validate_item;
/// use clustermark::Item;
///
/// assert!(validate_item(&Item::new("nyc", 40.7128, -74.0060, "nyc.png")).is_ok());
///
/// let err = validate_item(&Item::new("pole", 95.0, 0.0, "pole.png")).unwrap_err();
/// assert_eq!(
///     err.to_string(),
///     "invalid input: Item pole has latitude 95 outside [-90, 90]"
/// );
/// ```
pub fn validate_item(item: &Item) -> Result<()> {
    if item.id.as_str().is_empty() {
        return Err(ClusterError::InvalidInput(
            "Item id must not be empty".to_string(),
        ));
    }

    if let Some(problem) = coordinate_problem(item.longitude, item.latitude) {
        return Err(ClusterError::InvalidInput(format!(
            "Item {} {}",
            item.id, problem
        )));
    }

    if item.thumbnail_ref.is_empty() {
        return Err(ClusterError::InvalidInput(format!(
            "Item {} has an empty thumbnail reference",
            item.id
        )));
    }

    Ok(())
}

/// Validates a query bounding box.
///
/// Both corners must be valid geographic positions. A box that wraps the
/// antimeridian cannot be expressed and must be split by the caller.
///
/// # Examples
///
/// ```
/// use clustermark::compute::validation::validate_bbox;
/// use clustermark::BoundingBox2D;
///
/// assert!(validate_bbox(&BoundingBox2D::new(-10.0, -10.0, 10.0, 10.0)).is_ok());
/// assert!(validate_bbox(&BoundingBox2D::new(-190.0, -10.0, 10.0, 10.0)).is_err());
/// ```
pub fn validate_bbox(bbox: &BoundingBox2D) -> Result<()> {
    let corners = [
        ("south-west", bbox.min_x(), bbox.min_y()),
        ("north-east", bbox.max_x(), bbox.max_y()),
    ];
    for (corner, lng, lat) in corners {
        if let Some(problem) = coordinate_problem(lng, lat) {
            return Err(ClusterError::InvalidInput(format!(
                "Bounding box {} corner {}",
                corner, problem
            )));
        }
    }
    Ok(())
}

/// Validates a camera zoom level.
pub fn validate_zoom(zoom: f64) -> Result<()> {
    if !zoom.is_finite() || zoom < 0.0 {
        return Err(ClusterError::InvalidInput(format!(
            "Zoom must be finite and non-negative, got: {}",
            zoom
        )));
    }
    Ok(())
}
