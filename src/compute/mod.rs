//! Spatial clustering, projection math, validation and GeoJSON conversion.

pub mod geojson;
pub mod spatial;
pub mod validation;
