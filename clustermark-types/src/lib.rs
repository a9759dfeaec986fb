//! # clustermark-types
//!
//! Core data types shared by the clustermark engine.
//!
//! - **Items**: `Item`, the immutable geo-tagged record the engine clusters
//! - **Identifiers**: `ItemId`, `ClusterId` and the tagged `MarkerId`
//! - **Bounding boxes**: `BoundingBox2D`, a lon/lat box over `geo::Rect`
//!
//! All types are serializable with Serde.
//!
//! ## Examples
//!
//! ```rust
//! use clustermark_types::bbox::BoundingBox2D;
//! use clustermark_types::item::Item;
//!
//! let cafe = Item::new("cafe-1", 52.5200, 13.4050, "cafe.png").with_label("Corner Cafe");
//! let berlin = BoundingBox2D::new(13.0, 52.3, 13.8, 52.7);
//! assert!(berlin.contains_point(&cafe.position()));
//! ```

pub mod bbox;
pub mod item;
