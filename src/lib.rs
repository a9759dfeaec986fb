//! Zoom-dependent clustering of geo-located items into thumbnail markers.
//!
//! ```rust
//! use clustermark::{BoundingBox2D, ClusterProjector, Config, Item, PointStore, SpatialIndex};
//! use std::sync::Arc;
//!
//! let store = Arc::new(PointStore::from_items(vec![
//!     Item::new("a", 52.5200, 13.4050, "a.png"),
//!     Item::new("b", 52.5201, 13.4051, "b.png"),
//!     Item::new("c", 48.8566, 2.3522, "c.png"),
//! ])?);
//! let index = Arc::new(SpatialIndex::build(&store, &Config::default()));
//! let projector = ClusterProjector::new(store, index)?;
//!
//! let features = projector.query(&BoundingBox2D::world(), 4);
//! assert_eq!(features.iter().map(|f| f.member_count()).sum::<usize>(), 3);
//! # Ok::<(), clustermark::ClusterError>(())
//! ```

pub mod builder;
pub mod catalog;
pub mod compute;
pub mod config;
pub mod error;
pub mod marker;
pub mod projector;
pub mod render;
pub mod store;
pub mod viewport;

pub use builder::ControllerBuilder;
pub use catalog::{CatalogProvider, JsonCatalog, StaticCatalog};
pub use compute::spatial::{IndexHit, SpatialIndex};
pub use config::Config;
pub use error::{AssetError, BoxError, ClusterError, RenderFailure, Result};
pub use marker::{MarkerRecord, MarkerRenderer, MarkerSet, RenderOutcome};
pub use projector::{ClusterProjector, ProjectedFeature};
pub use render::{
    CacheKey, CacheStats, DirAssetStore, ImageAssetStore, ImageSource, MemoryAssetStore,
    RenderKind, RenderSettings, RenderedBitmap, ThumbnailCache,
};
pub use store::PointStore;
pub use viewport::{
    ControllerState, Intent, LoadOutcome, MarkerSnapshot, Publish, TapEvent, TapKind, Viewport,
    ViewportController,
};

pub use clustermark_types::bbox::BoundingBox2D;
pub use clustermark_types::item::{ClusterId, Item, ItemId, MarkerId};

pub use geo::Point;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {

    pub use crate::{ClusterError, ControllerBuilder, Result, ViewportController};

    pub use crate::{BoundingBox2D, Item, ItemId, MarkerId, Point};

    pub use crate::{ClusterProjector, PointStore, ProjectedFeature, SpatialIndex};

    pub use crate::{CatalogProvider, Config, ImageAssetStore, StaticCatalog};

    pub use crate::{Intent, LoadOutcome, MarkerSnapshot, Publish, TapEvent, Viewport};

    pub use std::time::Duration;
}
