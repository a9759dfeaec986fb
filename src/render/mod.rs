//! Marker bitmap production: asset stores, the image pipeline and the cache.

pub mod asset;
pub mod cache;
pub mod glyphs;
pub mod pipeline;

pub use asset::{DirAssetStore, ImageAssetStore, MemoryAssetStore};
pub use cache::{CacheKey, CacheStats, ImageSource, ThumbnailCache};
pub use pipeline::{RenderKind, RenderSettings, RenderedBitmap};
