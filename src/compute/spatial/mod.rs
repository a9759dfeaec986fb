pub mod index;
pub mod projection;

pub use index::{IndexHit, SpatialIndex};
