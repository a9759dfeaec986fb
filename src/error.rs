//! Error types for clustermark.
//!
//! `ClusterError` covers catalog loads, configuration and index construction.
//! `RenderFailure` is local to one marker and never aborts a render batch.

use clustermark_types::item::ItemId;
use thiserror::Error;

/// Boxed error returned by external collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub type Result<T> = std::result::Result<T, ClusterError>;

#[derive(Debug, Error)]
pub enum ClusterError {
    /// The catalog provider failed; retry by issuing a new load.
    #[error("catalog fetch failed: {0}")]
    CatalogFetch(#[source] BoxError),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("duplicate item id: {0}")]
    DuplicateItem(ItemId),

    #[error("index was built over {index} items but the store holds {store}")]
    IndexMismatch { index: usize, store: usize },

    #[error("background worker failed: {0}")]
    Worker(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for ClusterError {
    fn from(err: serde_json::Error) -> Self {
        ClusterError::Serialization(err.to_string())
    }
}

impl From<tokio::task::JoinError> for ClusterError {
    fn from(err: tokio::task::JoinError) -> Self {
        ClusterError::Worker(err.to_string())
    }
}

/// Failure to produce the bitmap of a single marker.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderFailure {
    #[error("asset not found: {0}")]
    AssetNotFound(String),

    #[error("asset {name} unavailable: {reason}")]
    AssetUnavailable { name: String, reason: String },

    #[error("failed to decode {name}: {reason}")]
    Decode { name: String, reason: String },

    #[error("failed to encode bitmap: {0}")]
    Encode(String),

    /// The item behind a point or a cluster's representative is not in the store.
    #[error("item {0} is not in the point store")]
    MissingItem(ItemId),

    #[error("render worker failed: {0}")]
    Worker(String),
}

/// Failure reported by an image asset store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssetError {
    #[error("asset not found: {0}")]
    NotFound(String),

    #[error("i/o error reading {name}: {reason}")]
    Io { name: String, reason: String },
}

impl From<AssetError> for RenderFailure {
    fn from(err: AssetError) -> Self {
        match err {
            AssetError::NotFound(name) => RenderFailure::AssetNotFound(name),
            AssetError::Io { name, reason } => RenderFailure::AssetUnavailable { name, reason },
        }
    }
}
