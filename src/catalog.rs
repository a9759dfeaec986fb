//! Catalog providers: where items come from.

use crate::error::BoxError;
use async_trait::async_trait;
use clustermark_types::item::Item;
use std::path::PathBuf;

/// One-shot source of the item catalog. May be slow or fail; a failed fetch
/// is retried by issuing a new load.
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    async fn fetch_items(&self) -> Result<Vec<Item>, BoxError>;
}

/// Catalog backed by an in-memory list.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    items: Vec<Item>,
}

impl StaticCatalog {
    pub fn new(items: Vec<Item>) -> Self {
        Self { items }
    }
}

#[async_trait]
impl CatalogProvider for StaticCatalog {
    async fn fetch_items(&self) -> Result<Vec<Item>, BoxError> {
        Ok(self.items.clone())
    }
}

/// Catalog read from a JSON file holding an array of items.
#[derive(Debug, Clone)]
pub struct JsonCatalog {
    path: PathBuf,
}

impl JsonCatalog {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CatalogProvider for JsonCatalog {
    async fn fetch_items(&self) -> Result<Vec<Item>, BoxError> {
        let raw = tokio::fs::read(&self.path).await?;
        let items: Vec<Item> = serde_json::from_slice(&raw)?;
        log::debug!("read {} items from {}", items.len(), self.path.display());
        Ok(items)
    }
}
