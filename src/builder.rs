//! Controller builder
//!
//! Wires a catalog provider and an asset store into a `ViewportController`
//! with a shared bitmap cache.

use crate::catalog::CatalogProvider;
use crate::config::Config;
use crate::error::{ClusterError, Result};
use crate::marker::MarkerRenderer;
use crate::render::{ImageAssetStore, RenderSettings, ThumbnailCache};
use crate::viewport::ViewportController;
use std::sync::Arc;
use std::time::Duration;

/// Builder for a viewport controller.
pub struct ControllerBuilder {
    catalog: Arc<dyn CatalogProvider>,
    assets: Arc<dyn ImageAssetStore>,
    cache: Option<Arc<ThumbnailCache>>,
    config: Config,
}

impl ControllerBuilder {
    pub fn new(catalog: Arc<dyn CatalogProvider>, assets: Arc<dyn ImageAssetStore>) -> Self {
        Self {
            catalog,
            assets,
            cache: None,
            config: Config::default(),
        }
    }

    /// Set the clustering and rendering configuration.
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Share an existing bitmap cache instead of creating one.
    ///
    /// The cache is cleared on every load, so it should not be shared with a
    /// controller over a different catalog.
    pub fn cache(mut self, cache: Arc<ThumbnailCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn debounce(mut self, debounce: Duration) -> Self {
        self.config = self.config.with_debounce(debounce);
        self
    }

    /// Build the controller. Fails if the configuration is invalid.
    pub fn build(self) -> Result<ViewportController> {
        self.config.validate().map_err(ClusterError::InvalidConfig)?;

        let cache = self.cache.unwrap_or_else(|| {
            Arc::new(ThumbnailCache::new(
                self.assets,
                RenderSettings::from_config(&self.config),
            ))
        });
        let renderer = MarkerRenderer::new(cache, &self.config);

        Ok(ViewportController::new(self.config, self.catalog, renderer))
    }
}
