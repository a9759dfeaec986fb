//! Viewport controller: loads the catalog, tracks the camera and publishes
//! marker sets.
//!
//! ```text
//! Idle ──load──▶ Loading ──ok──▶ Ready ◀──movement_stopped── Moving
//!  ▲               │               │ ──movement_started──────▶ │
//!  └────failed─────┘               └── viewport_changed ───────┘
//! ```
//!
//! Every viewport change takes a new generation number. Results are published
//! through a `watch` channel only if their generation is still the latest, so
//! a slow render for an old viewport can never overwrite a newer one.
//!
//! Loads are ordered the same way: each `load` takes a token when it starts,
//! and a fetch that finishes after a newer load has started is discarded. The
//! installed snapshot carries the cache epoch of its load, so renders still
//! running for a replaced snapshot never populate the cache.

use crate::catalog::CatalogProvider;
use crate::compute::spatial::SpatialIndex;
use crate::compute::validation::{validate_bbox, validate_zoom};
use crate::config::Config;
use crate::error::{ClusterError, Result};
use crate::marker::{MarkerRenderer, MarkerSet, RenderOutcome};
use crate::projector::ClusterProjector;
use crate::store::PointStore;
use clustermark_types::bbox::BoundingBox2D;
use clustermark_types::item::{ItemId, MarkerId};
use geo::Point;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;

/// Visible region and camera zoom.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub bbox: BoundingBox2D,
    pub zoom: f64,
}

impl Viewport {
    pub fn new(bbox: BoundingBox2D, zoom: f64) -> Self {
        Self { bbox, zoom }
    }

    /// Integer zoom used for cluster queries.
    pub fn cluster_zoom(&self) -> i32 {
        self.zoom.floor() as i32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerState {
    Idle,
    Loading,
    Ready,
    Moving,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TapKind {
    Cluster,
    Point,
}

/// A tap on a published marker, as reported by the map view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TapEvent {
    pub kind: TapKind,
    pub id: MarkerId,
}

impl TapEvent {
    pub fn on(id: MarkerId) -> Self {
        let kind = if id.is_cluster() {
            TapKind::Cluster
        } else {
            TapKind::Point
        };
        Self { kind, id }
    }
}

/// Outward notification decided by the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    /// Ask the camera to zoom in on a cluster.
    ZoomIn { center: Point, zoom: f64 },
    /// Ask the host to show an item's details.
    ShowDetail {
        item_id: ItemId,
        label: Option<String>,
    },
}

/// One published, internally consistent marker set.
#[derive(Debug, Clone, Default)]
pub struct MarkerSnapshot {
    /// Generation of the viewport change that produced it; 0 before the first.
    pub generation: u64,
    pub viewport: Option<Viewport>,
    pub markers: MarkerSet,
    /// Features that failed to render and are missing from `markers`.
    pub failed: usize,
}

/// Outcome of a viewport change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Publish {
    Published,
    /// A newer viewport change or load overtook this one; its result was dropped.
    Superseded,
    /// No catalog is loaded yet.
    NotReady,
}

/// Result of a `load` call that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The fetched catalog is now the current snapshot.
    Installed { items: usize },
    /// A newer `load` started before this one finished; its catalog was dropped.
    Superseded,
}

/// Drives projection and rendering from camera events.
pub struct ViewportController {
    config: Config,
    catalog: Arc<dyn CatalogProvider>,
    renderer: MarkerRenderer,
    state: Mutex<ControllerState>,
    projector: RwLock<Option<Arc<ClusterProjector>>>,
    viewport: Mutex<Option<Viewport>>,
    generation: AtomicU64,
    /// Token of the most recently started load.
    load_token: AtomicU64,
    markers: watch::Sender<Arc<MarkerSnapshot>>,
    zoom: watch::Sender<f64>,
}

impl ViewportController {
    /// Create a controller; prefer `ControllerBuilder`, which validates the config.
    pub fn new(config: Config, catalog: Arc<dyn CatalogProvider>, renderer: MarkerRenderer) -> Self {
        let (markers, _) = watch::channel(Arc::new(MarkerSnapshot::default()));
        let (zoom, _) = watch::channel(f64::from(config.min_zoom));

        Self {
            config,
            catalog,
            renderer,
            state: Mutex::new(ControllerState::Idle),
            projector: RwLock::new(None),
            viewport: Mutex::new(None),
            generation: AtomicU64::new(0),
            load_token: AtomicU64::new(0),
            markers,
            zoom,
        }
    }

    pub fn builder(
        catalog: Arc<dyn CatalogProvider>,
        assets: Arc<dyn crate::render::ImageAssetStore>,
    ) -> crate::builder::ControllerBuilder {
        crate::builder::ControllerBuilder::new(catalog, assets)
    }

    /// Fetch the catalog, rebuild the index and publish the first marker set.
    ///
    /// Overlapping calls resolve in start order: only the most recently
    /// started load installs its catalog. On failure the controller returns to
    /// the state it had before the call, and the load can be retried.
    pub async fn load(&self) -> Result<LoadOutcome> {
        let token = self.load_token.fetch_add(1, Ordering::SeqCst) + 1;
        let previous = std::mem::replace(&mut *self.state.lock(), ControllerState::Loading);
        self.generation.fetch_add(1, Ordering::SeqCst);

        let projector = match self.fetch_and_build().await {
            Ok(projector) => projector,
            Err(e) => {
                log::warn!("catalog load failed: {}", e);
                if self.load_token.load(Ordering::SeqCst) == token {
                    *self.state.lock() = self.restored_state(previous);
                }
                return Err(e);
            }
        };

        let count = projector.store().len();
        let bounds = projector.store().bounds();
        {
            let mut installed = self.projector.write();
            if self.load_token.load(Ordering::SeqCst) != token {
                log::debug!("dropping catalog load {}: a newer load started", token);
                return Ok(LoadOutcome::Superseded);
            }
            let epoch = self.renderer.cache().clear();
            *installed = Some(Arc::new(projector.with_epoch(epoch)));
            *self.state.lock() = ControllerState::Ready;
        }
        log::debug!("catalog loaded: {} items", count);

        let viewport = self.current_viewport().unwrap_or_else(|| {
            Viewport::new(
                bounds.unwrap_or_else(BoundingBox2D::world),
                f64::from(self.config.min_zoom),
            )
        });
        self.viewport_changed(viewport).await?;

        Ok(LoadOutcome::Installed { items: count })
    }

    /// Re-project and re-render for a new camera position.
    pub async fn viewport_changed(&self, viewport: Viewport) -> Result<Publish> {
        validate_bbox(&viewport.bbox)?;
        validate_zoom(viewport.zoom)?;

        *self.viewport.lock() = Some(viewport);
        self.zoom.send_replace(viewport.zoom);

        self.render_viewport(viewport).await
    }

    pub fn movement_started(&self) {
        let mut state = self.state.lock();
        if *state == ControllerState::Ready {
            *state = ControllerState::Moving;
        }
    }

    /// Leave `Moving` and render the last viewport without waiting for the
    /// debounce.
    pub async fn movement_stopped(&self) -> Result<Publish> {
        {
            let mut state = self.state.lock();
            if *state != ControllerState::Moving {
                return Ok(Publish::NotReady);
            }
            *state = ControllerState::Ready;
        }

        match self.current_viewport() {
            Some(viewport) => self.render_viewport(viewport).await,
            None => Ok(Publish::NotReady),
        }
    }

    /// Decide what a tap on a published marker means.
    ///
    /// Returns `None` for markers that are not part of the current snapshot.
    pub fn handle_tap(&self, event: &TapEvent) -> Option<Intent> {
        match (event.kind, &event.id) {
            (TapKind::Cluster, MarkerId::Cluster(_)) => {
                let snapshot = self.markers.borrow().clone();
                let record = snapshot.markers.get(&event.id)?;
                let current = self
                    .current_viewport()
                    .map_or(f64::from(self.config.min_zoom), |v| v.zoom);
                let zoom = (current + self.config.zoom_increment_on_cluster_tap)
                    .min(f64::from(self.config.max_zoom));
                Some(Intent::ZoomIn {
                    center: record.position,
                    zoom,
                })
            }
            (TapKind::Point, MarkerId::Item(item_id)) => {
                let projector = self.projector()?;
                let item = projector.store().get(item_id)?;
                Some(Intent::ShowDetail {
                    item_id: item.id.clone(),
                    label: item.label.clone(),
                })
            }
            _ => None,
        }
    }

    pub fn subscribe_markers(&self) -> watch::Receiver<Arc<MarkerSnapshot>> {
        self.markers.subscribe()
    }

    pub fn subscribe_zoom(&self) -> watch::Receiver<f64> {
        self.zoom.subscribe()
    }

    /// Latest published marker set.
    pub fn markers(&self) -> Arc<MarkerSnapshot> {
        self.markers.borrow().clone()
    }

    pub fn state(&self) -> ControllerState {
        *self.state.lock()
    }

    pub fn current_viewport(&self) -> Option<Viewport> {
        *self.viewport.lock()
    }

    pub fn projector(&self) -> Option<Arc<ClusterProjector>> {
        self.projector.read().clone()
    }

    pub fn renderer(&self) -> &MarkerRenderer {
        &self.renderer
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// State to fall back to after a failed load that started in `previous`.
    fn restored_state(&self, previous: ControllerState) -> ControllerState {
        match previous {
            ControllerState::Loading if self.projector.read().is_some() => ControllerState::Ready,
            ControllerState::Loading => ControllerState::Idle,
            other => other,
        }
    }

    async fn fetch_and_build(&self) -> Result<ClusterProjector> {
        let items = self
            .catalog
            .fetch_items()
            .await
            .map_err(ClusterError::CatalogFetch)?;

        let config = self.config.clone();
        tokio::task::spawn_blocking(move || {
            let store = Arc::new(PointStore::from_items(items)?);
            let index = Arc::new(SpatialIndex::build(&store, &config));
            ClusterProjector::new(store, index)
        })
        .await?
    }

    async fn render_viewport(&self, viewport: Viewport) -> Result<Publish> {
        let state = self.state();
        if !matches!(state, ControllerState::Ready | ControllerState::Moving) {
            return Ok(Publish::NotReady);
        }
        let Some(projector) = self.projector() else {
            return Ok(Publish::NotReady);
        };

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let debounce = self.config.debounce();
        if state == ControllerState::Moving && !debounce.is_zero() {
            tokio::time::sleep(debounce).await;
            if self.generation.load(Ordering::SeqCst) != generation {
                return Ok(Publish::Superseded);
            }
        }

        let features = projector.query(&viewport.bbox, viewport.cluster_zoom());
        let outcome = self.renderer.render(&projector, features).await;

        Ok(self.publish(generation, viewport, outcome))
    }

    fn publish(&self, generation: u64, viewport: Viewport, outcome: RenderOutcome) -> Publish {
        let published = self.markers.send_if_modified(|current| {
            let latest = self.generation.load(Ordering::SeqCst);
            if latest != generation || current.generation >= generation {
                return false;
            }
            *current = Arc::new(MarkerSnapshot {
                generation,
                viewport: Some(viewport),
                failed: outcome.failures.len(),
                markers: outcome.markers,
            });
            true
        });

        if published {
            Publish::Published
        } else {
            log::debug!("dropping superseded render of generation {}", generation);
            Publish::Superseded
        }
    }
}
