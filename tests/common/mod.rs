#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use clustermark::{AssetError, BoxError, CatalogProvider, ImageAssetStore, Item, MemoryAssetStore};
use image::{Rgba, RgbaImage};
use parking_lot::Mutex;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn png(color: [u8; 4]) -> Vec<u8> {
    let img = RgbaImage::from_pixel(24, 24, Rgba(color));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

/// `rows * cols` items on a grid starting at (`lat`, `lng`), `step` degrees apart.
pub fn grid(prefix: &str, lat: f64, lng: f64, rows: usize, cols: usize, step: f64) -> Vec<Item> {
    let mut items = Vec::with_capacity(rows * cols);
    for row in 0..rows {
        for col in 0..cols {
            let id = format!("{}-{}", prefix, row * cols + col);
            items.push(Item::new(
                id.clone(),
                lat + row as f64 * step,
                lng + col as f64 * step,
                format!("{}.png", id),
            ));
        }
    }
    items
}

/// Asset store holding a PNG for each item.
pub fn assets_for(items: &[Item]) -> MemoryAssetStore {
    let store = MemoryAssetStore::new();
    for (i, item) in items.iter().enumerate() {
        let shade = (i * 37 % 200) as u8 + 30;
        store.insert(item.thumbnail_ref.clone(), png([shade, 90, 255 - shade, 255]));
    }
    store
}

/// Counts loads and delays those whose name starts with `slow_prefix`.
pub struct InstrumentedAssets {
    pub inner: MemoryAssetStore,
    pub slow_prefix: Option<String>,
    pub delay: Duration,
    pub loads: AtomicUsize,
}

impl InstrumentedAssets {
    pub fn new(inner: MemoryAssetStore) -> Self {
        Self {
            inner,
            slow_prefix: None,
            delay: Duration::ZERO,
            loads: AtomicUsize::new(0),
        }
    }

    pub fn slow(mut self, prefix: &str, delay: Duration) -> Self {
        self.slow_prefix = Some(prefix.to_string());
        self.delay = delay;
        self
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageAssetStore for InstrumentedAssets {
    async fn load(&self, name: &str) -> Result<Bytes, AssetError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if let Some(prefix) = &self.slow_prefix
            && name.starts_with(prefix.as_str())
        {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.load(name).await
    }
}

/// Catalog that fails its first `failures` fetches.
pub struct FlakyCatalog {
    pub items: Vec<Item>,
    pub failures: usize,
    pub calls: AtomicUsize,
}

impl FlakyCatalog {
    pub fn new(items: Vec<Item>, failures: usize) -> Self {
        Self {
            items,
            failures,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CatalogProvider for FlakyCatalog {
    async fn fetch_items(&self) -> Result<Vec<Item>, BoxError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err("catalog service unavailable".into());
        }
        Ok(self.items.clone())
    }
}

/// Catalog whose contents and availability can change between fetches.
///
/// A fetch takes its items when it starts; `first_delay` holds back the first
/// fetch only.
pub struct SwitchableCatalog {
    items: Mutex<Vec<Item>>,
    failing: AtomicBool,
    first_delay: Duration,
    pub calls: AtomicUsize,
}

impl SwitchableCatalog {
    pub fn new(items: Vec<Item>) -> Self {
        Self {
            items: Mutex::new(items),
            failing: AtomicBool::new(false),
            first_delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn delay_first(mut self, delay: Duration) -> Self {
        self.first_delay = delay;
        self
    }

    pub fn replace(&self, items: Vec<Item>) {
        *self.items.lock() = items;
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl CatalogProvider for SwitchableCatalog {
    async fn fetch_items(&self) -> Result<Vec<Item>, BoxError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err("catalog service unavailable".into());
        }
        let items = self.items.lock().clone();
        if call == 0 && !self.first_delay.is_zero() {
            tokio::time::sleep(self.first_delay).await;
        }
        Ok(items)
    }
}

/// Four items `x0..x3` along the equator whose thumbnails live under `version/`.
pub fn versioned(version: &str) -> Vec<Item> {
    (0..4)
        .map(|i| {
            Item::new(
                format!("x{}", i),
                0.0,
                i as f64,
                format!("{}/x{}.png", version, i),
            )
        })
        .collect()
}
