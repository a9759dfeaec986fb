//! Content-addressed cache of rendered marker bitmaps.
//!
//! A miss starts one render per `CacheKey`; later callers for the same key
//! await the same shared future instead of starting another. Completed
//! renders are stored, failed ones are forgotten so a later call can retry
//! (for example once a missing asset has been added).
//!
//! Every `clear` starts a new epoch. Callers rendering for a snapshot pass the
//! epoch it was installed under; a render requested for an older epoch is
//! still served to its caller but never stored, so bitmaps from a replaced
//! catalog cannot shadow the current one under the same key.
//!
//! The slot table sits behind a `parking_lot::Mutex` that is only taken for
//! map lookups and never held across an `.await`.

use super::asset::ImageAssetStore;
use super::pipeline::{RenderKind, RenderSettings, RenderedBitmap, render_bitmap};
use crate::error::RenderFailure;
use clustermark_types::item::ItemId;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

type RenderResult = Result<RenderedBitmap, RenderFailure>;
type PendingRender = Shared<BoxFuture<'static, RenderResult>>;

/// Identity of a rendered bitmap.
///
/// For clusters `subject` is the representative item and the member count is
/// part of `kind`, because the badge changes the pixels.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub subject: ItemId,
    pub kind: RenderKind,
    pub width: u32,
    pub height: u32,
}

impl CacheKey {
    pub fn point(subject: ItemId, size: u32) -> Self {
        Self {
            subject,
            kind: RenderKind::Point,
            width: size,
            height: size,
        }
    }

    pub fn cluster(subject: ItemId, member_count: usize, size: u32) -> Self {
        Self {
            subject,
            kind: RenderKind::Cluster { member_count },
            width: size,
            height: size,
        }
    }
}

/// Where the pixels for a key come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSource {
    /// Asset name, i.e. the subject item's `thumbnail_ref`.
    pub asset: String,
}

impl ImageSource {
    pub fn new(asset: impl Into<String>) -> Self {
        Self {
            asset: asset.into(),
        }
    }
}

enum Slot {
    Ready(RenderedBitmap),
    Pending(PendingRender),
}

#[derive(Default)]
struct Slots {
    epoch: u64,
    map: FxHashMap<CacheKey, Slot>,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    renders: AtomicU64,
    failures: AtomicU64,
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from a stored bitmap.
    pub hits: u64,
    /// Lookups that started a render.
    pub misses: u64,
    /// Renders actually executed.
    pub renders: u64,
    pub failures: u64,
    /// Ready plus in-flight entries.
    pub entries: usize,
}

/// Bitmap cache with single-flight rendering per key.
///
/// Unbounded: entries live until `clear` or `invalidate_subject`. The number
/// of distinct keys is bounded by items times the distinct cluster sizes seen.
pub struct ThumbnailCache {
    assets: Arc<dyn ImageAssetStore>,
    settings: RenderSettings,
    slots: Mutex<Slots>,
    counters: Arc<Counters>,
}

impl ThumbnailCache {
    pub fn new(assets: Arc<dyn ImageAssetStore>, settings: RenderSettings) -> Self {
        Self {
            assets,
            settings,
            slots: Mutex::new(Slots::default()),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Return the bitmap for `key`, rendering it from `source` on a miss.
    ///
    /// Concurrent callers with the same key share one render and receive the
    /// same result. Renders under the current epoch.
    pub async fn get_or_render(&self, key: CacheKey, source: ImageSource) -> RenderResult {
        let epoch = self.epoch();
        self.get_or_render_at(epoch, key, source).await
    }

    /// Like `get_or_render`, for a caller working on data from `epoch`.
    ///
    /// If the cache has been cleared since, the bitmap is rendered for this
    /// caller alone and neither read from nor written to the cache.
    pub async fn get_or_render_at(
        &self,
        epoch: u64,
        key: CacheKey,
        source: ImageSource,
    ) -> RenderResult {
        let pending = {
            let mut slots = self.slots.lock();
            if epoch < slots.epoch {
                drop(slots);
                log::debug!("rendering {:?} outside the cache: epoch {} is stale", key, epoch);
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                Err(self.start_render(&key, source))
            } else {
                match slots.map.get(&key) {
                    Some(Slot::Ready(bitmap)) => {
                        self.counters.hits.fetch_add(1, Ordering::Relaxed);
                        return Ok(bitmap.clone());
                    }
                    Some(Slot::Pending(pending)) => Ok(pending.clone()),
                    None => {
                        self.counters.misses.fetch_add(1, Ordering::Relaxed);
                        let pending = self.start_render(&key, source);
                        slots.map.insert(key.clone(), Slot::Pending(pending.clone()));
                        Ok(pending)
                    }
                }
            }
        };
        // The slots guard must be out of scope before awaiting (it is !Send).
        let pending = match pending {
            Ok(pending) => pending,
            Err(uncached) => return uncached.await,
        };

        let result = pending.clone().await;
        self.settle(&key, &pending, &result);
        result
    }

    /// Stored bitmap for `key`, without rendering.
    pub fn get(&self, key: &CacheKey) -> Option<RenderedBitmap> {
        match self.slots.lock().map.get(key) {
            Some(Slot::Ready(bitmap)) => Some(bitmap.clone()),
            _ => None,
        }
    }

    /// Drop every entry rendered from `subject`, including in-flight ones.
    ///
    /// Callers already awaiting an in-flight render still receive it, but it
    /// is not stored.
    pub fn invalidate_subject(&self, subject: &ItemId) -> usize {
        let mut slots = self.slots.lock();
        let before = slots.map.len();
        slots.map.retain(|key, _| &key.subject != subject);
        before - slots.map.len()
    }

    /// Drop every entry and start a new epoch, which is returned.
    pub fn clear(&self) -> u64 {
        let mut slots = self.slots.lock();
        slots.map.clear();
        slots.epoch += 1;
        slots.epoch
    }

    /// Epoch of the entries currently stored.
    pub fn epoch(&self) -> u64 {
        self.slots.lock().epoch
    }

    pub fn len(&self) -> usize {
        self.slots.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().map.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            renders: self.counters.renders.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }

    fn start_render(&self, key: &CacheKey, source: ImageSource) -> PendingRender {
        let assets = Arc::clone(&self.assets);
        let counters = Arc::clone(&self.counters);
        let settings = self.settings;
        let (kind, width, height) = (key.kind, key.width, key.height);

        async move {
            counters.renders.fetch_add(1, Ordering::Relaxed);
            let result = render_from(assets, source, kind, width, height, settings).await;
            if let Err(failure) = &result {
                counters.failures.fetch_add(1, Ordering::Relaxed);
                log::warn!("marker render failed: {}", failure);
            }
            result
        }
        .boxed()
        .shared()
    }

    /// Replace the pending slot of `key` with its outcome, unless the slot was
    /// invalidated or replaced meanwhile.
    fn settle(&self, key: &CacheKey, pending: &PendingRender, result: &RenderResult) {
        let mut slots = self.slots.lock();
        let still_ours = matches!(
            slots.map.get(key),
            Some(Slot::Pending(current)) if current.ptr_eq(pending)
        );
        if !still_ours {
            return;
        }

        match result {
            Ok(bitmap) => {
                slots.map.insert(key.clone(), Slot::Ready(bitmap.clone()));
            }
            Err(_) => {
                slots.map.remove(key);
            }
        }
    }
}

async fn render_from(
    assets: Arc<dyn ImageAssetStore>,
    source: ImageSource,
    kind: RenderKind,
    width: u32,
    height: u32,
    settings: RenderSettings,
) -> RenderResult {
    let raw = assets.load(&source.asset).await?;
    let asset = source.asset;

    tokio::task::spawn_blocking(move || render_bitmap(&asset, &raw, kind, width, height, settings))
        .await
        .map_err(|e| RenderFailure::Worker(e.to_string()))?
}
