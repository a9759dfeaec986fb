//! Image asset stores: where thumbnails come from.

use crate::error::AssetError;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

/// Source of raw encoded thumbnail bytes, addressed by `Item::thumbnail_ref`.
#[async_trait]
pub trait ImageAssetStore: Send + Sync {
    async fn load(&self, name: &str) -> Result<Bytes, AssetError>;
}

/// In-memory asset store.
#[derive(Default)]
pub struct MemoryAssetStore {
    assets: RwLock<FxHashMap<String, Bytes>>,
}

impl MemoryAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, name: impl Into<String>, bytes: impl Into<Bytes>) {
        self.assets.write().insert(name.into(), bytes.into());
    }

    pub fn remove(&self, name: &str) -> Option<Bytes> {
        self.assets.write().remove(name)
    }

    pub fn len(&self) -> usize {
        self.assets.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.read().is_empty()
    }
}

#[async_trait]
impl ImageAssetStore for MemoryAssetStore {
    async fn load(&self, name: &str) -> Result<Bytes, AssetError> {
        self.assets
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| AssetError::NotFound(name.to_string()))
    }
}

/// Asset store reading files below a root directory.
///
/// Names are relative paths; names that would escape the root resolve to
/// `NotFound`.
#[derive(Debug, Clone)]
pub struct DirAssetStore {
    root: PathBuf,
}

impl DirAssetStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, name: &str) -> Option<PathBuf> {
        let relative = Path::new(name);
        let confined = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        (confined && !name.is_empty()).then(|| self.root.join(relative))
    }
}

#[async_trait]
impl ImageAssetStore for DirAssetStore {
    async fn load(&self, name: &str) -> Result<Bytes, AssetError> {
        let Some(path) = self.resolve(name) else {
            return Err(AssetError::NotFound(name.to_string()));
        };

        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Bytes::from(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(AssetError::NotFound(name.to_string()))
            }
            Err(e) => Err(AssetError::Io {
                name: name.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}
