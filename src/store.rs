//! Immutable snapshot of the displayable items.

use crate::compute::validation::validate_item;
use crate::error::{ClusterError, Result};
use clustermark_types::bbox::BoundingBox2D;
use clustermark_types::item::{Item, ItemId};
use rustc_hash::FxHashMap;

/// Authoritative set of items for one catalog load.
///
/// Built once from a catalog batch and never mutated; a changed catalog means a
/// new store (and a new spatial index).
#[derive(Debug, Default)]
pub struct PointStore {
    items: Vec<Item>,
    by_id: FxHashMap<ItemId, usize>,
}

impl PointStore {
    /// Build a store, validating every item and rejecting duplicate ids.
    pub fn from_items(items: Vec<Item>) -> Result<Self> {
        let mut by_id = FxHashMap::with_capacity_and_hasher(items.len(), Default::default());

        for (idx, item) in items.iter().enumerate() {
            validate_item(item)?;
            if by_id.insert(item.id.clone(), idx).is_some() {
                return Err(ClusterError::DuplicateItem(item.id.clone()));
            }
        }

        Ok(Self { items, by_id })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &ItemId) -> Option<&Item> {
        self.by_id.get(id).map(|&idx| &self.items[idx])
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.by_id.contains_key(id)
    }

    /// Item at a dense index, as referenced by spatial index leaves.
    pub fn item_at(&self, idx: usize) -> Option<&Item> {
        self.items.get(idx)
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Bounding box of all item positions.
    pub fn bounds(&self) -> Option<BoundingBox2D> {
        BoundingBox2D::from_points(self.items.iter().map(Item::position))
    }
}
