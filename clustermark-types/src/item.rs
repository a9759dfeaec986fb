use geo::Point;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a catalog item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ItemId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Identifier of a cluster node inside one built spatial index.
///
/// Stable for identical queries against the same index; meaningless across
/// rebuilds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterId(u32);

impl ClusterId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Key of a published marker.
///
/// Items and clusters live in separate namespaces, so a cluster can never
/// shadow an item whose id happens to look numeric.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum MarkerId {
    Item(ItemId),
    Cluster(ClusterId),
}

impl MarkerId {
    pub fn is_cluster(&self) -> bool {
        matches!(self, MarkerId::Cluster(_))
    }
}

impl fmt::Display for MarkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkerId::Item(id) => write!(f, "item:{id}"),
            MarkerId::Cluster(id) => write!(f, "cluster:{id}"),
        }
    }
}

/// A displayable geo-tagged catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Name of the thumbnail asset in the image asset store.
    pub thumbnail_ref: String,
}

impl Item {
    /// Create an item without a label.
    ///
    /// # Examples
    ///
    /// ```
    /// use clustermark_types::item::Item;
    ///
    /// let item = Item::new("museum", 48.8606, 2.3376, "louvre.jpg");
    /// assert_eq!(item.id.as_str(), "museum");
    /// assert!(item.label.is_none());
    /// ```
    pub fn new(
        id: impl Into<ItemId>,
        latitude: f64,
        longitude: f64,
        thumbnail_ref: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            latitude,
            longitude,
            label: None,
            thumbnail_ref: thumbnail_ref.into(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Position as a `geo::Point` (x = longitude, y = latitude).
    pub fn position(&self) -> Point {
        Point::new(self.longitude, self.latitude)
    }
}
