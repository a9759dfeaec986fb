//! Clustering and rendering configuration.
//!
//! Serializable so it can be loaded from JSON, or TOML with the `toml` feature.
use serde::de::Error;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Engine configuration.
///
/// # Example
///
/// ```rust
/// use clustermark::Config;
///
/// let config = Config::default();
/// assert_eq!(config.max_zoom, 21);
///
/// let json = r#"{
///     "max_zoom": 18,
///     "cluster_radius_px": 80,
///     "thumbnail_size": 48
/// }"#;
/// let config = Config::from_json(json).unwrap();
/// assert_eq!(config.cluster_radius_px, 80);
/// assert_eq!(config.min_zoom, 0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "Config::default_min_zoom")]
    pub min_zoom: u8,

    /// Zoom at which every item is shown as its own point.
    #[serde(default = "Config::default_max_zoom")]
    pub max_zoom: u8,

    /// Cluster radius in screen pixels at the level being built.
    #[serde(default = "Config::default_cluster_radius_px")]
    pub cluster_radius_px: u32,

    /// Pixel extent of one tile; together with the radius this sets how
    /// aggressively points merge.
    #[serde(default = "Config::default_tile_extent")]
    pub tile_extent: u32,

    /// Edge of the square marker bitmap in pixels.
    #[serde(default = "Config::default_thumbnail_size")]
    pub thumbnail_size: u32,

    #[serde(default = "Config::default_zoom_increment")]
    pub zoom_increment_on_cluster_tap: f64,

    /// Minimum number of points that form a cluster.
    #[serde(default = "Config::default_min_cluster_points")]
    pub min_cluster_points: usize,

    /// Brightness offset applied to cluster thumbnails before the count badge.
    #[serde(default = "Config::default_cluster_brightness_delta")]
    pub cluster_brightness_delta: i32,

    /// Upper bound on marker renders in flight per render call.
    #[serde(default = "Config::default_render_concurrency")]
    pub render_concurrency: usize,

    /// Settle time for viewport changes while the camera is moving.
    #[serde(default = "Config::default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Config {
    const fn default_min_zoom() -> u8 {
        0
    }

    const fn default_max_zoom() -> u8 {
        21
    }

    const fn default_cluster_radius_px() -> u32 {
        150
    }

    const fn default_tile_extent() -> u32 {
        2048
    }

    const fn default_thumbnail_size() -> u32 {
        64
    }

    const fn default_zoom_increment() -> f64 {
        2.0
    }

    const fn default_min_cluster_points() -> usize {
        2
    }

    const fn default_cluster_brightness_delta() -> i32 {
        -70
    }

    const fn default_render_concurrency() -> usize {
        8
    }

    const fn default_debounce_ms() -> u64 {
        120
    }

    /// Highest zoom level the index supports.
    pub const MAX_SUPPORTED_ZOOM: u8 = 30;

    pub fn with_zoom_range(mut self, min_zoom: u8, max_zoom: u8) -> Self {
        assert!(min_zoom <= max_zoom, "min_zoom must not exceed max_zoom");
        self.min_zoom = min_zoom;
        self.max_zoom = max_zoom;
        self
    }

    pub fn with_cluster_radius(mut self, radius_px: u32) -> Self {
        assert!(radius_px > 0, "Cluster radius must be greater than zero");
        self.cluster_radius_px = radius_px;
        self
    }

    pub fn with_tile_extent(mut self, extent: u32) -> Self {
        assert!(extent > 0, "Tile extent must be greater than zero");
        self.tile_extent = extent;
        self
    }

    pub fn with_thumbnail_size(mut self, size: u32) -> Self {
        self.thumbnail_size = size;
        self
    }

    pub fn with_zoom_increment(mut self, increment: f64) -> Self {
        self.zoom_increment_on_cluster_tap = increment;
        self
    }

    pub fn with_min_cluster_points(mut self, points: usize) -> Self {
        self.min_cluster_points = points;
        self
    }

    pub fn with_render_concurrency(mut self, limit: usize) -> Self {
        assert!(limit > 0, "Render concurrency must be greater than zero");
        self.render_concurrency = limit;
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce_ms = debounce.as_millis().min(u64::MAX as u128) as u64;
        self
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.min_zoom > self.max_zoom {
            return Err(format!(
                "min_zoom ({}) must not exceed max_zoom ({})",
                self.min_zoom, self.max_zoom
            ));
        }

        if self.max_zoom > Self::MAX_SUPPORTED_ZOOM {
            return Err(format!(
                "max_zoom must be at most {}, got {}",
                Self::MAX_SUPPORTED_ZOOM,
                self.max_zoom
            ));
        }

        if self.cluster_radius_px == 0 {
            return Err("Cluster radius must be greater than zero".to_string());
        }

        if self.tile_extent == 0 {
            return Err("Tile extent must be greater than zero".to_string());
        }

        if !(8..=1024).contains(&self.thumbnail_size) {
            return Err(format!(
                "Thumbnail size must be between 8 and 1024 pixels, got {}",
                self.thumbnail_size
            ));
        }

        if !self.zoom_increment_on_cluster_tap.is_finite() || self.zoom_increment_on_cluster_tap <= 0.0
        {
            return Err("Zoom increment must be finite and positive".to_string());
        }

        if self.min_cluster_points < 2 {
            return Err("A cluster needs at least 2 points".to_string());
        }

        if !(-255..=255).contains(&self.cluster_brightness_delta) {
            return Err("Cluster brightness delta must be within [-255, 255]".to_string());
        }

        if self.render_concurrency == 0 {
            return Err("Render concurrency must be greater than zero".to_string());
        }

        Ok(())
    }

    /// Load configuration from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let config: Config = serde_json::from_str(json)?;
        if let Err(e) = config.validate() {
            return Err(serde_json::Error::custom(e));
        }
        Ok(config)
    }

    /// Save configuration as JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load configuration from TOML string (requires toml feature)
    #[cfg(feature = "toml")]
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        let config: Config = toml::from_str(toml_str)?;
        if let Err(e) = config.validate() {
            return Err(toml::de::Error::custom(e));
        }
        Ok(config)
    }

    /// Save configuration as TOML string (requires toml feature)
    #[cfg(feature = "toml")]
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_zoom: Self::default_min_zoom(),
            max_zoom: Self::default_max_zoom(),
            cluster_radius_px: Self::default_cluster_radius_px(),
            tile_extent: Self::default_tile_extent(),
            thumbnail_size: Self::default_thumbnail_size(),
            zoom_increment_on_cluster_tap: Self::default_zoom_increment(),
            min_cluster_points: Self::default_min_cluster_points(),
            cluster_brightness_delta: Self::default_cluster_brightness_delta(),
            render_concurrency: Self::default_render_concurrency(),
            debounce_ms: Self::default_debounce_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_json_roundtrip_keeps_values() {
        let config = Config::default()
            .with_zoom_range(2, 16)
            .with_cluster_radius(60)
            .with_debounce(Duration::from_millis(40));
        let json = config.to_json().unwrap();
        assert_eq!(Config::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_from_json_rejects_invalid() {
        assert!(Config::from_json(r#"{"min_zoom": 10, "max_zoom": 4}"#).is_err());
        assert!(Config::from_json(r#"{"thumbnail_size": 2}"#).is_err());
        assert!(Config::from_json(r#"{"zoom_increment_on_cluster_tap": -1.0}"#).is_err());
        assert!(Config::from_json(r#"{"unknown_option": true}"#).is_err());
    }

    #[test]
    #[should_panic(expected = "Cluster radius must be greater than zero")]
    fn test_zero_radius_panics() {
        let _ = Config::default().with_cluster_radius(0);
    }

    #[cfg(feature = "toml")]
    #[test]
    fn test_toml() {
        let config = Config::from_toml("max_zoom = 12\nthumbnail_size = 32\n").unwrap();
        assert_eq!(config.max_zoom, 12);
        assert_eq!(config.thumbnail_size, 32);
        assert!(Config::from_toml(&config.to_toml().unwrap()).is_ok());
    }
}
