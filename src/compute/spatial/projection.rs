//! Spherical Web-Mercator projection onto the unit square.
//!
//! `x` grows eastward from 0 at -180° to 1 at 180°; `y` grows southward from 0
//! at the northern Mercator limit to 1 at the southern one. Latitudes beyond
//! the Mercator limit clamp to the edges.

use std::f64::consts::PI;

pub fn lng_x(lng: f64) -> f64 {
    lng / 360.0 + 0.5
}

pub fn lat_y(lat: f64) -> f64 {
    let sin = (lat * PI / 180.0).sin();
    let y = 0.5 - 0.25 * ((1.0 + sin) / (1.0 - sin)).ln() / PI;
    y.clamp(0.0, 1.0)
}

pub fn x_lng(x: f64) -> f64 {
    (x - 0.5) * 360.0
}

pub fn y_lat(y: f64) -> f64 {
    let y2 = (180.0 - y * 360.0) * PI / 180.0;
    360.0 * y2.exp().atan() / PI - 90.0
}

/// Cluster radius at `zoom`, in projected units.
pub fn radius_at(radius_px: u32, extent: u32, zoom: u8) -> f64 {
    f64::from(radius_px) / (f64::from(extent) * 2f64.powi(i32::from(zoom)))
}
