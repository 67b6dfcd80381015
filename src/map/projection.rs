// src/map/projection.rs
//! Web Mercator projection helpers

use super::view::Bounds;
use crate::gps::LatLon;
use std::f64::consts::PI;

pub const TILE_SIZE: f64 = 256.0;
/// Highest zoom the OpenStreetMap tile layer serves
pub const MAX_ZOOM: f64 = 18.0;
/// Latitude limit of the Mercator square
pub const MAX_LATITUDE: f64 = 85.051_128_78;

/// World pixel coordinates of a position at a (possibly fractional) zoom
pub fn lat_lon_to_world(pos: LatLon, zoom: f64) -> (f64, f64) {
    let scale = TILE_SIZE * 2_f64.powf(zoom);
    let lat_rad = pos.lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    let x = (pos.lon + 180.0) / 360.0 * scale;
    let y = (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * scale;
    (x, y)
}

/// Inverse of [`lat_lon_to_world`]
pub fn world_to_lat_lon(x: f64, y: f64, zoom: f64) -> LatLon {
    let scale = TILE_SIZE * 2_f64.powf(zoom);
    let lon = x / scale * 360.0 - 180.0;
    let lat = ((1.0 - 2.0 * y / scale) * PI).sinh().atan().to_degrees();
    LatLon::new(lat, lon)
}

/// Tile containing a position at an integer zoom
pub fn lat_lon_to_tile(pos: LatLon, zoom: u8) -> (u32, u32) {
    let (x, y) = lat_lon_to_world(pos, zoom as f64);
    ((x / TILE_SIZE).floor() as u32, (y / TILE_SIZE).floor() as u32)
}

/// Highest integer zoom (at most [`MAX_ZOOM`]) at which `bounds` plus
/// `padding` on every side fits a `width` x `height` viewport.
pub fn fit_zoom(bounds: &Bounds, width: u32, height: u32, padding: u32) -> f64 {
    let avail_w = (width as f64 - 2.0 * padding as f64).max(1.0);
    let avail_h = (height as f64 - 2.0 * padding as f64).max(1.0);

    let (x0, y0) = lat_lon_to_world(LatLon::new(bounds.north, bounds.west), 0.0);
    let (x1, y1) = lat_lon_to_world(LatLon::new(bounds.south, bounds.east), 0.0);
    let span_x = (x1 - x0).abs();
    let span_y = (y1 - y0).abs();

    if span_x == 0.0 && span_y == 0.0 {
        return MAX_ZOOM;
    }

    let zoom_x = if span_x > 0.0 { (avail_w / span_x).log2() } else { MAX_ZOOM };
    let zoom_y = if span_y > 0.0 { (avail_h / span_y).log2() } else { MAX_ZOOM };
    zoom_x.min(zoom_y).floor().clamp(0.0, MAX_ZOOM)
}
