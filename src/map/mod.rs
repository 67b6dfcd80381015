// src/map/mod.rs
//! Map view abstraction, projection and software rendering

pub mod projection;
mod raster;
mod view;

#[cfg(test)]
pub(crate) mod recording;

pub use projection::{fit_zoom, lat_lon_to_tile, lat_lon_to_world, world_to_lat_lon};
pub use raster::RasterMap;
pub use view::{Bounds, MapView, FIT_PADDING};
