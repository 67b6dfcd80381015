// src/export/frame.rs
//! Frame capture from the map view

use super::ExportError;
use crate::map::{MapView, RasterMap};
use async_trait::async_trait;
use image::RgbaImage;

/// One captured video frame
pub type Frame = RgbaImage;

/// A map view that can snapshot what it currently shows.
#[async_trait]
pub trait FrameSource: MapView + Send {
    async fn capture_frame(&mut self) -> Result<Frame, ExportError>;
}

#[async_trait]
impl FrameSource for RasterMap {
    async fn capture_frame(&mut self) -> Result<Frame, ExportError> {
        Ok(self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gps::LatLon;

    #[tokio::test]
    async fn test_raster_map_captures_its_size() {
        let mut map = RasterMap::new(64, 48);
        map.set_marker(LatLon::new(0.0, 0.0));
        let frame = map.capture_frame().await.unwrap();
        assert_eq!(frame.dimensions(), (64, 48));
    }
}
