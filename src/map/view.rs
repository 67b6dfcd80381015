// src/map/view.rs
//! The map widget as seen by playback and export

use crate::gps::{LatLon, TrackSet};

/// Padding in pixels used when framing all tracks
pub const FIT_PADDING: u32 = 20;

/// Geographic bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl Bounds {
    pub fn from_point(p: LatLon) -> Self {
        Self {
            south: p.lat,
            west: p.lon,
            north: p.lat,
            east: p.lon,
        }
    }

    pub fn extend(&mut self, p: LatLon) {
        self.south = self.south.min(p.lat);
        self.north = self.north.max(p.lat);
        self.west = self.west.min(p.lon);
        self.east = self.east.max(p.lon);
    }

    /// Bounds of every drawn segment; segments with fewer than two points are
    /// not drawn and do not count.
    pub fn from_track_set(set: &TrackSet) -> Option<Self> {
        let mut bounds: Option<Bounds> = None;
        for segment in set.segments().filter(|s| s.len() >= 2) {
            for point in &segment.points {
                match bounds.as_mut() {
                    Some(b) => b.extend(point.position()),
                    None => bounds = Some(Bounds::from_point(point.position())),
                }
            }
        }
        bounds
    }

    pub fn center(&self) -> LatLon {
        LatLon::new((self.south + self.north) / 2.0, (self.west + self.east) / 2.0)
    }
}

/// Operations the animation needs from a map widget.
///
/// Implementations own the marker, trail overlay and view transform; only the
/// driver currently holding the [`DriverLock`](crate::animation::DriverLock)
/// writes to them.
pub trait MapView {
    /// Draw the static track polylines with start/end markers
    fn draw_tracks(&mut self, tracks: &TrackSet);

    fn set_marker(&mut self, position: LatLon);

    /// Replace the trail overlay with `trail`
    fn set_trail(&mut self, trail: &[LatLon]);

    fn set_trail_visible(&mut self, visible: bool);

    fn set_view(&mut self, center: LatLon, zoom: f64);

    /// Rotate the whole view, in degrees clockwise
    fn set_rotation(&mut self, degrees: f64);

    fn fit_bounds(&mut self, bounds: &Bounds, padding: u32);
}
