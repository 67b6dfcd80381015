// src/map/recording.rs
//! Test double that logs every view call

use super::view::{Bounds, MapView};
use crate::gps::{LatLon, TrackSet};

#[derive(Debug, Clone, PartialEq)]
pub enum ViewCall {
    DrawTracks(usize),
    Marker(LatLon),
    Trail(usize),
    TrailVisible(bool),
    View(LatLon, f64),
    Rotation(f64),
    FitBounds(Bounds),
}

#[derive(Debug, Default)]
pub struct RecordingView {
    pub calls: Vec<ViewCall>,
    pub marker: Option<LatLon>,
    pub trail: Vec<LatLon>,
    pub rotation: f64,
}

impl RecordingView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn marker_moves(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, ViewCall::Marker(_)))
            .count()
    }

    pub fn rotations(&self) -> Vec<f64> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                ViewCall::Rotation(r) => Some(*r),
                _ => None,
            })
            .collect()
    }
}

impl MapView for RecordingView {
    fn draw_tracks(&mut self, tracks: &TrackSet) {
        self.calls.push(ViewCall::DrawTracks(tracks.tracks.len()));
    }

    fn set_marker(&mut self, position: LatLon) {
        self.marker = Some(position);
        self.calls.push(ViewCall::Marker(position));
    }

    fn set_trail(&mut self, trail: &[LatLon]) {
        self.trail = trail.to_vec();
        self.calls.push(ViewCall::Trail(trail.len()));
    }

    fn set_trail_visible(&mut self, visible: bool) {
        self.calls.push(ViewCall::TrailVisible(visible));
    }

    fn set_view(&mut self, center: LatLon, zoom: f64) {
        self.calls.push(ViewCall::View(center, zoom));
    }

    fn set_rotation(&mut self, degrees: f64) {
        self.rotation = degrees;
        self.calls.push(ViewCall::Rotation(degrees));
    }

    fn fit_bounds(&mut self, bounds: &Bounds, _padding: u32) {
        self.calls.push(ViewCall::FitBounds(*bounds));
    }
}
