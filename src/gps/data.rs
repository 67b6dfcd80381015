// src/gps/data.rs
//! Track data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const UNNAMED_TRACK: &str = "Unnamed Track";

/// A bare geographic coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// A single recorded (or synthesized) position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    pub lat: f64,
    pub lon: f64,
    pub elevation: Option<f64>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl TrackPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            elevation: None,
            timestamp: None,
        }
    }

    pub fn with_elevation(mut self, elevation: f64) -> Self {
        self.elevation = Some(elevation);
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn position(&self) -> LatLon {
        LatLon::new(self.lat, self.lon)
    }

    /// Distance to another point in meters
    pub fn distance_to(&self, other: &TrackPoint) -> f64 {
        super::geodesy::distance_km(self.position(), other.position()) * 1000.0
    }

    /// Format coordinate for display
    pub fn format_coordinate(coord: f64) -> String {
        format!("{:.6}", coord)
    }

    pub fn format_elevation(&self) -> String {
        match self.elevation {
            Some(ele) => format!("{:.1} m", ele),
            None => "N/A".to_string(),
        }
    }

    pub fn format_time(&self) -> String {
        match self.timestamp {
            Some(ts) => ts.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            None => "N/A".to_string(),
        }
    }
}

/// One continuous run of recorded points.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackSegment {
    pub points: Vec<TrackPoint>,
}

impl TrackSegment {
    pub fn new(points: Vec<TrackPoint>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub name: String,
    pub segments: Vec<TrackSegment>,
}

impl Track {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            segments: Vec::new(),
        }
    }

    /// Append a segment, discarding it if empty
    pub fn push_segment(&mut self, segment: TrackSegment) {
        if !segment.is_empty() {
            self.segments.push(segment);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Every track parsed from one file, in document order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackSet {
    pub tracks: Vec<Track>,
}

impl TrackSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a track, discarding it if it has no non-empty segments
    pub fn push_track(&mut self, track: Track) {
        if !track.is_empty() {
            self.tracks.push(track);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn segments(&self) -> impl Iterator<Item = &TrackSegment> {
        self.tracks.iter().flat_map(|track| track.segments.iter())
    }
}
