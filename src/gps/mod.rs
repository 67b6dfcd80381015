// src/gps/mod.rs
//! Track data model, GPX reading and geodesy

pub mod data;
pub mod geodesy;
pub mod gpx;
pub mod track;

pub use data::{LatLon, Track, TrackPoint, TrackSegment, TrackSet};
