// src/lib.rs
//! GPX Player Library
//!
//! Loads GPX tracks, resamples them onto an even time grid and animates a
//! marker along the route, either interactively or frame by frame into a
//! video file.

pub mod animation;
pub mod config;
pub mod display;
pub mod error;
pub mod export;
pub mod gps;
pub mod map;
pub mod session;

// Re-export main types for convenience
pub use animation::{InterpolatedSequence, PlaybackController, PlaybackState, PlaybackStatus};
pub use config::PlayerConfig;
pub use error::{PlayerError, Result};
pub use export::{ExportError, ExportPipeline};
pub use gps::{LatLon, Track, TrackPoint, TrackSegment, TrackSet};
pub use session::{LoadedTrack, Session};
