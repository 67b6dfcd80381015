// src/session.rs
//! A loaded GPX file and the players built on top of it

use crate::{
    animation::{resample, Clock, DriverLock, InterpolatedSequence, PlaybackController, PlaybackOptions, Ticker},
    config::PlayerConfig,
    error::{PlayerError, Result},
    export::{ExportOptions, ExportPipeline},
    gps::{gpx, track, track::TrackSummary, TrackPoint, TrackSet},
    map::{Bounds, MapView, RasterMap, FIT_PADDING},
};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Everything derived from one GPX file. Rebuilt from scratch per file.
#[derive(Debug, Clone)]
pub struct LoadedTrack {
    pub summary: TrackSummary,
    pub tracks: Arc<TrackSet>,
    pub points: Arc<Vec<TrackPoint>>,
    pub sequence: Arc<InterpolatedSequence>,
    pub bounds: Option<Bounds>,
}

impl LoadedTrack {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::from_gpx(file_name, &contents)
    }

    /// Build from GPX text; the text length stands in for the file size
    pub fn from_gpx(file_name: impl Into<String>, contents: &str) -> Result<Self> {
        let tracks = gpx::parse_gpx_str(contents)?;
        let points = track::flatten(&tracks);
        let sequence = resample(&points);
        let summary = TrackSummary::new(file_name.into(), contents.len() as u64, &tracks, sequence.len());
        let bounds = Bounds::from_track_set(&tracks);

        info!(
            "Loaded {}: {} tracks, {} points, {} animation steps",
            summary.file_name,
            tracks.tracks.len(),
            points.len(),
            sequence.len()
        );

        Ok(Self {
            summary,
            tracks: Arc::new(tracks),
            points: Arc::new(points),
            sequence: Arc::new(sequence),
            bounds,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Ties a loaded track to the settings and the shared view lock.
pub struct Session {
    track: LoadedTrack,
    config: PlayerConfig,
    lock: DriverLock,
}

impl Session {
    pub fn new(track: LoadedTrack, config: PlayerConfig) -> Self {
        Self {
            track,
            config,
            lock: DriverLock::new(),
        }
    }

    pub fn track(&self) -> &LoadedTrack {
        &self.track
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    /// Draw the tracks and frame them, as done right after loading
    pub fn prepare_view<V: MapView + ?Sized>(&self, view: &mut V) {
        view.draw_tracks(&self.track.tracks);
        if let Some(bounds) = &self.track.bounds {
            view.fit_bounds(bounds, FIT_PADDING);
        }
        view.set_trail_visible(self.config.trail_enabled);
        if let Some(first) = self.track.sequence.first() {
            view.set_marker(first.position());
        }
    }

    /// Software map sized for export frames, ready to play
    pub fn raster_map(&self) -> RasterMap {
        let mut map = RasterMap::new(self.config.frame_width, self.config.frame_height);
        self.prepare_view(&mut map);
        map
    }

    pub fn player<T: Ticker>(&self, ticker: T) -> PlaybackController<T> {
        PlaybackController::new(
            Arc::clone(&self.track.sequence),
            self.track.bounds,
            ticker,
            self.lock.clone(),
            PlaybackOptions::from(&self.config),
        )
    }

    pub fn exporter(&self, clock: Arc<dyn Clock>) -> ExportPipeline {
        ExportPipeline::new(clock, ExportOptions::from(&self.config))
    }
}
