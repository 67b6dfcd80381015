// src/animation/playback.rs
//! Interactive playback state machine

use super::clock::Ticker;
use super::driver::{Driver, DriverLock};
use super::orientation::{smoothed_rotation, RotationTracker, DEFAULT_LOOKAHEAD, DEFAULT_ROTATION_THRESHOLD_DEG};
use super::resample::InterpolatedSequence;
use crate::config::PlayerConfig;
use crate::gps::LatLon;
use crate::map::{Bounds, MapView, FIT_PADDING};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};

/// Shortest tick period, whatever the speed multiplier
pub const MIN_TICK_MS: f64 = 50.0;
pub const DEFAULT_PLAYBACK_ZOOM: f64 = 17.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    Stopped,
    Playing,
    Paused,
}

/// Notifications emitted by [`PlaybackController`]
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    Started { index: usize, period: Duration },
    Paused { index: usize },
    /// The last point was reached and playback paused itself
    Finished,
    Reset,
    SpeedChanged(f64),
    Advanced {
        index: usize,
        position: LatLon,
        rotation: Option<f64>,
    },
}

/// What a single tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Idle,
    Advanced(usize),
    Finished,
}

/// Observable playback state.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
    pub current_index: usize,
    pub is_playing: bool,
    pub speed_multiplier: f64,
    pub trail_enabled: bool,
    pub auto_zoom_enabled: bool,
    pub current_rotation_degrees: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackOptions {
    pub speed: f64,
    pub trail_enabled: bool,
    pub auto_zoom: bool,
    pub zoom: f64,
    pub lookahead: usize,
    pub rotation_threshold: f64,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            speed: 1.0,
            trail_enabled: true,
            auto_zoom: true,
            zoom: DEFAULT_PLAYBACK_ZOOM,
            lookahead: DEFAULT_LOOKAHEAD,
            rotation_threshold: DEFAULT_ROTATION_THRESHOLD_DEG,
        }
    }
}

impl From<&PlayerConfig> for PlaybackOptions {
    fn from(config: &PlayerConfig) -> Self {
        Self {
            speed: config.speed,
            trail_enabled: config.trail_enabled,
            auto_zoom: config.auto_zoom,
            zoom: config.playback_zoom,
            lookahead: config.lookahead,
            rotation_threshold: config.rotation_threshold_deg,
        }
    }
}

/// Tick period for a speed multiplier
pub fn tick_period(speed: f64) -> Duration {
    Duration::from_secs_f64((1000.0 / speed).max(MIN_TICK_MS) / 1000.0)
}

fn valid_speed(speed: f64) -> bool {
    speed.is_finite() && speed > 0.0
}

/// Walks the marker through an [`InterpolatedSequence`] at a speed-dependent
/// cadence, optionally leaving a trail and rotating the view to face the
/// direction of travel.
pub struct PlaybackController<T: Ticker> {
    sequence: Arc<InterpolatedSequence>,
    home: Option<Bounds>,
    ticker: T,
    lock: DriverLock,
    status: PlaybackStatus,
    index: usize,
    speed: f64,
    trail_enabled: bool,
    auto_zoom: bool,
    zoom: f64,
    lookahead: usize,
    trail: Vec<LatLon>,
    rotation: RotationTracker,
    events: Option<UnboundedSender<PlaybackEvent>>,
}

impl<T: Ticker> PlaybackController<T> {
    /// `home` is the default framing restored on reset
    pub fn new(
        sequence: Arc<InterpolatedSequence>,
        home: Option<Bounds>,
        ticker: T,
        lock: DriverLock,
        options: PlaybackOptions,
    ) -> Self {
        let speed = if valid_speed(options.speed) { options.speed } else { 1.0 };
        Self {
            sequence,
            home,
            ticker,
            lock,
            status: PlaybackStatus::Stopped,
            index: 0,
            speed,
            trail_enabled: options.trail_enabled,
            auto_zoom: options.auto_zoom,
            zoom: options.zoom,
            lookahead: options.lookahead,
            trail: Vec::new(),
            rotation: RotationTracker::new(options.rotation_threshold),
            events: None,
        }
    }

    pub fn with_events(mut self, events: UnboundedSender<PlaybackEvent>) -> Self {
        self.events = Some(events);
        self
    }

    fn emit(&self, event: PlaybackEvent) {
        if let Some(tx) = &self.events {
            // a dropped receiver just means nobody is listening
            let _ = tx.send(event);
        }
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status
    }

    pub fn is_playing(&self) -> bool {
        self.status == PlaybackStatus::Playing
    }

    pub fn state(&self) -> PlaybackState {
        PlaybackState {
            current_index: self.index,
            is_playing: self.is_playing(),
            speed_multiplier: self.speed,
            trail_enabled: self.trail_enabled,
            auto_zoom_enabled: self.auto_zoom,
            current_rotation_degrees: self.rotation.current(),
        }
    }

    pub fn current_index(&self) -> usize {
        self.index
    }

    pub fn set_index(&mut self, index: usize) {
        self.index = index;
    }

    pub fn sequence(&self) -> &Arc<InterpolatedSequence> {
        &self.sequence
    }

    pub fn trail(&self) -> &[LatLon] {
        &self.trail
    }

    pub fn ticker(&self) -> &T {
        &self.ticker
    }

    pub fn driver_lock(&self) -> &DriverLock {
        &self.lock
    }

    pub fn auto_zoom(&self) -> bool {
        self.auto_zoom
    }

    /// Start or resume. Returns `false` when nothing happened.
    pub fn play(&mut self) -> bool {
        if self.is_playing() || self.sequence.is_empty() {
            return false;
        }
        if !self.lock.try_acquire(Driver::Playback) {
            debug!("Playback refused, view is driven by export");
            return false;
        }

        let period = tick_period(self.speed);
        self.ticker.start(period);
        self.status = PlaybackStatus::Playing;
        info!("Playback started at index {} ({:?} per step)", self.index, period);
        self.emit(PlaybackEvent::Started {
            index: self.index,
            period,
        });
        true
    }

    pub fn pause(&mut self) {
        if !self.is_playing() {
            return;
        }
        self.ticker.cancel();
        self.status = PlaybackStatus::Paused;
        self.lock.release(Driver::Playback);
        debug!("Playback paused at index {}", self.index);
        self.emit(PlaybackEvent::Paused { index: self.index });
    }

    /// Stop, rewind to the first point and restore the default framing
    pub fn reset<V: MapView + ?Sized>(&mut self, view: &mut V) {
        self.pause();
        self.ticker.cancel();
        self.status = PlaybackStatus::Stopped;
        self.index = 0;

        if let Some(first) = self.sequence.first() {
            self.trail.clear();
            view.set_trail(&self.trail);
            view.set_marker(first.position());
        }
        if let Some(bounds) = &self.home {
            view.fit_bounds(bounds, FIT_PADDING);
        }
        self.emit(PlaybackEvent::Reset);
    }

    pub fn change_speed(&mut self, speed: f64) {
        if !valid_speed(speed) {
            debug!("Ignoring invalid speed multiplier {}", speed);
            return;
        }
        self.speed = speed;
        self.emit(PlaybackEvent::SpeedChanged(speed));
        if self.is_playing() {
            self.pause();
            self.play();
        }
    }

    /// Show or hide the trail; the collected trail is kept either way
    pub fn set_trail_enabled<V: MapView + ?Sized>(&mut self, enabled: bool, view: &mut V) {
        self.trail_enabled = enabled;
        view.set_trail_visible(enabled);
    }

    pub fn set_auto_zoom(&mut self, enabled: bool) {
        self.auto_zoom = enabled;
    }

    /// Place the marker on `index`, recentering at `zoom` when auto-zoom is on
    pub fn position_at<V: MapView + ?Sized>(&self, index: usize, zoom: f64, view: &mut V) -> Option<LatLon> {
        let position = self.sequence.get(index)?.position();
        view.set_marker(position);
        if self.auto_zoom {
            view.set_view(position, zoom);
        }
        Some(position)
    }

    /// Advance one step. Does nothing unless playing.
    pub fn tick<V: MapView + ?Sized>(&mut self, view: &mut V) -> TickOutcome {
        if !self.is_playing() {
            return TickOutcome::Idle;
        }
        if self.index >= self.sequence.len() {
            self.pause();
            info!("Playback reached the end of the track");
            self.emit(PlaybackEvent::Finished);
            return TickOutcome::Finished;
        }

        let index = self.index;
        let Some(position) = self.position_at(index, self.zoom, view) else {
            return TickOutcome::Idle;
        };

        if self.trail_enabled {
            self.trail.push(position);
            view.set_trail(&self.trail);
        }

        let mut applied = None;
        if self.auto_zoom {
            let rotation = smoothed_rotation(self.sequence.as_slice(), index, self.lookahead);
            if let Some(rotation) = self.rotation.update(rotation) {
                view.set_rotation(rotation);
                applied = Some(rotation);
            }
        }

        self.index += 1;
        self.emit(PlaybackEvent::Advanced {
            index,
            position,
            rotation: applied,
        });
        TickOutcome::Advanced(index)
    }

    /// Wait for the next tick and apply it. `None` once the ticker is stopped.
    pub async fn step<V: MapView + ?Sized>(&mut self, view: &mut V) -> Option<TickOutcome> {
        if !self.ticker.tick().await {
            return None;
        }
        Some(self.tick(view))
    }

    /// Drive playback until it stops being in the playing state
    pub async fn run<V: MapView + ?Sized>(&mut self, view: &mut V) {
        while self.is_playing() {
            if self.step(view).await.is_none() {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::clock::ManualTicker;
    use crate::gps::TrackPoint;
    use crate::map::recording::{RecordingView, ViewCall};

    fn eastbound(n: usize) -> Arc<InterpolatedSequence> {
        let points = (0..n).map(|i| TrackPoint::new(0.0, i as f64 * 0.001)).collect();
        Arc::new(InterpolatedSequence::new(points))
    }

    fn controller(n: usize) -> PlaybackController<ManualTicker> {
        let sequence = eastbound(n);
        let home = Some(Bounds::from_point(LatLon::new(0.0, 0.0)));
        PlaybackController::new(sequence, home, ManualTicker::new(), DriverLock::new(), PlaybackOptions::default())
    }

    #[test]
    fn test_tick_period() {
        assert_eq!(tick_period(1.0), Duration::from_millis(1000));
        assert_eq!(tick_period(4.0), Duration::from_millis(250));
        assert_eq!(tick_period(20.0), Duration::from_millis(50));
        assert_eq!(tick_period(100.0), Duration::from_millis(50));
    }

    #[test]
    fn test_play_pause_states() {
        let mut player = controller(5);
        assert_eq!(player.status(), PlaybackStatus::Stopped);

        assert!(player.play());
        assert!(!player.play());
        assert_eq!(player.ticker().starts(), &[Duration::from_secs(1)]);
        assert!(player.driver_lock().is_held_by(Driver::Playback));

        player.pause();
        assert_eq!(player.status(), PlaybackStatus::Paused);
        assert!(!player.ticker().is_active());
        assert_eq!(player.driver_lock().owner(), None);

        player.pause();
        assert_eq!(player.ticker().cancels(), 1);
    }

    #[test]
    fn test_empty_sequence_never_plays() {
        let mut player = controller(0);
        assert!(!player.play());
        assert_eq!(player.status(), PlaybackStatus::Stopped);
        assert!(player.ticker().starts().is_empty());
    }

    #[test]
    fn test_play_refused_while_export_drives() {
        let mut player = controller(5);
        assert!(player.driver_lock().try_acquire(Driver::Export));
        assert!(!player.play());
        assert_eq!(player.status(), PlaybackStatus::Stopped);
    }

    #[test]
    fn test_ticks_walk_every_point_then_pause() {
        let mut player = controller(3);
        let mut view = RecordingView::new();
        player.play();

        assert_eq!(player.tick(&mut view), TickOutcome::Advanced(0));
        assert_eq!(player.tick(&mut view), TickOutcome::Advanced(1));
        assert_eq!(player.tick(&mut view), TickOutcome::Advanced(2));
        assert_eq!(view.marker_moves(), 3);

        assert_eq!(player.tick(&mut view), TickOutcome::Finished);
        assert_eq!(player.status(), PlaybackStatus::Paused);
        // reaching the end does not move the marker again
        assert_eq!(view.marker_moves(), 3);
        assert_eq!(player.current_index(), 3);
        assert_eq!(player.tick(&mut view), TickOutcome::Idle);
    }

    #[test]
    fn test_trail_follows_marker() {
        let mut player = controller(4);
        let mut view = RecordingView::new();
        player.play();
        player.tick(&mut view);
        player.tick(&mut view);
        assert_eq!(player.trail().len(), 2);
        assert_eq!(view.trail.len(), 2);

        player.set_trail_enabled(false, &mut view);
        player.tick(&mut view);
        assert_eq!(player.trail().len(), 2);
        assert!(view.calls.contains(&ViewCall::TrailVisible(false)));
    }

    #[test]
    fn test_auto_zoom_recenters_and_rotates() {
        let mut player = controller(10);
        let mut view = RecordingView::new();
        player.play();
        player.tick(&mut view);

        assert!(view
            .calls
            .contains(&ViewCall::View(LatLon::new(0.0, 0.0), DEFAULT_PLAYBACK_ZOOM)));
        let rotations = view.rotations();
        assert_eq!(rotations.len(), 1);
        assert!((rotations[0] + 90.0).abs() < 1e-6);

        // heading does not change on a straight line, so no further rotation
        player.tick(&mut view);
        assert_eq!(view.rotations().len(), 1);
        assert!((player.state().current_rotation_degrees + 90.0).abs() < 1e-6);
    }

    #[test]
    fn test_no_auto_zoom_keeps_view_still() {
        let mut player = controller(10);
        let mut view = RecordingView::new();
        player.set_auto_zoom(false);
        player.play();
        player.tick(&mut view);
        assert!(view.rotations().is_empty());
        assert!(!view.calls.iter().any(|c| matches!(c, ViewCall::View(..))));
    }

    #[test]
    fn test_reset_rewinds() {
        let mut player = controller(5);
        let mut view = RecordingView::new();
        player.play();
        player.tick(&mut view);
        player.tick(&mut view);

        view.calls.clear();
        player.reset(&mut view);
        assert_eq!(player.status(), PlaybackStatus::Stopped);
        assert_eq!(player.current_index(), 0);
        assert!(player.trail().is_empty());
        assert_eq!(view.marker, Some(LatLon::new(0.0, 0.0)));
        assert!(view.calls.iter().any(|c| matches!(c, ViewCall::FitBounds(_))));
        assert!(!player.ticker().is_active());
    }

    #[test]
    fn test_change_speed_restarts_ticker() {
        let mut player = controller(5);
        player.change_speed(2.0);
        assert!(player.ticker().starts().is_empty());

        player.play();
        player.change_speed(10.0);
        assert!(player.is_playing());
        assert_eq!(
            player.ticker().starts(),
            &[Duration::from_millis(500), Duration::from_millis(100)]
        );

        player.change_speed(0.0);
        player.change_speed(f64::NAN);
        assert_eq!(player.state().speed_multiplier, 10.0);
    }

    #[test]
    fn test_speed_change_resumes_from_same_index() {
        let mut player = controller(6);
        let mut view = RecordingView::new();
        player.play();
        player.tick(&mut view);
        player.tick(&mut view);
        let trail_before = player.trail().to_vec();

        player.change_speed(2.0);
        assert!(player.is_playing());
        assert_eq!(player.ticker().period(), Some(Duration::from_millis(500)));
        assert_eq!(player.current_index(), 2);
        assert_eq!(player.trail(), trail_before.as_slice());

        assert_eq!(player.tick(&mut view), TickOutcome::Advanced(2));
        assert_eq!(player.current_index(), 3);
        assert_eq!(player.trail().len(), 3);
        assert_eq!(view.marker, Some(LatLon::new(0.0, 0.002)));
    }

    #[test]
    fn test_events_are_reported() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut player = controller(1).with_events(tx);
        let mut view = RecordingView::new();
        player.play();
        player.tick(&mut view);
        player.tick(&mut view);

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert!(matches!(events[0], PlaybackEvent::Started { index: 0, .. }));
        assert!(matches!(events[1], PlaybackEvent::Advanced { index: 0, .. }));
        assert_eq!(events[2], PlaybackEvent::Paused { index: 1 });
        assert_eq!(events[3], PlaybackEvent::Finished);
    }

    #[tokio::test]
    async fn test_run_plays_to_the_end() {
        let mut player = controller(6);
        let mut view = RecordingView::new();
        player.change_speed(2.0);
        player.play();
        player.run(&mut view).await;

        assert_eq!(player.status(), PlaybackStatus::Paused);
        assert_eq!(player.current_index(), 6);
        assert_eq!(view.marker_moves(), 6);
        // six advancing ticks and one that found the end
        assert_eq!(player.ticker().elapsed(), Duration::from_millis(3500));
    }
}
