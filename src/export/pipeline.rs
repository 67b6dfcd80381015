// src/export/pipeline.rs
//! Frame-by-frame capture of the whole animation

use super::{ExportError, Frame, FrameSource, VideoEncoder};
use crate::animation::{Clock, Driver, PlaybackController, Ticker};
use crate::config::PlayerConfig;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

pub const DEFAULT_EXPORT_ZOOM: f64 = 18.0;
pub const DEFAULT_EXPORT_FPS: u32 = 30;
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    /// Zoom used to recenter on each point when auto-zoom is on
    pub zoom: f64,
    pub fps: u32,
    /// Wait between positioning the marker and capturing
    pub settle_delay: Duration,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            zoom: DEFAULT_EXPORT_ZOOM,
            fps: DEFAULT_EXPORT_FPS,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

impl From<&PlayerConfig> for ExportOptions {
    fn from(config: &PlayerConfig) -> Self {
        Self {
            zoom: config.export_zoom,
            fps: config.export_fps,
            settle_delay: Duration::from_millis(config.settle_delay_ms),
        }
    }
}

/// Export lifecycle notifications
#[derive(Debug, Clone, PartialEq)]
pub enum ExportProgress {
    Started { total: usize },
    Captured { captured: usize, total: usize },
    Encoding { frames: usize },
    Finished { path: PathBuf },
    Cancelled,
    Failed(String),
}

impl ExportProgress {
    /// Capture progress in `0.0..=1.0`, if this is a capture event
    pub fn fraction(&self) -> Option<f64> {
        match self {
            ExportProgress::Captured { captured, total } if *total > 0 => {
                Some(*captured as f64 / *total as f64)
            }
            _ => None,
        }
    }
}

/// Cancels a running export from elsewhere.
#[derive(Debug, Clone, Default)]
pub struct ExportHandle {
    exporting: Arc<AtomicBool>,
}

impl ExportHandle {
    pub fn is_exporting(&self) -> bool {
        self.exporting.load(Ordering::SeqCst)
    }

    /// Request cancellation; checked once per captured frame
    pub fn cancel(&self) {
        if self.exporting.swap(false, Ordering::SeqCst) {
            info!("Export cancellation requested");
        }
    }

    fn begin(&self) -> bool {
        !self.exporting.swap(true, Ordering::SeqCst)
    }

    fn finish(&self) {
        self.exporting.store(false, Ordering::SeqCst);
    }
}

/// Running flag plus the number of frames streamed to the encoder so far.
///
/// Frames are not kept in memory; the encoder owns them once pushed and
/// drops its partial output if the export does not complete.
#[derive(Debug, Default)]
pub struct ExportState {
    handle: ExportHandle,
    captured_frames: usize,
}

impl ExportState {
    pub fn is_exporting(&self) -> bool {
        self.handle.is_exporting()
    }

    pub fn captured_frames(&self) -> usize {
        self.captured_frames
    }
}

/// Walks the playback sequence one index at a time, capturing a frame per
/// point and streaming each one into a [`VideoEncoder`].
pub struct ExportPipeline {
    clock: Arc<dyn Clock>,
    options: ExportOptions,
    state: ExportState,
    events: Option<UnboundedSender<ExportProgress>>,
}

impl ExportPipeline {
    pub fn new(clock: Arc<dyn Clock>, options: ExportOptions) -> Self {
        Self {
            clock,
            options,
            state: ExportState::default(),
            events: None,
        }
    }

    pub fn with_progress(mut self, events: UnboundedSender<ExportProgress>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn handle(&self) -> ExportHandle {
        self.state.handle.clone()
    }

    pub fn state(&self) -> &ExportState {
        &self.state
    }

    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    fn emit(&self, event: ExportProgress) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    /// Capture every point of the player's sequence and encode the result.
    ///
    /// Playback is reset first and cannot resume until this returns. The
    /// running flag and the view lock are cleared however the export ends.
    pub async fn export<T, S, E>(
        &mut self,
        player: &mut PlaybackController<T>,
        source: &mut S,
        encoder: &mut E,
    ) -> Result<PathBuf, ExportError>
    where
        T: Ticker,
        S: FrameSource + ?Sized,
        E: VideoEncoder + ?Sized,
    {
        if self.state.is_exporting() || player.driver_lock().is_held_by(Driver::Export) {
            return Err(ExportError::Busy);
        }
        let total = player.sequence().len();
        if total == 0 {
            return Err(ExportError::EmptySequence);
        }

        player.reset(source);
        if !player.driver_lock().try_acquire(Driver::Export) {
            return Err(ExportError::Busy);
        }
        if !self.state.handle.begin() {
            player.driver_lock().release(Driver::Export);
            return Err(ExportError::Busy);
        }

        info!("Exporting {} frames", total);
        self.emit(ExportProgress::Started { total });

        let result = self.capture_and_encode(player, source, encoder, total).await;
        if result.is_err() {
            encoder.abort().await;
        }

        self.state.captured_frames = 0;
        self.state.handle.finish();
        player.driver_lock().release(Driver::Export);

        match &result {
            Ok(path) => {
                info!("Export written to {}", path.display());
                self.emit(ExportProgress::Finished { path: path.clone() });
            }
            Err(ExportError::Cancelled) => {
                warn!("Export cancelled, captured frames discarded");
                self.emit(ExportProgress::Cancelled);
            }
            Err(e) => {
                error!("Export failed: {}", e);
                self.emit(ExportProgress::Failed(e.to_string()));
            }
        }
        result
    }

    async fn capture_and_encode<T, S, E>(
        &mut self,
        player: &mut PlaybackController<T>,
        source: &mut S,
        encoder: &mut E,
        total: usize,
    ) -> Result<PathBuf, ExportError>
    where
        T: Ticker,
        S: FrameSource + ?Sized,
        E: VideoEncoder + ?Sized,
    {
        self.state.captured_frames = 0;

        for index in 0..total {
            if !self.state.is_exporting() {
                return Err(ExportError::Cancelled);
            }

            player.position_at(index, self.options.zoom, source);
            player.set_index(index + 1);
            self.clock.sleep(self.options.settle_delay).await;

            let frame: Frame = source.capture_frame().await?;
            if index == 0 {
                let (width, height) = frame.dimensions();
                encoder.begin(width, height, self.options.fps).await?;
            }
            encoder.push_frame(&frame).await?;
            self.state.captured_frames += 1;

            debug!("Captured frame {}/{}", index + 1, total);
            self.emit(ExportProgress::Captured {
                captured: index + 1,
                total,
            });
        }

        // a cancel during the last settle delay still counts
        if !self.state.is_exporting() {
            return Err(ExportError::Cancelled);
        }
        if self.state.captured_frames == 0 {
            return Err(ExportError::NoFrames);
        }

        self.emit(ExportProgress::Encoding {
            frames: self.state.captured_frames,
        });
        encoder.finish().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::{DriverLock, InterpolatedSequence, ManualClock, ManualTicker, PlaybackOptions};
    use crate::gps::{LatLon, TrackPoint, TrackSet};
    use crate::map::recording::{RecordingView, ViewCall};
    use crate::map::{Bounds, MapView};
    use async_trait::async_trait;

    /// Records view calls and returns tiny frames; can cancel or fail on cue.
    #[derive(Default)]
    struct TestSource {
        view: RecordingView,
        captures: usize,
        cancel_after: Option<(usize, ExportHandle)>,
        fail_at: Option<usize>,
    }

    impl MapView for TestSource {
        fn draw_tracks(&mut self, tracks: &TrackSet) {
            self.view.draw_tracks(tracks)
        }
        fn set_marker(&mut self, position: LatLon) {
            self.view.set_marker(position)
        }
        fn set_trail(&mut self, trail: &[LatLon]) {
            self.view.set_trail(trail)
        }
        fn set_trail_visible(&mut self, visible: bool) {
            self.view.set_trail_visible(visible)
        }
        fn set_view(&mut self, center: LatLon, zoom: f64) {
            self.view.set_view(center, zoom)
        }
        fn set_rotation(&mut self, degrees: f64) {
            self.view.set_rotation(degrees)
        }
        fn fit_bounds(&mut self, bounds: &Bounds, padding: u32) {
            self.view.fit_bounds(bounds, padding)
        }
    }

    #[async_trait]
    impl FrameSource for TestSource {
        async fn capture_frame(&mut self) -> Result<Frame, ExportError> {
            if self.fail_at == Some(self.captures) {
                return Err(ExportError::Capture("view gone".to_string()));
            }
            self.captures += 1;
            if let Some((after, handle)) = &self.cancel_after {
                if self.captures == *after {
                    handle.cancel();
                }
            }
            Ok(Frame::new(2, 2))
        }
    }

    /// Counts what it was fed; `written` mimics the output file existing.
    #[derive(Default)]
    struct TestEncoder {
        begins: Vec<(u32, u32, u32)>,
        pushed: usize,
        finished: usize,
        aborts: usize,
        written: bool,
        fail: bool,
    }

    #[async_trait]
    impl VideoEncoder for TestEncoder {
        async fn begin(&mut self, width: u32, height: u32, fps: u32) -> Result<(), ExportError> {
            self.begins.push((width, height, fps));
            self.written = true;
            Ok(())
        }

        async fn push_frame(&mut self, _frame: &Frame) -> Result<(), ExportError> {
            self.pushed += 1;
            Ok(())
        }

        async fn finish(&mut self) -> Result<PathBuf, ExportError> {
            if self.fail {
                self.written = false;
                return Err(ExportError::Encode("disk full".to_string()));
            }
            self.finished += 1;
            Ok(PathBuf::from("track.webm"))
        }

        async fn abort(&mut self) {
            self.aborts += 1;
            self.written = false;
        }
    }

    fn player(n: usize) -> PlaybackController<ManualTicker> {
        let points = (0..n).map(|i| TrackPoint::new(0.0, i as f64 * 0.001)).collect();
        PlaybackController::new(
            Arc::new(InterpolatedSequence::new(points)),
            None,
            ManualTicker::new(),
            DriverLock::new(),
            PlaybackOptions::default(),
        )
    }

    fn pipeline(clock: Arc<ManualClock>) -> ExportPipeline {
        ExportPipeline::new(clock, ExportOptions::default())
    }

    #[tokio::test]
    async fn test_captures_one_frame_per_point() {
        let clock = Arc::new(ManualClock::new());
        let mut export = pipeline(clock.clone());
        let mut player = player(5);
        let mut source = TestSource::default();
        let mut encoder = TestEncoder::default();

        let path = export.export(&mut player, &mut source, &mut encoder).await.unwrap();
        assert_eq!(path, PathBuf::from("track.webm"));
        assert_eq!(source.captures, 5);
        assert_eq!(encoder.begins, vec![(2, 2, 30)]);
        assert_eq!(encoder.pushed, 5);
        assert_eq!(encoder.finished, 1);
        assert_eq!(encoder.aborts, 0);
        assert_eq!(clock.now(), Duration::from_millis(500));
        assert_eq!(player.current_index(), 5);

        // export zoom is used for recentering
        assert!(source
            .view
            .calls
            .contains(&ViewCall::View(LatLon::new(0.0, 0.004), DEFAULT_EXPORT_ZOOM)));
        assert!(!export.state().is_exporting());
        assert_eq!(export.state().captured_frames(), 0);
        assert_eq!(player.driver_lock().owner(), None);
    }

    #[tokio::test]
    async fn test_export_stops_playback() {
        let mut export = pipeline(Arc::new(ManualClock::new()));
        let mut player = player(3);
        let mut source = TestSource::default();
        let mut encoder = TestEncoder::default();

        player.play();
        player.tick(&mut source);
        export.export(&mut player, &mut source, &mut encoder).await.unwrap();
        assert!(!player.is_playing());
        assert!(!player.ticker().is_active());
        // playback can resume once export is done
        assert!(player.play());
    }

    #[tokio::test]
    async fn test_empty_sequence() {
        let mut export = pipeline(Arc::new(ManualClock::new()));
        let mut player = player(0);
        let mut source = TestSource::default();
        let mut encoder = TestEncoder::default();

        let result = export.export(&mut player, &mut source, &mut encoder).await;
        assert_eq!(result, Err(ExportError::EmptySequence));
        assert!(encoder.begins.is_empty());
    }

    #[tokio::test]
    async fn test_busy_while_another_export_drives() {
        let mut export = pipeline(Arc::new(ManualClock::new()));
        let mut player = player(3);
        let mut source = TestSource::default();
        let mut encoder = TestEncoder::default();

        assert!(player.driver_lock().try_acquire(Driver::Export));
        let result = export.export(&mut player, &mut source, &mut encoder).await;
        assert_eq!(result, Err(ExportError::Busy));
        assert_eq!(source.captures, 0);
        assert!(player.driver_lock().is_held_by(Driver::Export));
    }

    #[tokio::test]
    async fn test_cancel_discards_frames() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut export = pipeline(Arc::new(ManualClock::new())).with_progress(tx);
        let mut player = player(10);
        let mut source = TestSource {
            cancel_after: Some((3, export.handle())),
            ..Default::default()
        };
        let mut encoder = TestEncoder::default();

        let result = export.export(&mut player, &mut source, &mut encoder).await;
        assert_eq!(result, Err(ExportError::Cancelled));
        assert_eq!(source.captures, 3);
        assert_eq!(encoder.pushed, 3);
        assert_eq!(encoder.finished, 0);
        assert_eq!(encoder.aborts, 1);
        assert!(!encoder.written);
        assert_eq!(export.state().captured_frames(), 0);
        assert_eq!(player.driver_lock().owner(), None);

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert_eq!(events.first(), Some(&ExportProgress::Started { total: 10 }));
        assert_eq!(events.last(), Some(&ExportProgress::Cancelled));
    }

    #[tokio::test]
    async fn test_cancel_on_last_frame_skips_encoding() {
        let mut export = pipeline(Arc::new(ManualClock::new()));
        let mut player = player(4);
        let mut source = TestSource {
            cancel_after: Some((4, export.handle())),
            ..Default::default()
        };
        let mut encoder = TestEncoder::default();

        let result = export.export(&mut player, &mut source, &mut encoder).await;
        assert_eq!(result, Err(ExportError::Cancelled));
        assert_eq!(encoder.pushed, 4);
        assert_eq!(encoder.finished, 0);
        assert!(!encoder.written);
    }

    #[tokio::test]
    async fn test_capture_failure_clears_state() {
        let mut export = pipeline(Arc::new(ManualClock::new()));
        let mut player = player(5);
        let mut source = TestSource {
            fail_at: Some(2),
            ..Default::default()
        };
        let mut encoder = TestEncoder::default();

        let result = export.export(&mut player, &mut source, &mut encoder).await;
        assert!(matches!(result, Err(ExportError::Capture(_))));
        assert_eq!(encoder.pushed, 2);
        assert_eq!(encoder.finished, 0);
        assert_eq!(encoder.aborts, 1);
        assert!(!encoder.written);
        assert!(!export.state().is_exporting());
        assert_eq!(player.driver_lock().owner(), None);

        // the pipeline is reusable afterwards
        source.fail_at = None;
        assert!(export.export(&mut player, &mut source, &mut encoder).await.is_ok());
    }

    #[tokio::test]
    async fn test_encode_failure_reported() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut export = pipeline(Arc::new(ManualClock::new())).with_progress(tx);
        let mut player = player(2);
        let mut source = TestSource::default();
        let mut encoder = TestEncoder {
            fail: true,
            ..Default::default()
        };

        let result = export.export(&mut player, &mut source, &mut encoder).await;
        assert!(matches!(result, Err(ExportError::Encode(_))));

        let mut last = None;
        while let Ok(event) = rx.try_recv() {
            last = Some(event);
        }
        assert!(matches!(last, Some(ExportProgress::Failed(_))));
    }

    #[test]
    fn test_progress_fraction() {
        let event = ExportProgress::Captured { captured: 1, total: 4 };
        assert_eq!(event.fraction(), Some(0.25));
        assert_eq!(ExportProgress::Cancelled.fraction(), None);
    }
}
