// src/display/terminal.rs
//! Terminal-based display implementation

use crate::{
    animation::{PlaybackController, PlaybackState, TickOutcome, Ticker},
    error::Result,
    export::ExportProgress,
    gps::{
        track::{format_distance, format_duration, format_file_size},
        LatLon, TrackPoint, TrackSet,
    },
    map::{Bounds, MapView},
    session::LoadedTrack,
};
use crossterm::{
    cursor::{Hide, MoveTo, Show},
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{disable_raw_mode, enable_raw_mode, Clear, ClearType, DisableLineWrap, EnableLineWrap},
};
use std::{
    io::{self, Write},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

/// Segments longer than this are listed as head and tail only
const LIST_ALL_LIMIT: usize = 10;
const LIST_EDGE: usize = 5;

/// How long the key reader waits before rechecking the running flag
const KEY_POLL: Duration = Duration::from_millis(100);

/// Speed multipliers the speed keys step through
pub const SPEED_STEPS: [f64; 9] = [0.1, 0.25, 0.5, 1.0, 2.0, 4.0, 8.0, 16.0, 32.0];

/// Keyboard controls of the playback screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerCommand {
    TogglePlay,
    Reset,
    Faster,
    Slower,
    ToggleTrail,
    ToggleAutoZoom,
    Quit,
}

impl PlayerCommand {
    pub fn from_key(key: KeyEvent) -> Option<Self> {
        if key.kind == KeyEventKind::Release {
            return None;
        }
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(Self::Quit),
            KeyCode::Char(' ') | KeyCode::Char('p') => Some(Self::TogglePlay),
            KeyCode::Char('r') => Some(Self::Reset),
            KeyCode::Char('+') | KeyCode::Char('=') | KeyCode::Up | KeyCode::Right => Some(Self::Faster),
            KeyCode::Char('-') | KeyCode::Down | KeyCode::Left => Some(Self::Slower),
            KeyCode::Char('t') => Some(Self::ToggleTrail),
            KeyCode::Char('z') => Some(Self::ToggleAutoZoom),
            KeyCode::Char('q') | KeyCode::Esc => Some(Self::Quit),
            _ => None,
        }
    }
}

/// Neighbouring entry of [`SPEED_STEPS`]; stays put at either end
pub fn next_speed(current: f64, faster: bool) -> f64 {
    const EPS: f64 = 1e-9;
    if faster {
        SPEED_STEPS.iter().copied().find(|s| *s > current + EPS).unwrap_or(current)
    } else {
        SPEED_STEPS.iter().rev().copied().find(|s| *s < current - EPS).unwrap_or(current)
    }
}

/// Apply one keyboard command. Returns `false` when playback should end.
pub fn apply_command<T: Ticker, V: MapView + ?Sized>(
    player: &mut PlaybackController<T>,
    view: &mut V,
    command: PlayerCommand,
) -> bool {
    let state = player.state();
    match command {
        PlayerCommand::TogglePlay if state.is_playing => player.pause(),
        PlayerCommand::TogglePlay => {
            // playing again from the end starts over
            if state.current_index >= player.sequence().len() {
                player.reset(view);
            }
            player.play();
        }
        PlayerCommand::Reset => player.reset(view),
        PlayerCommand::Faster => player.change_speed(next_speed(state.speed_multiplier, true)),
        PlayerCommand::Slower => player.change_speed(next_speed(state.speed_multiplier, false)),
        PlayerCommand::ToggleTrail => player.set_trail_enabled(!state.trail_enabled, view),
        PlayerCommand::ToggleAutoZoom => player.set_auto_zoom(!state.auto_zoom_enabled),
        PlayerCommand::Quit => return false,
    }
    true
}

/// Forward key presses as commands until `running` drops or input fails
fn spawn_key_reader(running: Arc<AtomicBool>, commands: UnboundedSender<PlayerCommand>) {
    tokio::task::spawn_blocking(move || {
        while running.load(Ordering::Relaxed) {
            match event::poll(KEY_POLL) {
                Ok(true) => match event::read() {
                    Ok(Event::Key(key)) => {
                        if let Some(command) = PlayerCommand::from_key(key) {
                            if commands.send(command).is_err() {
                                break;
                            }
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        debug!("Key input closed: {}", e);
                        break;
                    }
                },
                Ok(false) => {}
                Err(e) => {
                    debug!("Key input unavailable: {}", e);
                    break;
                }
            }
        }
    });
}

/// Headless map that just remembers what it was told, for status output.
#[derive(Debug, Clone, Default)]
pub struct TerminalView {
    pub marker: Option<LatLon>,
    pub center: Option<LatLon>,
    pub zoom: Option<f64>,
    pub rotation: f64,
    pub trail_len: usize,
    pub trail_visible: bool,
    pub segments: usize,
}

impl TerminalView {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MapView for TerminalView {
    fn draw_tracks(&mut self, tracks: &TrackSet) {
        self.segments = tracks.segments().filter(|s| s.len() >= 2).count();
    }

    fn set_marker(&mut self, position: LatLon) {
        self.marker = Some(position);
    }

    fn set_trail(&mut self, trail: &[LatLon]) {
        self.trail_len = trail.len();
    }

    fn set_trail_visible(&mut self, visible: bool) {
        self.trail_visible = visible;
    }

    fn set_view(&mut self, center: LatLon, zoom: f64) {
        self.center = Some(center);
        self.zoom = Some(zoom);
    }

    fn set_rotation(&mut self, degrees: f64) {
        self.rotation = degrees;
    }

    fn fit_bounds(&mut self, bounds: &Bounds, _padding: u32) {
        self.center = Some(bounds.center());
        self.zoom = None;
    }
}

pub struct TerminalDisplay;

impl TerminalDisplay {
    pub fn new() -> Self {
        Self
    }

    /// Print the file summary and the segment listing
    pub fn print_info(&self, stdout: &mut impl Write, track: &LoadedTrack) -> Result<()> {
        self.render_header(stdout, &format!("GPX Player - {}", track.summary.file_name))?;
        self.render_summary_section(stdout, track)?;
        self.render_segments_section(stdout, &track.tracks)?;
        stdout.flush()?;
        Ok(())
    }

    /// Drive `player` on the terminal until the user quits or `running` drops.
    ///
    /// With a keyboard attached the screen stays up after the last point so
    /// playback can be restarted; without one it ends with the track.
    pub async fn run_playback<T: Ticker>(
        &self,
        player: &mut PlaybackController<T>,
        view: &mut TerminalView,
        track: &LoadedTrack,
        running: Arc<AtomicBool>,
    ) -> Result<()> {
        let (tx, mut commands) = mpsc::unbounded_channel();

        // Ctrl+C outside raw mode arrives as a signal
        let quit = tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = quit.send(PlayerCommand::Quit);
            }
        });

        let interactive = match enable_raw_mode() {
            Ok(()) => {
                spawn_key_reader(Arc::clone(&running), tx);
                true
            }
            Err(e) => {
                warn!("Keyboard controls unavailable: {}", e);
                false
            }
        };

        let mut stdout = io::stdout();
        execute!(stdout, Hide, DisableLineWrap)?;

        player.play();
        let result = self
            .playback_loop(&mut stdout, player, view, track, &running, &mut commands, interactive)
            .await;
        player.pause();
        running.store(false, Ordering::Relaxed);

        if interactive {
            disable_raw_mode()?;
        }
        execute!(stdout, Clear(ClearType::All), MoveTo(0, 0))?;
        self.render_playback(&mut stdout, &player.state(), view, track)?;
        execute!(stdout, Show, EnableLineWrap)?;
        println!("\nPlayback stopped.");
        result
    }

    #[allow(clippy::too_many_arguments)]
    async fn playback_loop<T: Ticker>(
        &self,
        stdout: &mut impl Write,
        player: &mut PlaybackController<T>,
        view: &mut TerminalView,
        track: &LoadedTrack,
        running: &AtomicBool,
        commands: &mut UnboundedReceiver<PlayerCommand>,
        interactive: bool,
    ) -> Result<()> {
        while running.load(Ordering::Relaxed) {
            self.draw_playback_screen(stdout, &player.state(), view, track)?;

            tokio::select! {
                outcome = player.step(view), if player.is_playing() => match outcome {
                    Some(TickOutcome::Finished) if !interactive => break,
                    None => break,
                    Some(_) => {}
                },
                Some(command) = commands.recv() => {
                    if !apply_command(player, view, command) {
                        break;
                    }
                }
                else => break,
            }
        }
        Ok(())
    }

    /// Full playback screen; line ends carry a carriage return for raw mode
    fn draw_playback_screen(
        &self,
        stdout: &mut impl Write,
        state: &PlaybackState,
        view: &TerminalView,
        track: &LoadedTrack,
    ) -> Result<()> {
        let mut screen = Vec::new();
        self.render_playback(&mut screen, state, view, track)?;
        let screen = String::from_utf8_lossy(&screen).replace('\n', "\r\n");
        execute!(stdout, Clear(ClearType::All), MoveTo(0, 0), Print(screen))?;
        stdout.flush()?;
        Ok(())
    }

    /// One line of export progress; capture updates overwrite each other
    pub fn render_export_progress(&self, stdout: &mut impl Write, event: &ExportProgress) -> Result<()> {
        match event {
            ExportProgress::Started { total } => {
                execute!(stdout, Print(format!("Capturing {} frames\n", total)))?
            }
            ExportProgress::Captured { captured, total } => {
                let percent = event.fraction().unwrap_or(0.0) * 100.0;
                execute!(
                    stdout,
                    Print(format!("\r  frame {}/{} ({:.0}%)", captured, total, percent))
                )?
            }
            ExportProgress::Encoding { frames } => {
                execute!(stdout, Print(format!("\nFinishing video ({} frames)...\n", frames)))?
            }
            ExportProgress::Finished { path } => execute!(
                stdout,
                SetForegroundColor(Color::Green),
                Print(format!("Saved {}\n", path.display())),
                ResetColor
            )?,
            ExportProgress::Cancelled => execute!(
                stdout,
                SetForegroundColor(Color::Yellow),
                Print("\nExport cancelled\n"),
                ResetColor
            )?,
            ExportProgress::Failed(reason) => execute!(
                stdout,
                SetForegroundColor(Color::Red),
                Print(format!("\nExport failed: {}\n", reason)),
                ResetColor
            )?,
        }
        stdout.flush()?;
        Ok(())
    }

    fn render_header(&self, stdout: &mut impl Write, title: &str) -> Result<()> {
        execute!(
            stdout,
            SetForegroundColor(Color::Green),
            Print("=".repeat(60)),
            Print("\n"),
            Print(title),
            Print("\n"),
            Print("=".repeat(60)),
            Print("\n"),
            ResetColor
        )?;
        Ok(())
    }

    fn render_summary_section(&self, stdout: &mut impl Write, track: &LoadedTrack) -> Result<()> {
        let summary = &track.summary;
        execute!(
            stdout,
            SetForegroundColor(Color::Yellow),
            Print("FILE:\n"),
            ResetColor,
            Print(format!("  Name:      {}\n", summary.file_name)),
            Print(format!("  Size:      {}\n", format_file_size(summary.file_size))),
            Print(format!("  Tracks:    {}\n", track.tracks.tracks.len())),
            Print(format!("  Points:    {}\n", summary.points)),
            Print(format!("  Distance:  {}\n", format_distance(summary.distance_km))),
        )?;

        match &summary.timing {
            Some(timing) => execute!(
                stdout,
                Print(format!("  Duration:  {}\n", format_duration(timing.duration))),
                Print(format!("  Timed:     {} points\n", timing.timed_points)),
            )?,
            None => execute!(stdout, Print("  Duration:  N/A (no timestamps)\n"))?,
        }

        execute!(
            stdout,
            Print(format!("  Animation: {} steps\n\n", summary.interpolated_points))
        )?;
        Ok(())
    }

    fn render_segments_section(&self, stdout: &mut impl Write, tracks: &TrackSet) -> Result<()> {
        if tracks.is_empty() {
            execute!(
                stdout,
                SetForegroundColor(Color::Red),
                Print("No tracks found in this file.\n"),
                ResetColor
            )?;
            return Ok(());
        }

        for track in &tracks.tracks {
            execute!(
                stdout,
                SetForegroundColor(Color::Cyan),
                Print(format!("TRACK: {}\n", track.name)),
                ResetColor
            )?;

            for (index, segment) in track.segments.iter().enumerate() {
                execute!(
                    stdout,
                    Print(format!("  Segment {} ({} points)\n", index + 1, segment.len()))
                )?;
                for line in segment_listing(&segment.points) {
                    execute!(stdout, Print(format!("    {}\n", line)))?;
                }
            }
            execute!(stdout, Print("\n"))?;
        }
        Ok(())
    }

    fn render_playback(
        &self,
        stdout: &mut impl Write,
        state: &PlaybackState,
        view: &TerminalView,
        track: &LoadedTrack,
    ) -> Result<()> {
        self.render_header(stdout, &format!("GPX Player - {}", track.summary.file_name))?;

        let total = track.sequence.len();
        let status = if state.is_playing {
            "Playing"
        } else if total > 0 && state.current_index >= total {
            "Finished"
        } else {
            "Paused"
        };
        execute!(
            stdout,
            SetForegroundColor(Color::Yellow),
            Print("PLAYBACK:\n"),
            ResetColor,
            Print(format!("  Status:    {} ({}x)\n", status, state.speed_multiplier)),
            Print(format!(
                "  Auto-zoom: {}\n",
                if state.auto_zoom_enabled { "on" } else { "off" }
            )),
            Print(format!("  Progress:  {} / {}\n", state.current_index.min(total), total)),
        )?;

        let point = state
            .current_index
            .checked_sub(1)
            .and_then(|i| track.sequence.get(i));
        execute!(
            stdout,
            SetForegroundColor(Color::Cyan),
            Print("\nPOSITION:\n"),
            ResetColor
        )?;
        match point {
            Some(p) => execute!(
                stdout,
                Print(format!("  Latitude:  {}\n", TrackPoint::format_coordinate(p.lat))),
                Print(format!("  Longitude: {}\n", TrackPoint::format_coordinate(p.lon))),
                Print(format!("  Elevation: {}\n", p.format_elevation())),
                Print(format!("  Time:      {}\n", p.format_time())),
            )?,
            None => execute!(stdout, Print("  Waiting for first step\n"))?,
        }

        execute!(
            stdout,
            SetForegroundColor(Color::Magenta),
            Print("\nVIEW:\n"),
            ResetColor,
            Print(format!(
                "  Zoom:      {}\n",
                view.zoom.map_or("fit".to_string(), |z| format!("{:.0}", z))
            )),
            Print(format!("  Rotation:  {:.1}\u{b0}\n", view.rotation)),
            Print(format!(
                "  Trail:     {} points{}\n",
                view.trail_len,
                if state.trail_enabled { "" } else { " (hidden)" }
            )),
            SetForegroundColor(Color::Green),
            Print("\n"),
            Print("=".repeat(60)),
            Print("\nSpace play/pause  r reset  +/- speed  t trail  z auto-zoom  q quit\n"),
            ResetColor
        )?;
        Ok(())
    }
}

impl Default for TerminalDisplay {
    fn default() -> Self {
        Self::new()
    }
}

fn point_line(number: usize, point: &TrackPoint) -> String {
    format!(
        "{:>5}. {}, {}  {:>9}  {}",
        number,
        TrackPoint::format_coordinate(point.lat),
        TrackPoint::format_coordinate(point.lon),
        point.format_elevation(),
        point.format_time()
    )
}

/// Lines describing a segment's points; long segments show head and tail
pub fn segment_listing(points: &[TrackPoint]) -> Vec<String> {
    if points.len() <= LIST_ALL_LIMIT {
        return points
            .iter()
            .enumerate()
            .map(|(i, p)| point_line(i + 1, p))
            .collect();
    }

    let tail_start = points.len() - LIST_EDGE;
    let mut lines: Vec<String> = points[..LIST_EDGE]
        .iter()
        .enumerate()
        .map(|(i, p)| point_line(i + 1, p))
        .collect();
    lines.push(format!("  ... {} more points ...", tail_start - LIST_EDGE));
    lines.extend(
        points[tail_start..]
            .iter()
            .enumerate()
            .map(|(i, p)| point_line(tail_start + i + 1, p)),
    );
    lines
}
