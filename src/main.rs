// src/main.rs
//! GPX Player - animate GPX tracks in the terminal or export them as video

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use gpx_player::{
    animation::{TokioClock, TokioTicker},
    display::{TerminalDisplay, TerminalView},
    export::FfmpegEncoder,
    LoadedTrack, PlayerConfig, Session,
};
use std::{
    io,
    path::{Path, PathBuf},
    sync::{atomic::AtomicBool, Arc},
};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gpx-player", version, about = "Animate GPX tracks and export them as video")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Show the file summary and list every segment
    Info { file: PathBuf },

    /// Play the track in the terminal (space pauses, +/- change speed, q quits)
    Play {
        file: PathBuf,
        /// Speed multiplier
        #[arg(short, long)]
        speed: Option<f64>,
        #[arg(long)]
        no_trail: bool,
        /// Keep the default framing instead of following the marker
        #[arg(long)]
        no_auto_zoom: bool,
    },

    /// Render every animation step and encode a WebM video
    Export {
        file: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        fps: Option<u32>,
        #[arg(long)]
        width: Option<u32>,
        #[arg(long)]
        height: Option<u32>,
        #[arg(long)]
        no_auto_zoom: bool,
    },

    /// Show or change the saved settings
    Config {
        #[arg(long)]
        speed: Option<f64>,
        #[arg(long)]
        trail: Option<bool>,
        #[arg(long)]
        auto_zoom: Option<bool>,
        #[arg(long)]
        ffmpeg: Option<String>,
        /// Restore the defaults
        #[arg(long)]
        reset: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "gpx_player=debug" } else { "gpx_player=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load_track(file: &Path) -> Result<LoadedTrack> {
    LoadedTrack::open(file).with_context(|| format!("Failed to load {}", file.display()))
}

/// Playing or exporting a file without points is a no-op with a note
fn empty_track_notice(track: &LoadedTrack, file: &Path) -> Option<String> {
    track
        .is_empty()
        .then(|| format!("No track points found in {}, nothing to do", file.display()))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = PlayerConfig::load().unwrap_or_else(|e| {
        warn!("{}; using default settings", e);
        PlayerConfig::default()
    });

    match cli.command {
        Command::Info { file } => {
            let track = load_track(&file)?;
            TerminalDisplay::new().print_info(&mut io::stdout(), &track)?;
        }

        Command::Play {
            file,
            speed,
            no_trail,
            no_auto_zoom,
        } => {
            let speed = speed.unwrap_or(config.speed);
            let trail = config.trail_enabled && !no_trail;
            let auto_zoom = config.auto_zoom && !no_auto_zoom;
            config.update_playback(speed, trail, auto_zoom);
            config.validate()?;

            let track = load_track(&file)?;
            if let Some(message) = empty_track_notice(&track, &file) {
                println!("{}", message);
                return Ok(());
            }

            let session = Session::new(track, config);
            let mut view = TerminalView::new();
            session.prepare_view(&mut view);
            let mut player = session.player(TokioTicker::new());

            let running = Arc::new(AtomicBool::new(true));
            TerminalDisplay::new()
                .run_playback(&mut player, &mut view, session.track(), running)
                .await?;
        }

        Command::Export {
            file,
            output,
            fps,
            width,
            height,
            no_auto_zoom,
        } => {
            let output = output.unwrap_or_else(|| config.output_path.clone());
            let fps = fps.unwrap_or(config.export_fps);
            let width = width.unwrap_or(config.frame_width);
            let height = height.unwrap_or(config.frame_height);
            config.update_export(output, fps, width, height);
            config.auto_zoom = config.auto_zoom && !no_auto_zoom;
            config.validate()?;

            let track = load_track(&file)?;
            if let Some(message) = empty_track_notice(&track, &file) {
                println!("{}", message);
                return Ok(());
            }

            let session = Session::new(track, config);
            let mut map = session.raster_map();
            let mut player = session.player(TokioTicker::new());
            let mut encoder = FfmpegEncoder::from_config(session.config());

            let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
            let mut pipeline = session.exporter(Arc::new(TokioClock::new())).with_progress(tx);

            let handle = pipeline.handle();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    handle.cancel();
                }
            });

            let printer = tokio::spawn(async move {
                let display = TerminalDisplay::new();
                let mut stdout = io::stdout();
                while let Some(event) = rx.recv().await {
                    if let Err(e) = display.render_export_progress(&mut stdout, &event) {
                        warn!("Failed to print progress: {}", e);
                    }
                }
            });

            let result = pipeline.export(&mut player, &mut map, &mut encoder).await;
            drop(pipeline);
            let _ = printer.await;

            result.with_context(|| format!("Failed to export {}", file.display()))?;
        }

        Command::Config {
            speed,
            trail,
            auto_zoom,
            ffmpeg,
            reset,
        } => {
            if reset {
                config = PlayerConfig::default();
            }
            let changed = reset || speed.is_some() || trail.is_some() || auto_zoom.is_some() || ffmpeg.is_some();

            let speed = speed.unwrap_or(config.speed);
            let trail = trail.unwrap_or(config.trail_enabled);
            let auto_zoom = auto_zoom.unwrap_or(config.auto_zoom);
            config.update_playback(speed, trail, auto_zoom);
            if let Some(path) = ffmpeg {
                config.ffmpeg_path = path;
            }

            if changed {
                if let Err(e) = config.validate() {
                    bail!("Refusing to save settings: {}", e);
                }
                config.save().context("Failed to save settings")?;
                println!("Settings saved to {}", PlayerConfig::config_path()?.display());
            }
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_a_notice_not_an_error() {
        let empty = LoadedTrack::from_gpx("empty.gpx", "<gpx version=\"1.1\"></gpx>").unwrap();
        let notice = empty_track_notice(&empty, Path::new("empty.gpx")).unwrap();
        assert!(notice.contains("empty.gpx"));

        let walk = LoadedTrack::from_gpx(
            "walk.gpx",
            r#"<gpx><trk><trkseg><trkpt lat="1" lon="2"/></trkseg></trk></gpx>"#,
        )
        .unwrap();
        assert_eq!(empty_track_notice(&walk, Path::new("walk.gpx")), None);
    }
}
