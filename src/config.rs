// src/config.rs
//! Player settings persisted as JSON under the user's config directory

use crate::error::{PlayerError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub speed: f64,
    pub trail_enabled: bool,
    pub auto_zoom: bool,
    pub playback_zoom: f64,
    pub export_zoom: f64,
    pub lookahead: usize,
    pub rotation_threshold_deg: f64,
    pub export_fps: u32,
    pub settle_delay_ms: u64,
    pub frame_width: u32,
    pub frame_height: u32,
    pub ffmpeg_path: String,
    pub output_path: PathBuf,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            speed: 1.0,
            trail_enabled: true,
            auto_zoom: true,
            playback_zoom: 17.0,
            export_zoom: 18.0,
            lookahead: 30,
            rotation_threshold_deg: 2.0,
            export_fps: 30,
            settle_delay_ms: 100,
            frame_width: 1280,
            frame_height: 720,
            ffmpeg_path: "ffmpeg".to_string(),
            output_path: PathBuf::from("gpx-animation.webm"),
        }
    }
}

impl PlayerConfig {
    /// Load from the default location, falling back to defaults when absent
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| PlayerError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| PlayerError::Config(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        self.validate()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| PlayerError::Config(format!("Failed to create config directory: {}", e)))?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .map_err(|e| PlayerError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = std::env::var("HOME")
            .map_err(|_| PlayerError::Config("HOME environment variable not set".to_string()))?;

        Ok(PathBuf::from(home).join(".config").join("gpx-player").join("config.json"))
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.speed.is_finite() && self.speed > 0.0) {
            return Err(PlayerError::Config(format!("speed must be positive, got {}", self.speed)));
        }
        if self.export_fps == 0 {
            return Err(PlayerError::Config("export_fps must be at least 1".to_string()));
        }
        if self.frame_width == 0 || self.frame_height == 0 {
            return Err(PlayerError::Config(format!(
                "frame size {}x{} is empty",
                self.frame_width, self.frame_height
            )));
        }
        Ok(())
    }

    /// Update playback settings
    pub fn update_playback(&mut self, speed: f64, trail_enabled: bool, auto_zoom: bool) {
        self.speed = speed;
        self.trail_enabled = trail_enabled;
        self.auto_zoom = auto_zoom;
    }

    /// Update export settings
    pub fn update_export(&mut self, output: PathBuf, fps: u32, width: u32, height: u32) {
        self.output_path = output;
        self.export_fps = fps;
        self.frame_width = width;
        self.frame_height = height;
    }
}
