// src/export/mod.rs
//! Offline rendering of the animation to a video file

mod encoder;
mod frame;
mod pipeline;

pub use encoder::{FfmpegEncoder, VideoEncoder};
pub use frame::{Frame, FrameSource};
pub use pipeline::{ExportHandle, ExportOptions, ExportPipeline, ExportProgress, ExportState};

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExportError {
    #[error("an export is already running")]
    Busy,
    #[error("nothing to export, the track has no points")]
    EmptySequence,
    #[error("export cancelled")]
    Cancelled,
    #[error("no frames were captured")]
    NoFrames,
    #[error("frame capture failed: {0}")]
    Capture(String),
    #[error("video encoding failed: {0}")]
    Encode(String),
}
