// src/export/encoder.rs
//! Video encoding of captured frames

use super::{ExportError, Frame};
use crate::config::PlayerConfig;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Lines of encoder stderr kept for error reports
const STDERR_TAIL: usize = 50;

/// Consumes frames one at a time and produces a video artifact.
///
/// A stream is opened with `begin`, fed with `push_frame` and closed with
/// either `finish` (keep the result) or `abort` (leave nothing behind).
#[async_trait]
pub trait VideoEncoder: Send {
    /// Open a `width` x `height` stream at `fps`
    async fn begin(&mut self, width: u32, height: u32, fps: u32) -> Result<(), ExportError>;

    async fn push_frame(&mut self, frame: &Frame) -> Result<(), ExportError>;

    /// Close the stream and return the path of the produced file
    async fn finish(&mut self) -> Result<PathBuf, ExportError>;

    /// Drop the stream and any partial output. Idempotent.
    async fn abort(&mut self);
}

/// A running ffmpeg process writing to the partial output file
#[derive(Debug)]
struct Stream {
    child: Child,
    stdin: Option<ChildStdin>,
    stderr_task: Option<JoinHandle<VecDeque<String>>>,
    size: (u32, u32),
    frames: usize,
}

impl Stream {
    /// Close stdin, wait for exit and collect the stderr tail
    async fn close(mut self) -> (io::Result<ExitStatus>, VecDeque<String>) {
        let mut shutdown = Ok(());
        if let Some(mut stdin) = self.stdin.take() {
            shutdown = stdin.shutdown().await;
        }
        let status = self.child.wait().await;
        let tail = match self.stderr_task.take() {
            Some(task) => task.await.unwrap_or_default(),
            None => VecDeque::new(),
        };
        // a failed shutdown only matters if ffmpeg otherwise looks fine
        let status = match (status, shutdown) {
            (Ok(status), Err(e)) if status.success() => Err(e),
            (status, _) => status,
        };
        (status, tail)
    }

    async fn kill(mut self) {
        drop(self.stdin.take());
        if let Err(e) = self.child.start_kill() {
            debug!("FFmpeg already exited: {}", e);
        }
        let _ = self.child.wait().await;
        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }
    }
}

/// Pipes raw RGBA frames into an `ffmpeg` process producing VP9 WebM.
///
/// ffmpeg writes to a hidden sibling of the output path, which is renamed
/// into place only when encoding succeeds.
#[derive(Debug)]
pub struct FfmpegEncoder {
    program: String,
    output: PathBuf,
    stream: Option<Stream>,
}

impl FfmpegEncoder {
    pub fn new(program: impl Into<String>, output: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            output: output.into(),
            stream: None,
        }
    }

    pub fn from_config(config: &PlayerConfig) -> Self {
        Self::new(config.ffmpeg_path.clone(), config.output_path.clone())
    }

    pub fn output(&self) -> &PathBuf {
        &self.output
    }

    /// Where ffmpeg writes while encoding
    pub fn partial_path(&self) -> PathBuf {
        let name = self
            .output
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "gpx-animation.webm".to_string());
        self.output.with_file_name(format!(".{}.partial", name))
    }

    /// Command line arguments for a `width` x `height` stream at `fps`
    pub fn args(&self, width: u32, height: u32, fps: u32) -> Vec<String> {
        let mut args: Vec<String> = [
            "-y", "-f", "rawvideo", "-pix_fmt", "rgba", "-s",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        args.push(format!("{}x{}", width, height));
        args.push("-r".to_string());
        args.push(fps.to_string());
        args.extend(
            [
                "-i", "-", "-an", "-c:v", "libvpx-vp9", "-b:v", "0", "-crf", "33", "-pix_fmt", "yuv420p",
                // the partial file name says nothing about the container
                "-f", "webm",
            ]
            .iter()
            .map(|s| s.to_string()),
        );
        args.push(self.partial_path().to_string_lossy().into_owned());
        args
    }

    async fn fail(&self, stream: Stream, reason: String) -> ExportError {
        let (status, tail) = stream.close().await;
        discard(&self.partial_path()).await;
        let excerpt = error_excerpt(&tail);
        let mut message = match status {
            Ok(status) if !status.success() => format!("{} (FFmpeg exited with {})", reason, status),
            _ => reason,
        };
        if !excerpt.is_empty() {
            message.push('\n');
            message.push_str(&excerpt.join("\n"));
        }
        ExportError::Encode(message)
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.child.start_kill();
            let _ = std::fs::remove_file(self.partial_path());
        }
    }
}

async fn collect_tail(stderr: ChildStderr) -> VecDeque<String> {
    let mut lines = BufReader::new(stderr).lines();
    let mut tail = VecDeque::new();
    while let Ok(Some(line)) = lines.next_line().await {
        tail.push_back(line);
        if tail.len() > STDERR_TAIL {
            tail.pop_front();
        }
    }
    tail
}

fn error_excerpt(tail: &VecDeque<String>) -> Vec<String> {
    tail.iter()
        .filter(|line| {
            line.contains("Error")
                || line.contains("error")
                || line.contains("Invalid")
                || line.contains("Failed")
                || line.contains("failed")
        })
        .cloned()
        .collect()
}

async fn discard(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed partial output {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
    }
}

#[async_trait]
impl VideoEncoder for FfmpegEncoder {
    async fn begin(&mut self, width: u32, height: u32, fps: u32) -> Result<(), ExportError> {
        self.abort().await;

        info!(
            "Encoding {}x{} @ {} fps to {}",
            width,
            height,
            fps,
            self.output.display()
        );

        let mut child = Command::new(&self.program)
            .args(self.args(width, height, fps))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExportError::Encode(format!("Failed to start FFmpeg ({}): {}", self.program, e)))?;

        let stdin = child.stdin.take();
        let stderr_task = child.stderr.take().map(|stderr| tokio::spawn(collect_tail(stderr)));
        self.stream = Some(Stream {
            child,
            stdin,
            stderr_task,
            size: (width, height),
            frames: 0,
        });
        Ok(())
    }

    async fn push_frame(&mut self, frame: &Frame) -> Result<(), ExportError> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(ExportError::Encode("no encoding stream is open".to_string()));
        };

        if frame.dimensions() != stream.size {
            let (w, h) = frame.dimensions();
            let (width, height) = stream.size;
            let reason = format!(
                "frame {} is {}x{}, expected {}x{}",
                stream.frames, w, h, width, height
            );
            self.abort().await;
            return Err(ExportError::Encode(reason));
        }

        let written = match stream.stdin.as_mut() {
            Some(stdin) => stdin.write_all(frame.as_raw()).await,
            None => Err(io::Error::new(io::ErrorKind::BrokenPipe, "FFmpeg stdin is closed")),
        };
        match written {
            Ok(()) => {
                stream.frames += 1;
                Ok(())
            }
            Err(e) => {
                let reason = format!("Failed to stream frames to FFmpeg: {}", e);
                match self.stream.take() {
                    Some(stream) => Err(self.fail(stream, reason).await),
                    None => Err(ExportError::Encode(reason)),
                }
            }
        }
    }

    async fn finish(&mut self) -> Result<PathBuf, ExportError> {
        let Some(stream) = self.stream.take() else {
            return Err(ExportError::NoFrames);
        };
        if stream.frames == 0 {
            stream.kill().await;
            discard(&self.partial_path()).await;
            return Err(ExportError::NoFrames);
        }

        let frames = stream.frames;
        let (status, tail) = stream.close().await;
        let partial = self.partial_path();

        let status = match status {
            Ok(status) => status,
            Err(e) => {
                discard(&partial).await;
                return Err(ExportError::Encode(format!("Failed to finish FFmpeg: {}", e)));
            }
        };
        if !status.success() {
            discard(&partial).await;
            let excerpt = error_excerpt(&tail);
            if excerpt.is_empty() {
                return Err(ExportError::Encode(format!("FFmpeg failed with status: {}", status)));
            }
            return Err(ExportError::Encode(format!(
                "FFmpeg failed with status: {}\n{}",
                status,
                excerpt.join("\n")
            )));
        }

        if let Err(e) = tokio::fs::rename(&partial, &self.output).await {
            discard(&partial).await;
            return Err(ExportError::Encode(format!(
                "Failed to move video to {}: {}",
                self.output.display(),
                e
            )));
        }

        debug!("FFmpeg finished after {} frames: {}", frames, status);
        Ok(self.output.clone())
    }

    async fn abort(&mut self) {
        if let Some(stream) = self.stream.take() {
            debug!("Aborting FFmpeg after {} frames", stream.frames);
            stream.kill().await;
            discard(&self.partial_path()).await;
        }
    }
}
