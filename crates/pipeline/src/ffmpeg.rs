//! Video resource provider backed by the `ffprobe` and `ffmpeg` binaries.
//!
//! Opening a reference probes the first video stream for its geometry,
//! then spawns `ffmpeg` decoding to raw RGB24 on stdout. Each read pulls
//! exactly one frame's worth of bytes from the pipe.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};

use reel_core::error::CoreError;
use reel_core::unit::Frame;

use crate::producer::{ReadOutcome, ResourceHandle, ResourceProvider};

/// Largest frame width the decoder will accept.
pub const MAX_FRAME_WIDTH: u32 = 1920;

/// Largest frame height the decoder will accept.
pub const MAX_FRAME_HEIGHT: u32 = 1080;

// ---------------------------------------------------------------------------
// ffprobe JSON output structures
// ---------------------------------------------------------------------------

/// Top-level ffprobe JSON output (`-print_format json -show_streams`).
#[derive(Debug, Deserialize)]
pub struct FfprobeOutput {
    #[serde(default)]
    pub streams: Vec<FfprobeStream>,
}

/// A single stream from ffprobe output.
#[derive(Debug, Deserialize)]
pub struct FfprobeStream {
    pub codec_type: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// e.g. "30/1" or "24000/1001"
    pub r_frame_rate: Option<String>,
    pub nb_frames: Option<String>,
}

/// Geometry of the stream being decoded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub frame_count: Option<u64>,
}

impl VideoInfo {
    /// Extract the first video stream's geometry from probe output.
    pub fn from_probe(probe: &FfprobeOutput) -> Option<Self> {
        let stream = probe
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("video"))?;

        Some(Self {
            width: stream.width?,
            height: stream.height?,
            fps: stream
                .r_frame_rate
                .as_deref()
                .map(parse_fraction)
                .unwrap_or(0.0),
            frame_count: stream.nb_frames.as_deref().and_then(|n| n.parse().ok()),
        })
    }

    pub fn frame_len(&self) -> usize {
        Frame::expected_len(self.width, self.height)
    }
}

/// Parse a fraction string like `"30/1"` into a float.
fn parse_fraction(s: &str) -> f64 {
    match s.split_once('/') {
        Some((num, den)) => {
            let num = num.parse::<f64>().unwrap_or(0.0);
            let den = den.parse::<f64>().unwrap_or(1.0);
            if den > 0.0 {
                num / den
            } else {
                0.0
            }
        }
        None => s.parse::<f64>().unwrap_or(0.0),
    }
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// Decodes local video files into RGB24 frames.
#[derive(Debug, Clone)]
pub struct FfmpegProvider {
    ffmpeg_bin: String,
    ffprobe_bin: String,
}

impl FfmpegProvider {
    pub fn new() -> Self {
        Self {
            ffmpeg_bin: "ffmpeg".to_string(),
            ffprobe_bin: "ffprobe".to_string(),
        }
    }

    /// Use explicit binary paths instead of looking them up on `PATH`.
    pub fn with_binaries(ffmpeg_bin: impl Into<String>, ffprobe_bin: impl Into<String>) -> Self {
        Self {
            ffmpeg_bin: ffmpeg_bin.into(),
            ffprobe_bin: ffprobe_bin.into(),
        }
    }

    async fn probe(&self, path: &Path, reference: &str) -> Result<VideoInfo, CoreError> {
        let output = Command::new(&self.ffprobe_bin)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_streams",
                "-select_streams",
                "v:0",
            ])
            .arg(path)
            .output()
            .await
            .map_err(|e| CoreError::unavailable(reference, format!("ffprobe not runnable: {e}")))?;

        if !output.status.success() {
            return Err(CoreError::unavailable(
                reference,
                format!("ffprobe exited with {:?}", output.status.code()),
            ));
        }

        let probe: FfprobeOutput = serde_json::from_slice(&output.stdout).map_err(|e| {
            CoreError::unavailable(reference, format!("unreadable ffprobe output: {e}"))
        })?;

        VideoInfo::from_probe(&probe)
            .ok_or_else(|| CoreError::unavailable(reference, "no video stream"))
    }
}

impl Default for FfmpegProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResourceProvider for FfmpegProvider {
    async fn open(&self, reference: &str) -> Result<Box<dyn ResourceHandle>, CoreError> {
        let path = Path::new(reference);
        if !path.is_file() {
            return Err(CoreError::unavailable(reference, "Cannot open video file"));
        }

        let info = self.probe(path, reference).await?;
        if info.width == 0
            || info.height == 0
            || info.width > MAX_FRAME_WIDTH
            || info.height > MAX_FRAME_HEIGHT
        {
            return Err(CoreError::unavailable(
                reference,
                format!(
                    "unsupported resolution {}x{} (max {MAX_FRAME_WIDTH}x{MAX_FRAME_HEIGHT})",
                    info.width, info.height
                ),
            ));
        }

        let mut child = Command::new(&self.ffmpeg_bin)
            .args(["-v", "error", "-nostdin", "-i"])
            .arg(path)
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CoreError::unavailable(reference, format!("ffmpeg not runnable: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CoreError::Internal("ffmpeg stdout was not captured".to_string()))?;

        tracing::debug!(
            resource = %reference,
            width = info.width,
            height = info.height,
            fps = info.fps,
            frames = ?info.frame_count,
            "Video decoder started",
        );

        Ok(Box::new(FfmpegHandle {
            reference: reference.to_string(),
            info,
            stdout: BufReader::new(stdout),
            child,
        }))
    }
}

/// A running decoder. Dropping it kills the `ffmpeg` process.
struct FfmpegHandle {
    reference: String,
    info: VideoInfo,
    stdout: BufReader<ChildStdout>,
    child: Child,
}

impl FfmpegHandle {
    /// Classify stdout EOF by the decoder's exit status.
    async fn finish(&mut self) -> Result<ReadOutcome, CoreError> {
        let status = self.child.wait().await.map_err(|e| {
            CoreError::unavailable(&self.reference, format!("ffmpeg wait failed: {e}"))
        })?;

        if status.success() {
            Ok(ReadOutcome::EndOfResource)
        } else {
            tracing::warn!(
                resource = %self.reference,
                code = ?status.code(),
                "Video decoder exited abnormally",
            );
            Err(CoreError::unavailable(
                &self.reference,
                format!("ffmpeg exited with {:?}", status.code()),
            ))
        }
    }
}

#[async_trait]
impl ResourceHandle for FfmpegHandle {
    async fn read_next(&mut self) -> Result<ReadOutcome, CoreError> {
        let mut data = vec![0u8; self.info.frame_len()];
        match self.stdout.read_exact(&mut data).await {
            Ok(_) => Ok(ReadOutcome::Frame(Frame::new(
                self.info.width,
                self.info.height,
                data,
            ))),
            // A truncated trailing frame is dropped; the exit status decides
            // whether the stream ended or the decoder failed.
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => self.finish().await,
            Err(e) => Err(CoreError::unavailable(
                &self.reference,
                format!("decode failed: {e}"),
            )),
        }
    }

    fn unit_count_hint(&self) -> Option<u64> {
        self.info.frame_count
    }
}
