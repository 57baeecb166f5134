use autoclip_core::types::TimeUs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tokio::runtime::{Handle, RuntimeFlavor};

use crate::error::{RenderError, Result};

/// What the renderer needs to know about a media file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProbeResult {
    pub duration_us: TimeUs,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub codec: String,
    pub audio_channels: u32,
}

impl ProbeResult {
    pub fn has_video(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// Reads duration and geometry of media files. Implemented by [`Ffprobe`];
/// tests substitute fixed tables.
pub trait MediaProbe: Send + Sync {
    fn probe(&self, path: &Path) -> Result<ProbeResult>;
}

// ---------------------------------------------------------------------------
// Raw ffprobe JSON
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    format: FfprobeFormat,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    duration: Option<String>,
    channels: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

// ---------------------------------------------------------------------------
// Ffprobe
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Ffprobe {
    binary: PathBuf,
}

impl Ffprobe {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for Ffprobe {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

/// Run a child process to completion. On a multi-threaded runtime the
/// worker hands its other tasks off first so in-flight encodes keep moving.
fn run_blocking(f: impl FnOnce() -> std::io::Result<Output>) -> std::io::Result<Output> {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}

impl MediaProbe for Ffprobe {
    fn probe(&self, path: &Path) -> Result<ProbeResult> {
        if !path.exists() {
            return Err(RenderError::FileNotFound(path.to_path_buf()));
        }

        let output = run_blocking(|| {
            Command::new(&self.binary)
                .args([
                    "-v",
                    "quiet",
                    "-print_format",
                    "json",
                    "-show_format",
                    "-show_streams",
                ])
                .arg(path)
                .output()
        })
        .map_err(|e| RenderError::FfprobeExec(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RenderError::FfprobeFailed(format!(
                "{}: {}",
                path.display(),
                stderr.trim()
            )));
        }

        let probe: FfprobeOutput = serde_json::from_slice(&output.stdout)?;
        Ok(parse_probe_output(&probe))
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

fn parse_probe_output(probe: &FfprobeOutput) -> ProbeResult {
    let video_stream = probe.streams.iter().find(|s| s.codec_type == "video");
    let audio_stream = probe.streams.iter().find(|s| s.codec_type == "audio");

    // Container duration first; some muxers only report it per stream.
    let duration_us = probe
        .format
        .duration
        .as_deref()
        .or_else(|| video_stream.and_then(|s| s.duration.as_deref()))
        .or_else(|| audio_stream.and_then(|s| s.duration.as_deref()))
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .map(TimeUs::from_seconds)
        .unwrap_or(TimeUs::ZERO);

    let fps = video_stream
        .and_then(|s| s.r_frame_rate.as_deref())
        .and_then(parse_frame_rate)
        .unwrap_or(0.0);

    let codec = video_stream
        .and_then(|s| s.codec_name.clone())
        .or_else(|| audio_stream.and_then(|s| s.codec_name.clone()))
        .unwrap_or_default();

    ProbeResult {
        duration_us,
        width: video_stream.and_then(|s| s.width).unwrap_or(0),
        height: video_stream.and_then(|s| s.height).unwrap_or(0),
        fps,
        codec,
        audio_channels: audio_stream.and_then(|s| s.channels).unwrap_or(0),
    }
}

/// `30000/1001`, `30/1` or a plain decimal; `None` for a zero denominator.
fn parse_frame_rate(rate: &str) -> Option<f64> {
    if let Some((num, den)) = rate.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den == 0.0 {
            None
        } else {
            Some(num / den)
        }
    } else {
        rate.parse().ok()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
