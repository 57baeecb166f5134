use autoclip_core::types::TimeUs;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::sync::watch;

use crate::error::{RenderError, Result};

/// Lines of encoder stderr kept for error reports.
const STDERR_TAIL: usize = 12;

/// One encoder input with its per-input options (`-ss`, `-f lavfi`, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EncoderInput {
    pub options: Vec<String>,
    pub source: String,
}

impl EncoderInput {
    pub fn file(path: &Path) -> Self {
        Self {
            options: Vec::new(),
            source: path.to_string_lossy().into_owned(),
        }
    }

    /// `-ss start -t duration -i path`
    pub fn segment(path: &Path, start: TimeUs, duration: TimeUs) -> Self {
        Self {
            options: vec![
                "-ss".into(),
                secs(start),
                "-t".into(),
                secs(duration),
            ],
            source: path.to_string_lossy().into_owned(),
        }
    }

    /// A lavfi source graph such as `color=c=black:s=64x64:d=1`.
    pub fn lavfi(graph: &str) -> Self {
        Self {
            options: vec!["-f".into(), "lavfi".into()],
            source: graph.to_string(),
        }
    }

    pub fn with_options(mut self, options: &[&str]) -> Self {
        self.options.extend(options.iter().map(|o| o.to_string()));
        self
    }
}

/// A complete encoder command line, ready to run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Invocation {
    pub inputs: Vec<EncoderInput>,
    pub filter_graph: Option<String>,
    pub output_args: Vec<String>,
    pub output_path: PathBuf,
    /// Expected output length, for progress reporting.
    pub duration_us: TimeUs,
}

impl Invocation {
    pub fn args(&self) -> Vec<String> {
        let mut args = vec!["-y".to_string(), "-hide_banner".to_string()];

        for input in &self.inputs {
            args.extend(input.options.iter().cloned());
            args.push("-i".to_string());
            args.push(input.source.clone());
        }

        if let Some(graph) = &self.filter_graph {
            args.push("-filter_complex".to_string());
            args.push(graph.clone());
        }

        args.extend(self.output_args.iter().cloned());
        args.push(self.output_path.to_string_lossy().into_owned());
        args
    }
}

/// Seconds with millisecond precision, the way the encoder expects them.
pub fn secs(t: TimeUs) -> String {
    format!("{:.3}", t.as_seconds())
}

/// Progress update during an encode.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RenderProgress {
    pub percent: f64,
    pub frame: u64,
    pub fps: f64,
    pub speed: String,
    pub eta_seconds: Option<f64>,
}

/// Runs encoder invocations. [`FfmpegEncoder`] spawns the real binary.
pub trait Encoder: Send + Sync + 'static {
    fn run(
        &self,
        invocation: &Invocation,
        progress: Option<&watch::Sender<RenderProgress>>,
    ) -> impl Future<Output = Result<()>> + Send;
}

// ---------------------------------------------------------------------------
// FfmpegEncoder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    binary: PathBuf,
}

impl FfmpegEncoder {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl Encoder for FfmpegEncoder {
    async fn run(
        &self,
        invocation: &Invocation,
        progress: Option<&watch::Sender<RenderProgress>>,
    ) -> Result<()> {
        use std::process::Stdio;
        use tokio::io::{AsyncBufReadExt, BufReader};
        use tokio::process::Command;

        let args = invocation.args();
        tracing::debug!("{} {}", self.binary.display(), args.join(" "));

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    RenderError::FfmpegNotFound
                } else {
                    RenderError::Io(e)
                }
            })?;

        let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL);
        if let Some(stderr) = child.stderr.take() {
            // Status lines end in '\r', everything else in '\n'.
            let mut segments = BufReader::new(stderr).split(b'\r');
            let total_secs = invocation.duration_us.as_seconds();

            while let Ok(Some(segment)) = segments.next_segment().await {
                let text = String::from_utf8_lossy(&segment);
                for line in text.lines() {
                    if let Some(update) = parse_progress(line, total_secs) {
                        if let Some(tx) = progress {
                            let _ = tx.send(update);
                        }
                        continue;
                    }
                    if line.trim().is_empty() {
                        continue;
                    }
                    if tail.len() == STDERR_TAIL {
                        tail.pop_front();
                    }
                    tail.push_back(line.to_string());
                }
            }
        }

        let status = child.wait().await?;
        if !status.success() {
            let detail = tail.into_iter().collect::<Vec<_>>().join("\n");
            return Err(RenderError::FfmpegFailed(format!(
                "{} exited with {status}: {detail}",
                invocation.output_path.display()
            )));
        }
        Ok(())
    }
}

/// Whether `binary -version` runs.
pub fn binary_available(binary: &Path) -> bool {
    std::process::Command::new(binary)
        .arg("-version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Progress parsing
// ---------------------------------------------------------------------------

/// Parse an ffmpeg stderr progress line.
///
/// Example line: `frame=  123 fps= 60 ... time=00:01:02.05 speed=1.50x`
pub fn parse_progress(line: &str, total_secs: f64) -> Option<RenderProgress> {
    if !line.contains("time=") {
        return None;
    }

    let frame = extract_value(line, "frame=")
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0);
    let fps = extract_value(line, "fps=")
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(0.0);
    let speed = extract_value(line, "speed=").unwrap_or_default();
    let time_secs = extract_value(line, "time=")
        .and_then(|v| parse_time_str(&v))
        .unwrap_or(0.0);

    let percent = if total_secs > 0.0 {
        (time_secs / total_secs * 100.0).min(100.0)
    } else {
        0.0
    };

    let speed_factor = speed.trim_end_matches('x').parse::<f64>().unwrap_or(0.0);
    let eta_seconds = if speed_factor > 0.0 && total_secs > time_secs {
        Some((total_secs - time_secs) / speed_factor)
    } else {
        None
    };

    Some(RenderProgress {
        percent,
        frame,
        fps,
        speed,
        eta_seconds,
    })
}

/// Extract a value from an ffmpeg key=value progress line.
fn extract_value(line: &str, key: &str) -> Option<String> {
    let start = line.find(key)? + key.len();
    let trimmed = line[start..].trim_start();
    let end = trimmed
        .find(|c: char| c.is_whitespace())
        .unwrap_or(trimmed.len());
    let val = &trimmed[..end];
    if val.is_empty() {
        None
    } else {
        Some(val.to_string())
    }
}

/// Parse an ffmpeg time string like "00:01:02.05" into seconds.
fn parse_time_str(s: &str) -> Option<f64> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 3 {
        return None;
    }
    let hours: f64 = parts[0].parse().ok()?;
    let mins: f64 = parts[1].parse().ok()?;
    let secs: f64 = parts[2].parse().ok()?;
    Some(hours * 3600.0 + mins * 60.0 + secs)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
