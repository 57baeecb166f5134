//! Deterministic stand-ins for ffprobe and ffmpeg.

use autoclip_core::types::TimeUs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::watch;

use crate::error::{RenderError, Result};
use crate::ffmpeg::{Encoder, Invocation, RenderProgress};
use crate::probe::{MediaProbe, ProbeResult};

/// Every video is `video_secs` long at 1920x1080; `.mp3`/`.wav`/`.m4a`
/// files are audio of `audio_secs`. Files whose name contains `corrupt`
/// fail to probe.
#[derive(Debug, Clone)]
pub struct FixedProbe {
    pub video_secs: f64,
    pub audio_secs: f64,
}

impl MediaProbe for FixedProbe {
    fn probe(&self, path: &Path) -> Result<ProbeResult> {
        let name = path.to_string_lossy();
        if name.contains("corrupt") {
            return Err(RenderError::FfprobeFailed(name.into_owned()));
        }
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let audio = matches!(ext, "mp3" | "wav" | "m4a");
        Ok(ProbeResult {
            duration_us: TimeUs::from_seconds(if audio { self.audio_secs } else { self.video_secs }),
            width: if audio { 0 } else { 1920 },
            height: if audio { 0 } else { 1080 },
            fps: 30.0,
            codec: if audio { "mp3".into() } else { "h264".into() },
            audio_channels: if audio { 2 } else { 0 },
        })
    }
}

type FailRule = Box<dyn Fn(usize, &Invocation) -> Option<RenderError> + Send + Sync>;

/// Records invocations and touches each output file instead of encoding.
pub struct FakeEncoder {
    pub calls: Mutex<Vec<Invocation>>,
    pub peak: AtomicUsize,
    /// Runs that have returned, successful or not.
    pub finished: AtomicUsize,
    active: AtomicUsize,
    counter: AtomicUsize,
    delay: Duration,
    fail: Option<FailRule>,
}

impl FakeEncoder {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            peak: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            counter: AtomicUsize::new(0),
            delay: Duration::ZERO,
            fail: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail call number `n` (0-based, in start order) or any call `rule`
    /// picks.
    pub fn failing(
        mut self,
        rule: impl Fn(usize, &Invocation) -> Option<RenderError> + Send + Sync + 'static,
    ) -> Self {
        self.fail = Some(Box::new(rule));
        self
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }
}

impl Encoder for FakeEncoder {
    async fn run(
        &self,
        invocation: &Invocation,
        _progress: Option<&watch::Sender<RenderProgress>>,
    ) -> Result<()> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push(invocation.clone());

        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.finished.fetch_add(1, Ordering::SeqCst);

        if let Some(err) = self.fail.as_ref().and_then(|rule| rule(n, invocation)) {
            return Err(err);
        }
        if let Some(parent) = invocation.output_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&invocation.output_path, b"")?;
        Ok(())
    }
}
