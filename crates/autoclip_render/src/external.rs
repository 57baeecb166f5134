//! External speech tools: transcription (audio to SRT) and speech synthesis
//! (text to narration audio). Both run as child processes.

use autoclip_core::config::NarrationScript;
use autoclip_core::narration;
use autoclip_core::subtitles::{self, SubtitleEntry};
use rand::Rng;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

use crate::error::{RenderError, Result};

/// Synthesis attempts before giving up.
pub const TTS_ATTEMPTS: u32 = 3;

pub trait Transcriber: Send + Sync {
    /// Transcribe `audio` into an SRT file at `output`.
    fn transcribe(
        &self,
        audio: &Path,
        output: &Path,
    ) -> impl Future<Output = Result<Vec<SubtitleEntry>>> + Send;
}

pub trait Synthesizer: Send + Sync {
    /// Speak `text` with `voice`, writing audio to `output`.
    fn synthesize(
        &self,
        text: &str,
        voice: &str,
        output: &Path,
    ) -> impl Future<Output = Result<PathBuf>> + Send;
}

/// Tail of a process's stderr, for error messages.
fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().rev().take(6).collect();
    lines.into_iter().rev().collect::<Vec<_>>().join("\n")
}

// ---------------------------------------------------------------------------
// Transcription
// ---------------------------------------------------------------------------

/// Runs `<program> <audio> <output.srt>` and parses the result.
#[derive(Debug, Clone)]
pub struct CommandTranscriber {
    program: PathBuf,
}

impl CommandTranscriber {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Transcriber for CommandTranscriber {
    async fn transcribe(&self, audio: &Path, output: &Path) -> Result<Vec<SubtitleEntry>> {
        if !audio.exists() {
            return Err(RenderError::FileNotFound(audio.to_path_buf()));
        }
        tracing::info!("Transcribing {}", audio.display());

        let result = Command::new(&self.program)
            .arg(audio)
            .arg(output)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                RenderError::Transcription(format!("{}: {}", self.program.display(), e))
            })?;

        if !result.status.success() {
            return Err(RenderError::Transcription(stderr_tail(&result.stderr)));
        }
        let entries = subtitles::load_srt(output)
            .map_err(|e| RenderError::Transcription(format!("unreadable output: {e}")))?;
        tracing::info!("Transcribed {} subtitle entries", entries.len());
        Ok(entries)
    }
}

// ---------------------------------------------------------------------------
// Speech synthesis
// ---------------------------------------------------------------------------

/// Runs `<program> --voice V --text T --write-media OUT`, retrying with a
/// jittered pause between attempts.
#[derive(Debug, Clone)]
pub struct CommandSynthesizer {
    program: PathBuf,
    attempts: u32,
    retry_delay: Duration,
}

impl CommandSynthesizer {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            attempts: TTS_ATTEMPTS,
            retry_delay: Duration::from_secs(1),
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    async fn attempt(&self, text: &str, voice: &str, output: &Path) -> Result<()> {
        let result = Command::new(&self.program)
            .arg("--voice")
            .arg(voice)
            .arg("--text")
            .arg(text)
            .arg("--write-media")
            .arg(output)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| RenderError::Synthesis(format!("{}: {}", self.program.display(), e)))?;

        if !result.status.success() {
            return Err(RenderError::Synthesis(stderr_tail(&result.stderr)));
        }
        match std::fs::metadata(output) {
            Ok(meta) if meta.len() > 0 => Ok(()),
            _ => Err(RenderError::Synthesis("no audio written".into())),
        }
    }
}

impl Synthesizer for CommandSynthesizer {
    async fn synthesize(&self, text: &str, voice: &str, output: &Path) -> Result<PathBuf> {
        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut last_error = RenderError::Synthesis("no attempts made".into());
        for attempt in 1..=self.attempts {
            match self.attempt(text, voice, output).await {
                Ok(()) => return Ok(output.to_path_buf()),
                Err(e) => {
                    tracing::warn!(
                        "Speech synthesis attempt {}/{} failed: {}",
                        attempt,
                        self.attempts,
                        e
                    );
                    last_error = e;
                }
            }
            if attempt < self.attempts {
                let jitter = rand::thread_rng().gen_range(0.0..1.0);
                tokio::time::sleep(self.retry_delay.mul_f64(1.0 + jitter)).await;
            }
        }
        Err(last_error)
    }
}

/// Synthesize a narration script into `output`. Sentences are split on
/// full-width and newline terminators and spoken one per line.
pub async fn synthesize_script<S: Synthesizer>(
    synth: &S,
    script: &NarrationScript,
    output: &Path,
) -> Result<PathBuf> {
    let sentences = narration::split_sentences(&script.text);
    if sentences.is_empty() {
        return Err(RenderError::Synthesis("narration text is empty".into()));
    }
    tracing::info!(
        "Synthesizing {} sentences with voice {}",
        sentences.len(),
        script.voice
    );
    synth.synthesize(&sentences.join("\n"), &script.voice, output).await
}
