use autoclip_core::error::CoreError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("failed to execute ffprobe: {0}")]
    FfprobeExec(String),

    #[error("ffprobe failed: {0}")]
    FfprobeFailed(String),

    #[error("ffmpeg not found")]
    FfmpegNotFound,

    #[error("ffmpeg failed: {0}")]
    FfmpegFailed(String),

    #[error("no part files to assemble")]
    NoParts,

    #[error("no playable content left in {0}")]
    SourceExhausted(PathBuf),

    #[error("render worker failed: {0}")]
    WorkerPanicked(String),

    #[error("transcription failed: {0}")]
    Transcription(String),

    #[error("speech synthesis failed: {0}")]
    Synthesis(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RenderError {
    /// Whether the run configuration itself is at fault.
    pub fn is_configuration(&self) -> bool {
        matches!(self, RenderError::Core(e) if e.is_configuration())
    }
}

pub type Result<T> = std::result::Result<T, RenderError>;
