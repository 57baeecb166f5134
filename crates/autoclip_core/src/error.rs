use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("total folder weight is zero")]
    ZeroTotalWeight,

    #[error("no source folders configured")]
    NoFolders,

    #[error("audio file not found: {0}")]
    MissingAudio(PathBuf),

    #[error("invalid folder {folder}: {reason}")]
    InvalidFolder { folder: PathBuf, reason: String },

    #[error("invalid setting: {0}")]
    InvalidSetting(String),

    #[error("subtitle parse error at line {line}: {reason}")]
    SubtitleParse { line: usize, reason: String },
}

impl CoreError {
    /// Whether this error stems from the run configuration rather than IO.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            CoreError::ZeroTotalWeight
                | CoreError::NoFolders
                | CoreError::MissingAudio(_)
                | CoreError::InvalidFolder { .. }
                | CoreError::InvalidSetting(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
