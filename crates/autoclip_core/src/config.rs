use crate::error::{CoreError, Result};
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Everything one run needs: narration, weighted sources and output styling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunConfig {
    /// Narration audio. Ignored when `narration` is set; the synthesized
    /// track takes its place.
    #[serde(default)]
    pub audio_path: PathBuf,
    /// Pre-timed SRT track. Transcribed from the audio when absent.
    #[serde(default)]
    pub subtitle_path: Option<PathBuf>,
    #[serde(default)]
    pub narration: Option<NarrationScript>,
    #[serde(default = "default_video_root")]
    pub video_root: PathBuf,
    pub folders: Vec<FolderSpec>,
    #[serde(default = "default_output_count")]
    pub output_count: usize,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "preset_shorts")]
    pub resolution: Resolution,
    #[serde(default)]
    pub transition: Transition,
    #[serde(default)]
    pub subtitle_style: SubtitleStyle,
    #[serde(default)]
    pub bgm: Option<BgmSettings>,
    #[serde(default)]
    pub output_tag: Option<String>,
    #[serde(default)]
    pub encode: EncodeSettings,
    #[serde(default)]
    pub tools: ToolSettings,
    /// Seed for random-cut sampling; entropy when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Keep per-batch part files after assembly.
    #[serde(default)]
    pub keep_scratch: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NarrationScript {
    pub text: String,
    pub voice: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BgmSettings {
    pub path: PathBuf,
    #[serde(default = "default_bgm_volume")]
    pub volume: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EncodeSettings {
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_preset")]
    pub preset: String,
    #[serde(default = "default_crf")]
    pub crf: u32,
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: PathBuf,
    #[serde(default = "default_ffprobe")]
    pub ffprobe: PathBuf,
}

/// External speech programs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolSettings {
    /// Run as `<program> <audio> <output.srt>`.
    #[serde(default = "default_transcriber")]
    pub transcriber: PathBuf,
    /// edge-tts compatible: `--voice`, `--text`, `--write-media`.
    #[serde(default = "default_synthesizer")]
    pub synthesizer: PathBuf,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            transcriber: default_transcriber(),
            synthesizer: default_synthesizer(),
        }
    }
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            preset: default_preset(),
            crf: default_crf(),
            ffmpeg: default_ffmpeg(),
            ffprobe: default_ffprobe(),
        }
    }
}

fn default_transcriber() -> PathBuf {
    PathBuf::from("autoclip-asr")
}

fn default_synthesizer() -> PathBuf {
    PathBuf::from("edge-tts")
}

fn default_video_root() -> PathBuf {
    PathBuf::from("assets/video")
}

fn default_output_count() -> usize {
    1
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_bgm_volume() -> f64 {
    0.3
}

fn default_fps() -> u32 {
    24
}

fn default_preset() -> String {
    "ultrafast".to_string()
}

fn default_crf() -> u32 {
    23
}

fn default_ffmpeg() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe() -> PathBuf {
    PathBuf::from("ffprobe")
}

impl RunConfig {
    /// A configuration with defaults for everything but narration and sources.
    pub fn new(audio_path: impl Into<PathBuf>, folders: Vec<FolderSpec>) -> Self {
        Self {
            audio_path: audio_path.into(),
            subtitle_path: None,
            narration: None,
            video_root: default_video_root(),
            folders,
            output_count: default_output_count(),
            output_dir: default_output_dir(),
            resolution: preset_shorts(),
            transition: Transition::none(),
            subtitle_style: SubtitleStyle::default(),
            bgm: None,
            output_tag: None,
            encode: EncodeSettings::default(),
            tools: ToolSettings::default(),
            seed: None,
            keep_scratch: false,
        }
    }

    /// Load from TOML (`.toml`) or JSON (anything else).
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)?;
        let config = if is_toml(path) {
            toml::from_str(&data)?
        } else {
            serde_json::from_str(&data)?
        };
        Ok(config)
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let data = if is_toml(path) {
            toml::to_string_pretty(self)?
        } else {
            serde_json::to_string_pretty(self)?
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, data)?;
        Ok(())
    }

    /// Directory holding the source files of `spec`.
    pub fn folder_path(&self, spec: &FolderSpec) -> PathBuf {
        self.video_root.join(&spec.folder)
    }

    /// Reject configurations that cannot produce a video. Runs before any
    /// rendering work.
    pub fn validate(&self) -> Result<()> {
        if self.folders.is_empty() {
            return Err(CoreError::NoFolders);
        }

        for spec in &self.folders {
            let invalid = |reason: &str| CoreError::InvalidFolder {
                folder: spec.folder.clone(),
                reason: reason.to_string(),
            };
            if !spec.weight.is_finite() || spec.weight < 0.0 {
                return Err(invalid("weight must be a non-negative number"));
            }
            if !spec.speed.is_finite() || spec.speed <= 0.0 {
                return Err(invalid("speed must be greater than zero"));
            }
            if spec.clip_min < 0.0 || spec.clip_max < 0.0 {
                return Err(invalid("clip length bounds must not be negative"));
            }
            if spec.clip_max > 0.0 && spec.clip_min > spec.clip_max {
                return Err(invalid("clip_min exceeds clip_max"));
            }
            if spec.clip_max == 0.0 && spec.clip_min > 0.0 {
                return Err(invalid("clip_min set without clip_max"));
            }
        }

        let total_weight: f64 = self.folders.iter().map(|f| f.weight).sum();
        if total_weight <= 0.0 {
            return Err(CoreError::ZeroTotalWeight);
        }

        if self.narration.is_none() && !self.audio_path.is_file() {
            return Err(CoreError::MissingAudio(self.audio_path.clone()));
        }
        if self.output_count == 0 {
            return Err(CoreError::InvalidSetting(
                "output_count must be at least 1".into(),
            ));
        }
        if self.resolution.width == 0 || self.resolution.height == 0 {
            return Err(CoreError::InvalidSetting(format!(
                "resolution {} has a zero dimension",
                self.resolution
            )));
        }
        if !self.transition.duration.is_finite() || self.transition.duration < 0.0 {
            return Err(CoreError::InvalidSetting(
                "transition duration must not be negative".into(),
            ));
        }
        if self.encode.fps == 0 {
            return Err(CoreError::InvalidSetting("fps must be at least 1".into()));
        }
        if let Some(bgm) = &self.bgm {
            if bgm.volume < 0.0 {
                return Err(CoreError::InvalidSetting(
                    "bgm volume must not be negative".into(),
                ));
            }
        }
        Ok(())
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("toml")
}

/// 1080x1920 (vertical/shorts) preset.
pub fn preset_shorts() -> Resolution {
    Resolution::new(1080, 1920)
}

/// 1920x1080 preset.
pub fn preset_1080p() -> Resolution {
    Resolution::new(1920, 1080)
}

/// 1280x720 preset.
pub fn preset_720p() -> Resolution {
    Resolution::new(1280, 720)
}

/// 3840x2160 (4K) preset.
pub fn preset_4k() -> Resolution {
    Resolution::new(3840, 2160)
}
