use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

pub fn timestamp(now: DateTime<Local>) -> String {
    now.format(TIMESTAMP_FORMAT).to_string()
}

/// Keep alphanumerics (any script), `_` and `-`; drop everything else.
pub fn sanitize(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

/// `[<tag>_]<timestamp>_<audio stem>_Batch`
pub fn batch_dir_name(tag: Option<&str>, timestamp: &str, audio: &Path) -> String {
    let stem = audio
        .file_stem()
        .map(|s| sanitize(&s.to_string_lossy()))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "audio".to_string());
    match tag.map(sanitize).filter(|t| !t.is_empty()) {
        Some(tag) => format!("{tag}_{timestamp}_{stem}_Batch"),
        None => format!("{timestamp}_{stem}_Batch"),
    }
}

/// 1-based output file name.
pub fn video_file_name(batch_index: usize) -> String {
    format!("batch_{}.mp4", batch_index + 1)
}

pub fn video_path(batch_dir: &Path, batch_index: usize) -> PathBuf {
    batch_dir.join(video_file_name(batch_index))
}

pub fn generated_subtitle_name(timestamp: &str) -> String {
    format!("generated_{timestamp}.srt")
}
