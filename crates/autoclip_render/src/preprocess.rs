//! Batch normalization of a clip library to one resolution.
//!
//! Every video under the input directory is re-encoded with a cover
//! scale-and-crop to the target frame, mirrored into the output directory
//! with an `.mp4` extension. Outputs that already exist are skipped.

use autoclip_core::types::{Resolution, TimeUs};
use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{RenderError, Result};
use crate::ffmpeg::{Encoder, EncoderInput, Invocation};
use crate::source::is_video_file;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PreprocessSummary {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Video files under `dir`, sorted. Directory symlinks are not followed;
/// unreadable entries are logged and skipped.
fn collect_videos(dir: &Path) -> Vec<PathBuf> {
    let mut videos = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Skipping unreadable entry under {}: {}", dir.display(), e);
                continue;
            }
        };
        if !entry.file_type().is_dir() && is_video_file(entry.path()) {
            videos.push(entry.into_path());
        }
    }
    videos.sort();
    videos
}

pub fn normalize_invocation(input: &Path, output: &Path, resolution: Resolution) -> Invocation {
    let (w, h) = (resolution.width, resolution.height);
    Invocation {
        inputs: vec![EncoderInput::file(input)],
        filter_graph: None,
        output_args: vec![
            "-vf".into(),
            format!("scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h}"),
            "-c:v".into(),
            "libx264".into(),
            "-preset".into(),
            "faster".into(),
            "-crf".into(),
            "23".into(),
            "-c:a".into(),
            "aac".into(),
            "-b:a".into(),
            "192k".into(),
            "-movflags".into(),
            "+faststart".into(),
        ],
        output_path: output.to_path_buf(),
        duration_us: TimeUs::ZERO,
    }
}

/// Normalize every video under `input_dir` into `output_dir`. Individual
/// failures are counted and logged; the walk continues.
pub async fn preprocess_folder<E: Encoder>(
    encoder: &E,
    input_dir: &Path,
    output_dir: &Path,
    resolution: Resolution,
) -> Result<PreprocessSummary> {
    if !input_dir.is_dir() {
        return Err(RenderError::FileNotFound(input_dir.to_path_buf()));
    }

    let videos = collect_videos(input_dir);
    tracing::info!("Preprocessing {} videos to {}", videos.len(), resolution);

    let mut summary = PreprocessSummary::default();
    for input in videos {
        let relative = input.strip_prefix(input_dir).unwrap_or(&input);
        let output = output_dir.join(relative).with_extension("mp4");
        if output.exists() {
            tracing::debug!("Skipping {}: already processed", output.display());
            summary.skipped += 1;
            continue;
        }
        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent)?;
        }

        match encoder
            .run(&normalize_invocation(&input, &output, resolution), None)
            .await
        {
            Ok(()) => summary.processed += 1,
            Err(RenderError::FfmpegNotFound) => return Err(RenderError::FfmpegNotFound),
            Err(e) => {
                tracing::warn!("Failed to preprocess {}: {}", input.display(), e);
                summary.failed += 1;
            }
        }
    }

    tracing::info!(
        "Preprocess done: {} processed, {} skipped, {} failed",
        summary.processed,
        summary.skipped,
        summary.failed
    );
    Ok(summary)
}
