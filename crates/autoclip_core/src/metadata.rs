//! Per-output provenance: which source slices fed which timeline chunk.

use crate::error::Result;
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Sidecar file suffix, appended to the video's file stem.
pub const METADATA_SUFFIX: &str = "_metadata.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkRecord {
    pub chunk_index: usize,
    pub block_index: usize,
    pub timeline_start_us: TimeUs,
    pub timeline_end_us: TimeUs,
    pub segments: Vec<SegmentProvenance>,
    pub transition_pad_head_us: TimeUs,
    pub transition_pad_tail_us: TimeUs,
    pub speed: f64,
    /// The folder had no usable content and a flat clip was rendered.
    #[serde(default)]
    pub placeholder: bool,
}

impl ChunkRecord {
    pub fn for_chunk(chunk: &RenderChunk, segments: Vec<SegmentProvenance>) -> Self {
        Self {
            chunk_index: chunk.index,
            block_index: chunk.block_index,
            timeline_start_us: chunk.start_us,
            timeline_end_us: chunk.end_us,
            placeholder: segments.is_empty(),
            segments,
            transition_pad_head_us: chunk.pad_head_us,
            transition_pad_tail_us: chunk.pad_tail_us,
            speed: chunk.speed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchMetadata {
    pub run_id: Uuid,
    pub batch_index: usize,
    pub audio_path: PathBuf,
    pub audio_duration_us: TimeUs,
    pub transition: Transition,
    pub chunks: Vec<ChunkRecord>,
}

impl BatchMetadata {
    /// `<dir>/<stem>_metadata.json` next to `video`.
    pub fn sidecar_path(video: &Path) -> PathBuf {
        let stem = video
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        video.with_file_name(format!("{stem}{METADATA_SUFFIX}"))
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Write the sidecar for `video`. Failures are logged and swallowed: the
    /// video itself is still a valid result.
    pub fn persist_next_to(&self, video: &Path) -> Option<PathBuf> {
        let path = Self::sidecar_path(video);
        match self.save_to_file(&path) {
            Ok(()) => {
                tracing::info!("Metadata saved to {}", path.display());
                Some(path)
            }
            Err(e) => {
                tracing::warn!("Failed to save metadata {}: {}", path.display(), e);
                None
            }
        }
    }
}

/// Accumulates chunk records for the batch being rendered.
#[derive(Debug)]
pub struct MetadataRecorder {
    metadata: BatchMetadata,
}

impl MetadataRecorder {
    pub fn new(
        run_id: Uuid,
        batch_index: usize,
        audio_path: impl Into<PathBuf>,
        audio_duration_us: TimeUs,
        transition: Transition,
    ) -> Self {
        Self {
            metadata: BatchMetadata {
                run_id,
                batch_index,
                audio_path: audio_path.into(),
                audio_duration_us,
                transition,
                chunks: Vec::new(),
            },
        }
    }

    pub fn record(&mut self, record: ChunkRecord) {
        self.metadata.chunks.push(record);
    }

    pub fn records(&self) -> &[ChunkRecord] {
        &self.metadata.chunks
    }

    /// Finished metadata, chunks in timeline order.
    pub fn finish(mut self) -> BatchMetadata {
        self.metadata.chunks.sort_by_key(|c| c.chunk_index);
        self.metadata
    }
}
