//! Parallel chunk renderer: fetches footage for every planned chunk on the
//! calling task and encodes the chunks concurrently into part files.

use autoclip_core::config::RunConfig;
use autoclip_core::metadata::{ChunkRecord, MetadataRecorder};
use autoclip_core::types::*;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};

use crate::error::{RenderError, Result};
use crate::ffmpeg::{secs, Encoder, EncoderInput, Invocation};
use crate::probe::MediaProbe;
use crate::source::{resize_and_crop, ClipSourceManager, MediaSpan};

pub const MAX_WORKERS: usize = 16;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Concurrent encodes and encoder threads per encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerPlan {
    pub workers: usize,
    pub threads_per_worker: usize,
}

impl WorkerPlan {
    /// A quarter of the cores run encodes, each with an equal share of
    /// threads, so `workers * threads_per_worker <= cores`.
    pub fn for_cores(cores: usize) -> Self {
        let cores = cores.max(1);
        let workers = (cores / 4).clamp(1, MAX_WORKERS);
        Self {
            workers,
            threads_per_worker: (cores / workers).max(1),
        }
    }

    pub fn detect() -> Self {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self::for_cores(cores)
    }

    /// Encodes allowed to be queued or running at once.
    pub fn max_in_flight(&self) -> usize {
        self.workers * 2
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderSettings {
    pub resolution: Resolution,
    pub fps: u32,
    pub preset: String,
    pub crf: u32,
    pub transition: Transition,
    pub workers: WorkerPlan,
}

impl RenderSettings {
    pub fn from_config(config: &RunConfig, workers: WorkerPlan) -> Self {
        Self {
            resolution: config.resolution,
            fps: config.encode.fps,
            preset: config.encode.preset.clone(),
            crf: config.encode.crf,
            transition: config.transition,
            workers,
        }
    }

    /// Video-only H.264 output options for a part file.
    fn part_output_args(&self) -> Vec<String> {
        vec![
            "-map".into(),
            "[out]".into(),
            "-an".into(),
            "-c:v".into(),
            "libx264".into(),
            "-preset".into(),
            self.preset.clone(),
            "-crf".into(),
            self.crf.to_string(),
            "-threads".into(),
            self.workers.threads_per_worker.to_string(),
            "-pix_fmt".into(),
            "yuv420p".into(),
            "-r".into(),
            self.fps.to_string(),
        ]
    }
}

pub fn part_file_name(chunk_index: usize) -> String {
    format!("part_{chunk_index:05}.mp4")
}

// ---------------------------------------------------------------------------
// Invocations
// ---------------------------------------------------------------------------

/// Fade-to-black filters baked into a chunk at block boundaries.
fn fade_filters(chunk: &RenderChunk, transition: Transition) -> Vec<String> {
    if !transition.is_fade_to_black() {
        return Vec::new();
    }
    let visual = chunk.visual_duration_us();
    let d = transition.duration_us().min(visual);
    let mut filters = Vec::new();
    if chunk.transition_in {
        filters.push(format!("fade=t=in:st=0:d={}", secs(d)));
    }
    if chunk.transition_out {
        filters.push(format!("fade=t=out:st={}:d={}", secs(visual - d), secs(d)));
    }
    filters
}

/// Encode `span` into one part: fit each piece, join them, apply speed,
/// then pin the result to the chunk's exact visual length.
pub fn chunk_invocation(
    chunk: &RenderChunk,
    span: &MediaSpan,
    output: &Path,
    settings: &RenderSettings,
) -> Invocation {
    let visual = chunk.visual_duration_us();
    let mut inputs = Vec::with_capacity(span.pieces.len());
    let mut filters = Vec::new();

    for (i, piece) in span.pieces.iter().enumerate() {
        inputs.push(EncoderInput::segment(
            &piece.source.path,
            piece.start_us,
            piece.duration_us(),
        ));
        let fit = piece
            .fit
            .map(|f| format!(",{}", f.filter()))
            .unwrap_or_default();
        filters.push(format!(
            "[{i}:v]setpts=PTS-STARTPTS{fit},setsar=1,format=yuv420p[p{i}]"
        ));
    }

    let joined = if span.pieces.len() == 1 {
        "p0".to_string()
    } else {
        let labels: String = (0..span.pieces.len()).map(|i| format!("[p{i}]")).collect();
        filters.push(format!(
            "{labels}concat=n={}:v=1:a=0[joined]",
            span.pieces.len()
        ));
        "joined".to_string()
    };

    // Short spans (an exhausted folder) hold their last frame.
    let mut chain = vec![
        format!("setpts=(PTS-STARTPTS)/{}", chunk.speed),
        format!("fps={}", settings.fps),
        format!("tpad=stop_mode=clone:stop_duration={}", secs(visual)),
        format!("trim=duration={}", secs(visual)),
        "setpts=PTS-STARTPTS".to_string(),
    ];
    chain.extend(fade_filters(chunk, settings.transition));
    filters.push(format!("[{joined}]{}[out]", chain.join(",")));

    Invocation {
        inputs,
        filter_graph: Some(filters.join(";")),
        output_args: settings.part_output_args(),
        output_path: output.to_path_buf(),
        duration_us: visual,
    }
}

/// Flat black clip of the chunk's visual length.
pub fn placeholder_invocation(
    chunk: &RenderChunk,
    output: &Path,
    settings: &RenderSettings,
) -> Invocation {
    let visual = chunk.visual_duration_us();
    let mut chain = vec!["format=yuv420p".to_string()];
    chain.extend(fade_filters(chunk, settings.transition));

    Invocation {
        inputs: vec![EncoderInput::lavfi(&format!(
            "color=c=black:s={}:r={}:d={}",
            settings.resolution,
            settings.fps,
            secs(visual)
        ))],
        filter_graph: Some(format!("[0:v]{}[out]", chain.join(","))),
        output_args: settings.part_output_args(),
        output_path: output.to_path_buf(),
        duration_us: visual,
    }
}

/// Fetch footage for `chunk` and build its encode. Folders without usable
/// footage get a placeholder and an empty provenance list.
fn prepare_chunk<P: MediaProbe>(
    chunk: &RenderChunk,
    sources: &mut ClipSourceManager<P>,
    settings: &RenderSettings,
    output: &Path,
) -> Result<(Invocation, Vec<SegmentProvenance>)> {
    let needed = chunk.source_duration_us();
    let fetched = match chunk.random_cut {
        Some(bounds) => sources.random_slice(&chunk.folder, needed, bounds.scaled(chunk.speed)),
        None => sources.sequential_slice(&chunk.folder, needed),
    };

    let span = match fetched {
        Ok(Some(span)) if !span.is_empty() => span,
        Ok(_) | Err(RenderError::SourceExhausted(_)) => {
            tracing::warn!(
                "Chunk {}: no footage in {}, rendering placeholder",
                chunk.index,
                chunk.folder.display()
            );
            return Ok((placeholder_invocation(chunk, output, settings), Vec::new()));
        }
        Err(e) => return Err(e),
    };

    let span = resize_and_crop(&span, settings.resolution);
    tracing::debug!(
        "Chunk {} ({} - {}): {} piece(s) from {}",
        chunk.index,
        chunk.start_us,
        chunk.end_us,
        span.pieces.len(),
        chunk.folder.display()
    );
    Ok((
        chunk_invocation(chunk, &span, output, settings),
        span.provenance(),
    ))
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn joined_part(joined: std::result::Result<Result<PartFile>, JoinError>) -> Result<PartFile> {
    joined.map_err(|e| RenderError::WorkerPanicked(e.to_string()))?
}

/// Render every chunk into `scratch`, returning parts in chunk order.
///
/// Footage is fetched here, in chunk order, so source cursors advance
/// deterministically. At most `workers` encodes run at once and at most
/// `2 * workers` are queued; the loop waits for a slot before fetching more.
/// The first failed encode aborts the rest.
pub async fn render_chunks<P, E>(
    chunks: &[RenderChunk],
    sources: &mut ClipSourceManager<P>,
    encoder: Arc<E>,
    settings: &RenderSettings,
    scratch: &Path,
    recorder: &mut MetadataRecorder,
) -> Result<Vec<PartFile>>
where
    P: MediaProbe,
    E: Encoder,
{
    let slots = Arc::new(Semaphore::new(settings.workers.workers.max(1)));
    let mut jobs: JoinSet<Result<PartFile>> = JoinSet::new();
    let mut parts = Vec::with_capacity(chunks.len());

    tracing::info!(
        "Rendering {} chunks with {} workers x {} threads",
        chunks.len(),
        settings.workers.workers,
        settings.workers.threads_per_worker
    );

    // Returning early drops `jobs`, which aborts every queued encode.
    for chunk in chunks {
        while jobs.len() >= settings.workers.max_in_flight() {
            match jobs.join_next().await {
                Some(joined) => parts.push(joined_part(joined)?),
                None => break,
            }
        }

        let output = scratch.join(part_file_name(chunk.index));
        let (invocation, segments) = prepare_chunk(chunk, sources, settings, &output)?;
        recorder.record(ChunkRecord::for_chunk(chunk, segments));

        let part = PartFile {
            chunk_index: chunk.index,
            block_index: chunk.block_index,
            path: output,
            duration_us: chunk.visual_duration_us(),
            pad_head_us: chunk.pad_head_us,
            pad_tail_us: chunk.pad_tail_us,
            is_block_start: chunk.is_block_start,
            is_block_end: chunk.is_block_end,
        };
        let encoder = Arc::clone(&encoder);
        let slots = Arc::clone(&slots);
        jobs.spawn(async move {
            let _permit = slots
                .acquire_owned()
                .await
                .map_err(|e| RenderError::WorkerPanicked(e.to_string()))?;
            encoder.run(&invocation, None).await?;
            Ok(part)
        });
    }

    while let Some(joined) = jobs.join_next().await {
        parts.push(joined_part(joined)?);
    }

    parts.sort_by_key(|p| p.chunk_index);
    tracing::info!("Rendered {} part files", parts.len());
    Ok(parts)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
