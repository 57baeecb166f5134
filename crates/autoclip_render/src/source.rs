//! Clip Source Manager: finds the footage in each folder and hands out spans
//! of it, either continuing a per-folder cursor or as random cuts.

use autoclip_core::types::{ClipBounds, Resolution, SegmentProvenance, TimeUs};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{RenderError, Result};
use crate::probe::MediaProbe;

pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mov", "avi", "mkv", "flv", "wmv", "webm", "m4v", "mpg", "mpeg", "3gp", "ts", "mts",
];

pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| VIDEO_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Video files directly inside `dir`, sorted by file name. A missing or
/// unreadable directory has no files.
pub fn discover_videos(dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Cannot read source folder {}: {}", dir.display(), e);
            return Vec::new();
        }
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_video_file(path))
        .collect();
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    files
}

// ---------------------------------------------------------------------------
// Media spans
// ---------------------------------------------------------------------------

/// A probed source file. Spans hold it behind an `Arc`, so the file stays
/// described for as long as any span that cuts from it.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceMedia {
    pub path: PathBuf,
    pub duration_us: TimeUs,
    pub width: u32,
    pub height: u32,
}

/// How a piece is brought to the output frame size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFit {
    /// Uniform scale to `scaled`, then a `target` window at (`x`, `y`).
    Cover {
        scaled: Resolution,
        target: Resolution,
        x: u32,
        y: u32,
    },
    /// Geometry unknown; the encoder computes the cover scale itself.
    CoverAuto(Resolution),
}

impl FrameFit {
    /// Scale-to-cover plus centered crop, or `None` when `source` already
    /// matches `target`.
    pub fn cover(source: Resolution, target: Resolution) -> Option<Self> {
        if source == target {
            return None;
        }
        if source.width == 0 || source.height == 0 {
            return Some(FrameFit::CoverAuto(target));
        }
        let factor = (target.width as f64 / source.width as f64)
            .max(target.height as f64 / source.height as f64);
        let width = even_ceil(source.width as f64 * factor).max(target.width);
        let height = even_ceil(source.height as f64 * factor).max(target.height);
        Some(FrameFit::Cover {
            scaled: Resolution::new(width, height),
            target,
            x: (width - target.width) / 2,
            y: (height - target.height) / 2,
        })
    }

    pub fn output(&self) -> Resolution {
        match *self {
            FrameFit::Cover { target, .. } => target,
            FrameFit::CoverAuto(target) => target,
        }
    }

    /// Encoder filter chain for this fit.
    pub fn filter(&self) -> String {
        match *self {
            FrameFit::Cover {
                scaled,
                target,
                x,
                y,
            } => format!(
                "scale={}:{},crop={}:{}:{x}:{y}",
                scaled.width, scaled.height, target.width, target.height
            ),
            FrameFit::CoverAuto(t) => format!(
                "scale={}:{}:force_original_aspect_ratio=increase,crop={}:{}",
                t.width, t.height, t.width, t.height
            ),
        }
    }
}

fn even_ceil(v: f64) -> u32 {
    let n = (v - 1e-6).ceil().max(0.0) as u32;
    n + n % 2
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpanPiece {
    pub source: Arc<SourceMedia>,
    pub start_us: TimeUs,
    pub end_us: TimeUs,
    pub random_cut: bool,
    pub fit: Option<FrameFit>,
}

impl SpanPiece {
    pub fn duration_us(&self) -> TimeUs {
        self.end_us - self.start_us
    }
}

/// Footage for one chunk, possibly stitched from several files.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaSpan {
    pub pieces: Vec<SpanPiece>,
}

impl MediaSpan {
    pub fn duration_us(&self) -> TimeUs {
        self.pieces.iter().map(|p| p.duration_us()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    pub fn provenance(&self) -> Vec<SegmentProvenance> {
        self.pieces
            .iter()
            .map(|p| SegmentProvenance {
                source_file: p.source.path.clone(),
                source_start_us: p.start_us,
                source_end_us: p.end_us,
                duration_us: p.duration_us(),
                random_cut: p.random_cut,
            })
            .collect()
    }
}

/// Fit every piece of `span` to `target`. Pieces already at `target` are
/// left untouched, so a span that needs no work comes back unchanged.
pub fn resize_and_crop(span: &MediaSpan, target: Resolution) -> MediaSpan {
    MediaSpan {
        pieces: span
            .pieces
            .iter()
            .map(|piece| {
                let source = Resolution::new(piece.source.width, piece.source.height);
                SpanPiece {
                    fit: FrameFit::cover(source, target),
                    ..piece.clone()
                }
            })
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// ClipSourceManager
// ---------------------------------------------------------------------------

/// Where sequential playback of a folder continues.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceCursor {
    pub file_index: usize,
    pub offset_us: TimeUs,
}

impl SourceCursor {
    fn next_file(&mut self, file_count: usize) {
        self.file_index = (self.file_index + 1) % file_count.max(1);
        self.offset_us = TimeUs::ZERO;
    }
}

/// Owns discovery results, sequential cursors and the random-cut RNG.
///
/// Only the task that plans chunk fetches touches it; cursors are never
/// shared with encode workers.
pub struct ClipSourceManager<P> {
    probe: P,
    video_root: PathBuf,
    discovered: HashMap<PathBuf, Arc<Vec<PathBuf>>>,
    cursors: HashMap<PathBuf, SourceCursor>,
    rng: StdRng,
}

type OpenCache = HashMap<PathBuf, Option<Arc<SourceMedia>>>;

impl<P: MediaProbe> ClipSourceManager<P> {
    /// Folders are resolved against `video_root`; `seed` makes random cuts
    /// reproducible.
    pub fn new(probe: P, video_root: impl Into<PathBuf>, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            probe,
            video_root: video_root.into(),
            discovered: HashMap::new(),
            cursors: HashMap::new(),
            rng,
        }
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }

    /// Source files of `folder`, discovered once per manager.
    pub fn files(&mut self, folder: &Path) -> Arc<Vec<PathBuf>> {
        if let Some(files) = self.discovered.get(folder) {
            return Arc::clone(files);
        }
        let dir = self.video_root.join(folder);
        let files = Arc::new(discover_videos(&dir));
        tracing::debug!("Discovered {} source files in {}", files.len(), dir.display());
        self.discovered.insert(folder.to_path_buf(), Arc::clone(&files));
        files
    }

    pub fn cursor(&self, folder: &Path) -> Option<SourceCursor> {
        self.cursors.get(folder).copied()
    }

    /// Forget every cursor so the next output starts from the first file.
    pub fn reset_cursors(&mut self) {
        self.cursors.clear();
    }

    /// Continue playback of `folder` for `duration`, wrapping from the last
    /// file to the first.
    ///
    /// Returns `Ok(None)` when the folder has no source files. Unreadable
    /// files are skipped. After `2 × file count` consecutive steps without
    /// footage the walk stops: with nothing collected that is
    /// `SourceExhausted`, otherwise the shorter span is returned.
    pub fn sequential_slice(&mut self, folder: &Path, duration: TimeUs) -> Result<Option<MediaSpan>> {
        let files = self.files(folder);
        if files.is_empty() {
            return Ok(None);
        }

        let guard = files.len() * 2;
        let mut cache = OpenCache::new();
        let mut span = MediaSpan::default();
        let mut remaining = duration;
        let mut idle = 0;
        let cursor = self.cursors.entry(folder.to_path_buf()).or_default();

        while remaining > TimeUs::ZERO && idle < guard {
            let path = &files[cursor.file_index % files.len()];
            let Some(media) = open_media(&self.probe, path, &mut cache) else {
                cursor.next_file(files.len());
                idle += 1;
                continue;
            };

            let available = media.duration_us - cursor.offset_us;
            if available <= TimeUs::ZERO {
                cursor.next_file(files.len());
                idle += 1;
                continue;
            }

            let take = available.min(remaining);
            span.pieces.push(SpanPiece {
                source: Arc::clone(&media),
                start_us: cursor.offset_us,
                end_us: cursor.offset_us + take,
                random_cut: false,
                fit: None,
            });
            cursor.offset_us += take;
            remaining = remaining - take;
            idle = 0;

            if cursor.offset_us >= media.duration_us {
                cursor.next_file(files.len());
            }
        }

        finish_slice(folder, span, remaining, duration)
    }

    /// Fill `total` with cuts from uniformly chosen files at uniformly
    /// chosen offsets. Cut lengths are drawn from `bounds`; the last cut is
    /// shortened to land exactly on `total`. Cursors are not touched.
    ///
    /// Only files at least `bounds.min` long are cut while any exist. When
    /// every file is shorter, whole short files are used instead.
    pub fn random_slice(
        &mut self,
        folder: &Path,
        total: TimeUs,
        bounds: ClipBounds,
    ) -> Result<Option<MediaSpan>> {
        let files = self.files(folder);
        if files.is_empty() {
            return Ok(None);
        }

        let hi = bounds.max.max(TimeUs(1));
        let lo = bounds.min.max(TimeUs(1)).min(hi);
        let mut cache = OpenCache::new();
        let usable: Vec<Arc<SourceMedia>> = files
            .iter()
            .filter_map(|path| open_media(&self.probe, path, &mut cache))
            .filter(|media| media.duration_us > TimeUs::ZERO)
            .collect();
        let long: Vec<Arc<SourceMedia>> = usable
            .iter()
            .filter(|media| media.duration_us >= lo)
            .cloned()
            .collect();
        let pool = if long.is_empty() {
            if !usable.is_empty() {
                tracing::debug!(
                    "No file in {} reaches {}; using whole short files",
                    folder.display(),
                    lo
                );
            }
            usable
        } else {
            long
        };

        let mut span = MediaSpan::default();
        let mut remaining = total;
        while remaining > TimeUs::ZERO && !pool.is_empty() {
            let media = &pool[self.rng.gen_range(0..pool.len())];
            let drawn = TimeUs(self.rng.gen_range(lo.0..=hi.0));
            let length = drawn.min(remaining).min(media.duration_us);
            let latest_start = media.duration_us - length;
            let start = TimeUs(self.rng.gen_range(0..=latest_start.0));

            span.pieces.push(SpanPiece {
                source: Arc::clone(media),
                start_us: start,
                end_us: start + length,
                random_cut: true,
                fit: None,
            });
            remaining = remaining - length;
        }

        finish_slice(folder, span, remaining, total)
    }
}

fn finish_slice(
    folder: &Path,
    span: MediaSpan,
    remaining: TimeUs,
    requested: TimeUs,
) -> Result<Option<MediaSpan>> {
    if span.is_empty() && requested > TimeUs::ZERO {
        return Err(RenderError::SourceExhausted(folder.to_path_buf()));
    }
    if remaining > TimeUs::ZERO {
        tracing::warn!(
            "Folder {} ran out of footage: {} of {} collected",
            folder.display(),
            span.duration_us(),
            requested
        );
    }
    Ok(Some(span))
}

/// Probe `path` at most once per slice call.
fn open_media<P: MediaProbe>(
    probe: &P,
    path: &Path,
    cache: &mut OpenCache,
) -> Option<Arc<SourceMedia>> {
    if let Some(cached) = cache.get(path) {
        return cached.clone();
    }
    let opened = match probe.probe(path) {
        Ok(result) if result.has_video() => Some(Arc::new(SourceMedia {
            path: path.to_path_buf(),
            duration_us: result.duration_us,
            width: result.width,
            height: result.height,
        })),
        Ok(_) => {
            tracing::warn!("Skipping {}: no video stream", path.display());
            None
        }
        Err(e) => {
            tracing::warn!("Skipping unreadable source {}: {}", path.display(), e);
            None
        }
    };
    cache.insert(path.to_path_buf(), opened.clone());
    opened
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
