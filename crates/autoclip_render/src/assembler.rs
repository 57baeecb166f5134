//! Transition compositor and final assembly.
//!
//! Part files are grouped into scenes by block. Without crossfade the parts
//! are joined by the encoder's concat demuxer in one pass (fast path). With
//! crossfade, or when the fast path fails, every part is decoded into one
//! filter graph that concatenates scenes or blends them with `xfade`
//! (composite path).

use autoclip_core::config::BgmSettings;
use autoclip_core::subtitles;
use autoclip_core::types::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::watch;

use crate::error::{RenderError, Result};
use crate::ffmpeg::{secs, Encoder, EncoderInput, Invocation, RenderProgress};
use crate::renderer::RenderSettings;

/// Visual overshoot tolerated before the tail is trimmed to the audio.
pub const RECONCILE_SLACK: TimeUs = TimeUs(1_000_000);

// ---------------------------------------------------------------------------
// Scenes
// ---------------------------------------------------------------------------

/// Consecutive parts of one block; joined with hard cuts.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub block_index: usize,
    pub parts: Vec<PartFile>,
}

impl Scene {
    pub fn duration_us(&self) -> TimeUs {
        self.parts.iter().map(|p| p.duration_us).sum()
    }
}

/// Fold index-ordered parts into scenes by contiguous block index.
pub fn group_scenes(parts: &[PartFile]) -> Vec<Scene> {
    let mut scenes: Vec<Scene> = Vec::new();
    for part in parts {
        match scenes.last_mut() {
            Some(scene) if scene.block_index == part.block_index => scene.parts.push(part.clone()),
            _ => scenes.push(Scene {
                block_index: part.block_index,
                parts: vec![part.clone()],
            }),
        }
    }
    scenes
}

/// Length of the joined scenes; each crossfade overlaps two scenes.
pub fn composed_duration(scenes: &[Scene], transition: Transition) -> TimeUs {
    let total: TimeUs = scenes.iter().map(Scene::duration_us).sum();
    if transition.is_crossfade() && scenes.len() > 1 {
        total - transition.duration_us() * (scenes.len() as i64 - 1)
    } else {
        total
    }
}

// ---------------------------------------------------------------------------
// Length reconciliation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconcile {
    /// Within slack of the audio.
    Keep,
    /// Cut the video at this length.
    Trim(TimeUs),
    /// Repeat the last frame for this long.
    Hold(TimeUs),
}

/// The audio track always decides the output length: overshoot beyond the
/// slack is trimmed, any undershoot is held.
pub fn reconcile(visual: TimeUs, audio: TimeUs) -> Reconcile {
    if visual > audio + RECONCILE_SLACK {
        Reconcile::Trim(audio)
    } else if visual < audio {
        Reconcile::Hold(audio - visual)
    } else {
        Reconcile::Keep
    }
}

impl Reconcile {
    pub fn filter(&self) -> Option<String> {
        match *self {
            Reconcile::Keep => None,
            Reconcile::Trim(len) => Some(format!("trim=duration={},setpts=PTS-STARTPTS", secs(len))),
            Reconcile::Hold(extra) => Some(format!(
                "tpad=stop_mode=clone:stop_duration={}",
                secs(extra)
            )),
        }
    }

    /// Video length after applying the rule to `visual`.
    pub fn output_duration(&self, visual: TimeUs) -> TimeUs {
        match *self {
            Reconcile::Keep => visual,
            Reconcile::Trim(len) => len,
            Reconcile::Hold(extra) => visual + extra,
        }
    }
}

// ---------------------------------------------------------------------------
// Audio
// ---------------------------------------------------------------------------

pub fn premix_invocation(
    narration: &Path,
    bgm: &BgmSettings,
    duration: TimeUs,
    output: &Path,
) -> Invocation {
    Invocation {
        inputs: vec![
            EncoderInput::file(narration),
            EncoderInput::file(&bgm.path).with_options(&["-stream_loop", "-1"]),
        ],
        filter_graph: Some(format!(
            "[1:a]volume={}[bgm];[0:a][bgm]amix=inputs=2:duration=first:dropout_transition=0:normalize=0[aout]",
            bgm.volume
        )),
        output_args: vec![
            "-map".into(),
            "[aout]".into(),
            "-c:a".into(),
            "aac".into(),
            "-b:a".into(),
            "192k".into(),
        ],
        output_path: output.to_path_buf(),
        duration_us: duration,
    }
}

/// Narration mixed with looped background music, or the narration itself
/// when there is no music. A failed mix falls back to plain narration.
pub async fn premix_audio<E: Encoder>(
    encoder: &E,
    narration: &Path,
    bgm: Option<&BgmSettings>,
    duration: TimeUs,
    scratch: &Path,
) -> PathBuf {
    let Some(bgm) = bgm else {
        return narration.to_path_buf();
    };
    let output = scratch.join("mixed_audio.m4a");
    match encoder
        .run(&premix_invocation(narration, bgm, duration, &output), None)
        .await
    {
        Ok(()) => output,
        Err(e) => {
            tracing::warn!("Background music mix failed, using narration only: {}", e);
            narration.to_path_buf()
        }
    }
}

// ---------------------------------------------------------------------------
// Assembly
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssemblyPath {
    Fast,
    Composite,
}

/// Outcome of one assembly stage.
#[derive(Debug)]
pub enum AssemblyAttempt {
    Done,
    /// The next stage may still succeed.
    Recoverable(RenderError),
    Fatal(RenderError),
}

impl From<Result<()>> for AssemblyAttempt {
    fn from(result: Result<()>) -> Self {
        match result {
            Ok(()) => AssemblyAttempt::Done,
            Err(e @ (RenderError::FfmpegNotFound | RenderError::NoParts)) => AssemblyAttempt::Fatal(e),
            Err(e) => AssemblyAttempt::Recoverable(e),
        }
    }
}

/// Everything the final encode of one output needs.
#[derive(Debug, Clone)]
pub struct AssemblyJob<'a> {
    pub parts: &'a [PartFile],
    /// Final audio track (narration, premixed when there is music).
    pub audio: &'a Path,
    pub audio_duration_us: TimeUs,
    pub subtitles: Option<&'a Path>,
    pub style: &'a SubtitleStyle,
    pub settings: &'a RenderSettings,
    pub scratch: &'a Path,
    pub output: &'a Path,
}

impl AssemblyJob<'_> {
    /// Reconcile, burn subtitles, normalize pixel format.
    fn finishing_chain(&self, visual: TimeUs) -> String {
        let mut chain = Vec::new();
        let rule = reconcile(visual, self.audio_duration_us);
        if let Some(filter) = rule.filter() {
            chain.push(filter);
        }
        if let Some(subs) = self.subtitles {
            chain.push(subtitles::subtitles_filter(subs, self.style));
        }
        chain.push("format=yuv420p".to_string());
        tracing::debug!(
            "Visual {} vs audio {}: {:?}",
            visual,
            self.audio_duration_us,
            rule
        );
        chain.join(",")
    }

    fn output_args(&self, audio_input: usize) -> Vec<String> {
        vec![
            "-map".into(),
            "[v]".into(),
            "-map".into(),
            format!("{audio_input}:a"),
            "-c:v".into(),
            "libx264".into(),
            "-preset".into(),
            self.settings.preset.clone(),
            "-crf".into(),
            self.settings.crf.to_string(),
            "-pix_fmt".into(),
            "yuv420p".into(),
            "-r".into(),
            self.settings.fps.to_string(),
            "-c:a".into(),
            "aac".into(),
            "-b:a".into(),
            "192k".into(),
            "-movflags".into(),
            "+faststart".into(),
        ]
    }
}

/// `file '<path>'` lines for the concat demuxer. The demuxer resolves
/// relative entries against the list's directory, so every entry is
/// written absolute.
pub fn concat_list(parts: &[PartFile]) -> Result<String> {
    let mut list = String::new();
    for part in parts {
        let path = std::path::absolute(&part.path)?;
        let path = path.to_string_lossy().replace('\'', "'\\''");
        list.push_str(&format!("file '{path}'\n"));
    }
    Ok(list)
}

pub fn fast_invocation(job: &AssemblyJob<'_>, list_path: &Path) -> Invocation {
    let visual: TimeUs = job.parts.iter().map(|p| p.duration_us).sum();
    Invocation {
        inputs: vec![
            EncoderInput::file(list_path).with_options(&["-f", "concat", "-safe", "0"]),
            EncoderInput::file(job.audio),
        ],
        filter_graph: Some(format!("[0:v]{}[v]", job.finishing_chain(visual))),
        output_args: job.output_args(1),
        output_path: job.output.to_path_buf(),
        duration_us: job.audio_duration_us,
    }
}

/// Scene graph: concat inside scenes, then xfade or concat between them.
/// Returns the filters and the label of the joined stream.
fn scene_graph(scenes: &[Scene], transition: Transition) -> (Vec<String>, String) {
    let mut filters = Vec::new();
    let mut input = 0;
    for (s, scene) in scenes.iter().enumerate() {
        let n = scene.parts.len();
        let labels: String = (input..input + n).map(|i| format!("[{i}:v]")).collect();
        filters.push(format!(
            "{labels}concat=n={n}:v=1:a=0,settb=AVTB,setpts=PTS-STARTPTS[s{s}]"
        ));
        input += n;
    }

    if scenes.len() == 1 {
        return (filters, "s0".to_string());
    }

    if transition.is_crossfade() {
        let d = transition.duration_us();
        let mut length = scenes[0].duration_us();
        let mut prev = "s0".to_string();
        for (s, scene) in scenes.iter().enumerate().skip(1) {
            // The incoming scene starts `d` before the joined stream ends.
            let offset = (length - d).max(TimeUs::ZERO);
            let label = format!("x{s}");
            filters.push(format!(
                "[{prev}][s{s}]xfade=transition=fade:duration={}:offset={}[{label}]",
                secs(d),
                secs(offset)
            ));
            length = offset + scene.duration_us();
            prev = label;
        }
        (filters, prev)
    } else {
        let labels: String = (0..scenes.len()).map(|s| format!("[s{s}]")).collect();
        filters.push(format!("{labels}concat=n={}:v=1:a=0[joined]", scenes.len()));
        (filters, "joined".to_string())
    }
}

pub fn composite_invocation(job: &AssemblyJob<'_>) -> Invocation {
    let scenes = group_scenes(job.parts);
    let transition = job.settings.transition;
    let (mut filters, joined) = scene_graph(&scenes, transition);
    let visual = composed_duration(&scenes, transition);
    filters.push(format!("[{joined}]{}[v]", job.finishing_chain(visual)));

    let mut inputs: Vec<EncoderInput> = job.parts.iter().map(|p| EncoderInput::file(&p.path)).collect();
    inputs.push(EncoderInput::file(job.audio));

    Invocation {
        inputs,
        filter_graph: Some(filters.join(";")),
        output_args: job.output_args(job.parts.len()),
        output_path: job.output.to_path_buf(),
        duration_us: job.audio_duration_us,
    }
}

async fn attempt_fast<E: Encoder>(
    encoder: &E,
    job: &AssemblyJob<'_>,
    progress: Option<&watch::Sender<RenderProgress>>,
) -> AssemblyAttempt {
    let list_path = job.scratch.join("concat_list.txt");
    let written = concat_list(job.parts)
        .and_then(|list| std::fs::write(&list_path, list).map_err(RenderError::from));
    if let Err(e) = written {
        return AssemblyAttempt::Recoverable(e);
    }
    encoder.run(&fast_invocation(job, &list_path), progress).await.into()
}

/// Produce the output video from rendered parts. Crossfade goes straight to
/// the composite path; otherwise the fast path is tried first and a
/// recoverable failure retries through the composite path.
pub async fn assemble<E: Encoder>(
    encoder: &E,
    job: &AssemblyJob<'_>,
    progress: Option<&watch::Sender<RenderProgress>>,
) -> Result<AssemblyPath> {
    if job.parts.is_empty() {
        return Err(RenderError::NoParts);
    }

    if !job.settings.transition.is_crossfade() {
        match attempt_fast(encoder, job, progress).await {
            AssemblyAttempt::Done => {
                tracing::info!("Assembled {} (fast path)", job.output.display());
                return Ok(AssemblyPath::Fast);
            }
            AssemblyAttempt::Recoverable(e) => {
                tracing::warn!("Fast assembly failed, retrying with composite path: {}", e);
            }
            AssemblyAttempt::Fatal(e) => return Err(e),
        }
    }

    encoder.run(&composite_invocation(job), progress).await?;
    tracing::info!("Assembled {} (composite path)", job.output.display());
    Ok(AssemblyPath::Composite)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::WorkerPlan;
    use crate::testing::FakeEncoder;
    use tempfile::TempDir;

    fn secs_us(s: f64) -> TimeUs {
        TimeUs::from_seconds(s)
    }

    fn part(chunk_index: usize, block_index: usize, duration: f64) -> PartFile {
        PartFile {
            chunk_index,
            block_index,
            path: PathBuf::from(format!("/scratch/part_{chunk_index:05}.mp4")),
            duration_us: secs_us(duration),
            pad_head_us: TimeUs::ZERO,
            pad_tail_us: TimeUs::ZERO,
            is_block_start: false,
            is_block_end: false,
        }
    }

    fn settings(transition: Transition) -> RenderSettings {
        RenderSettings {
            resolution: Resolution::new(1080, 1920),
            fps: 24,
            preset: "ultrafast".into(),
            crf: 23,
            transition,
            workers: WorkerPlan::for_cores(4),
        }
    }

    fn job<'a>(
        parts: &'a [PartFile],
        settings: &'a RenderSettings,
        style: &'a SubtitleStyle,
        scratch: &'a Path,
        audio_secs: f64,
    ) -> AssemblyJob<'a> {
        AssemblyJob {
            parts,
            audio: Path::new("/in/voice.mp3"),
            audio_duration_us: secs_us(audio_secs),
            subtitles: Some(Path::new("/run/subs.srt")),
            style,
            settings,
            scratch,
            output: Path::new("/out/batch_1.mp4"),
        }
    }

    #[test]
    fn scenes_group_by_contiguous_block() {
        let parts = vec![part(0, 0, 15.0), part(1, 0, 5.0), part(2, 1, 10.0), part(3, 2, 7.0)];
        let scenes = group_scenes(&parts);
        assert_eq!(scenes.len(), 3);
        assert_eq!(scenes[0].parts.len(), 2);
        assert_eq!(scenes[0].duration_us(), secs_us(20.0));
        assert_eq!(scenes[2].block_index, 2);
    }

    #[test]
    fn crossfade_overlaps_scenes() {
        let scenes = group_scenes(&[part(0, 0, 10.5), part(1, 1, 11.0), part(2, 2, 10.5)]);
        assert_eq!(composed_duration(&scenes, Transition::crossfade(0.5)), secs_us(31.0));
        assert_eq!(composed_duration(&scenes, Transition::none()), secs_us(32.0));
        assert_eq!(composed_duration(&scenes, Transition::fade_to_black(0.5)), secs_us(32.0));
    }

    #[test]
    fn reconcile_follows_audio() {
        assert_eq!(reconcile(secs_us(35.0), secs_us(30.0)), Reconcile::Trim(secs_us(30.0)));
        assert_eq!(reconcile(secs_us(30.8), secs_us(30.0)), Reconcile::Keep);
        assert_eq!(reconcile(secs_us(28.0), secs_us(30.0)), Reconcile::Hold(secs_us(2.0)));
        assert_eq!(reconcile(secs_us(30.0), secs_us(30.0)), Reconcile::Keep);
    }

    #[test]
    fn reconciled_length_stays_near_audio() {
        let audio = secs_us(30.0);
        for visual in [0.5, 12.0, 29.0, 29.99, 30.0, 30.4, 31.0, 31.2, 45.0, 120.0] {
            let visual = secs_us(visual);
            let out = reconcile(visual, audio).output_duration(visual);
            assert!(
                (out.as_seconds() - audio.as_seconds()).abs() <= 1.0,
                "visual {visual} -> {out}"
            );
        }
    }

    #[test]
    fn concat_list_escapes_quotes() {
        let mut p = part(0, 0, 1.0);
        p.path = PathBuf::from("/tmp/it's.mp4");
        assert_eq!(
            concat_list(&[p, part(1, 0, 1.0)]).unwrap(),
            "file '/tmp/it'\\''s.mp4'\nfile '/scratch/part_00001.mp4'\n"
        );
    }

    #[test]
    fn concat_list_entries_are_absolute() {
        let mut p = part(0, 0, 1.0);
        p.path = PathBuf::from("output/run/parts_1/part_00000.mp4");
        let list = concat_list(&[p]).unwrap();
        let cwd = std::env::current_dir().unwrap();
        let expected = cwd.join("output/run/parts_1/part_00000.mp4");
        assert_eq!(list, format!("file '{}'\n", expected.display()));
    }

    #[test]
    fn fast_invocation_muxes_audio_and_subtitles() {
        let parts = vec![part(0, 0, 15.0), part(1, 1, 10.0)];
        let s = settings(Transition::none());
        let style = SubtitleStyle::default();
        let scratch = PathBuf::from("/scratch");
        let inv = fast_invocation(&job(&parts, &s, &style, &scratch, 26.0), Path::new("/scratch/list.txt"));

        assert_eq!(inv.inputs[0].options, ["-f", "concat", "-safe", "0"]);
        assert_eq!(inv.inputs[1].source, "/in/voice.mp3");
        let graph = inv.filter_graph.unwrap();
        assert!(graph.starts_with("[0:v]tpad=stop_mode=clone:stop_duration=1.000,subtitles='/run/subs.srt'"));
        assert!(graph.ends_with("format=yuv420p[v]"));
        assert!(inv.output_args.windows(2).any(|w| w == ["-map", "1:a"]));
    }

    #[test]
    fn composite_invocation_chains_xfade_offsets() {
        // Blocks of 10 s, 10 s, 10 s with 1 s crossfade pads.
        let parts = vec![
            part(0, 0, 11.0),
            part(1, 1, 12.0),
            part(2, 2, 6.0),
            part(3, 2, 5.0),
        ];
        let s = settings(Transition::crossfade(1.0));
        let style = SubtitleStyle::default();
        let scratch = PathBuf::from("/scratch");
        let inv = composite_invocation(&job(&parts, &s, &style, &scratch, 30.0));
        let graph = inv.filter_graph.unwrap();

        assert_eq!(inv.inputs.len(), 5);
        assert!(graph.contains("[2:v][3:v]concat=n=2:v=1:a=0,settb=AVTB,setpts=PTS-STARTPTS[s2]"));
        assert!(graph.contains("[s0][s1]xfade=transition=fade:duration=1.000:offset=10.000[x1]"));
        assert!(graph.contains("[x1][s2]xfade=transition=fade:duration=1.000:offset=21.000[x2]"));
        // 34 s of parts minus two overlaps is 32 s, beyond the slack.
        assert!(graph.contains("[x2]trim=duration=30.000,setpts=PTS-STARTPTS,"));
        assert!(inv.output_args.windows(2).any(|w| w == ["-map", "4:a"]));
    }

    #[test]
    fn composite_without_crossfade_concatenates_scenes() {
        let parts = vec![part(0, 0, 10.0), part(1, 1, 10.0)];
        let s = settings(Transition::none());
        let style = SubtitleStyle::default();
        let scratch = PathBuf::from("/scratch");
        let graph = composite_invocation(&job(&parts, &s, &style, &scratch, 20.0))
            .filter_graph
            .unwrap();
        assert!(graph.contains("[s0][s1]concat=n=2:v=1:a=0[joined]"));
        assert!(graph.contains("[joined]subtitles="));
    }

    #[tokio::test]
    async fn fast_path_is_used_without_crossfade() {
        let scratch = TempDir::new().unwrap();
        let parts = vec![part(0, 0, 10.0), part(1, 1, 10.0)];
        let s = settings(Transition::fade_to_black(0.5));
        let style = SubtitleStyle::default();
        let out = scratch.path().join("out.mp4");
        let mut j = job(&parts, &s, &style, scratch.path(), 20.0);
        j.output = &out;
        let encoder = FakeEncoder::new();

        assert_eq!(assemble(&encoder, &j, None).await.unwrap(), AssemblyPath::Fast);
        assert_eq!(encoder.invocations().len(), 1);
        let list = std::fs::read_to_string(scratch.path().join("concat_list.txt")).unwrap();
        assert_eq!(list.lines().count(), 2);
    }

    #[tokio::test]
    async fn fast_path_failure_falls_back_to_composite() {
        let scratch = TempDir::new().unwrap();
        let parts = vec![part(0, 0, 10.0), part(1, 1, 10.0)];
        let s = settings(Transition::none());
        let style = SubtitleStyle::default();
        let out = scratch.path().join("out.mp4");
        let mut j = job(&parts, &s, &style, scratch.path(), 20.0);
        j.output = &out;
        let encoder = FakeEncoder::new().failing(|_, inv| {
            inv.inputs[0]
                .options
                .contains(&"concat".to_string())
                .then(|| RenderError::FfmpegFailed("concat demuxer".into()))
        });

        assert_eq!(assemble(&encoder, &j, None).await.unwrap(), AssemblyPath::Composite);
        assert_eq!(encoder.invocations().len(), 2);
        assert!(out.exists());
    }

    #[tokio::test]
    async fn missing_encoder_does_not_fall_back() {
        let scratch = TempDir::new().unwrap();
        let parts = vec![part(0, 0, 10.0)];
        let s = settings(Transition::none());
        let style = SubtitleStyle::default();
        let encoder = FakeEncoder::new().failing(|_, _| Some(RenderError::FfmpegNotFound));

        let err = assemble(&encoder, &job(&parts, &s, &style, scratch.path(), 10.0), None)
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::FfmpegNotFound));
        assert_eq!(encoder.invocations().len(), 1);
    }

    #[tokio::test]
    async fn crossfade_goes_straight_to_composite() {
        let scratch = TempDir::new().unwrap();
        let parts = vec![part(0, 0, 10.5), part(1, 1, 10.5)];
        let s = settings(Transition::crossfade(0.5));
        let style = SubtitleStyle::default();
        let out = scratch.path().join("out.mp4");
        let mut j = job(&parts, &s, &style, scratch.path(), 20.0);
        j.output = &out;
        let encoder = FakeEncoder::new();

        assert_eq!(assemble(&encoder, &j, None).await.unwrap(), AssemblyPath::Composite);
        let invocations = encoder.invocations();
        assert_eq!(invocations.len(), 1);
        assert!(invocations[0].filter_graph.as_ref().unwrap().contains("xfade"));
    }

    #[tokio::test]
    async fn no_parts_is_an_error() {
        let scratch = TempDir::new().unwrap();
        let s = settings(Transition::none());
        let style = SubtitleStyle::default();
        let err = assemble(&FakeEncoder::new(), &job(&[], &s, &style, scratch.path(), 1.0), None)
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::NoParts));
    }

    #[tokio::test]
    async fn premix_loops_music_under_narration() {
        let scratch = TempDir::new().unwrap();
        let bgm = BgmSettings {
            path: PathBuf::from("/music/calm.mp3"),
            volume: 0.3,
        };
        let encoder = FakeEncoder::new();
        let mixed = premix_audio(&encoder, Path::new("/in/voice.mp3"), Some(&bgm), secs_us(30.0), scratch.path()).await;
        assert_eq!(mixed, scratch.path().join("mixed_audio.m4a"));
        let inv = &encoder.invocations()[0];
        assert_eq!(inv.inputs[1].options, ["-stream_loop", "-1"]);
        assert!(inv.filter_graph.as_ref().unwrap().contains("volume=0.3"));
        assert!(inv.filter_graph.as_ref().unwrap().contains("duration=first"));
        // Narration keeps full level; only the music is attenuated.
        assert!(inv.filter_graph.as_ref().unwrap().contains(":normalize=0[aout]"));

        let plain = premix_audio(&encoder, Path::new("/in/voice.mp3"), None, secs_us(30.0), scratch.path()).await;
        assert_eq!(plain, PathBuf::from("/in/voice.mp3"));

        let failing = FakeEncoder::new().failing(|_, _| Some(RenderError::FfmpegFailed("x".into())));
        let fallback = premix_audio(&failing, Path::new("/in/voice.mp3"), Some(&bgm), secs_us(30.0), scratch.path()).await;
        assert_eq!(fallback, PathBuf::from("/in/voice.mp3"));
    }
}
