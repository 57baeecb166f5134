//! The batch loop: one run produces `output_count` independent videos from
//! a shared narration, subtitle track and timeline plan.

use autoclip_core::config::RunConfig;
use autoclip_core::metadata::MetadataRecorder;
use autoclip_core::naming;
use autoclip_core::planner::TimelinePlan;
use autoclip_core::subtitles::{self, SUBTITLE_SHIFT};
use autoclip_core::types::TimeUs;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

use crate::assembler::{self, AssemblyJob, AssemblyPath};
use crate::error::{RenderError, Result};
use crate::external::{self, CommandSynthesizer, CommandTranscriber, Synthesizer, Transcriber};
use crate::ffmpeg::{Encoder, FfmpegEncoder, RenderProgress};
use crate::probe::{Ffprobe, MediaProbe};
use crate::renderer::{self, RenderSettings, WorkerPlan};
use crate::source::ClipSourceManager;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchOutcome {
    Succeeded {
        video: PathBuf,
        /// `None` when the sidecar could not be written.
        metadata: Option<PathBuf>,
        path: AssemblyPath,
    },
    Failed {
        error: String,
    },
}

impl BatchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, BatchOutcome::Succeeded { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub batch_dir: PathBuf,
    pub outputs: Vec<BatchOutcome>,
}

impl RunReport {
    pub fn succeeded(&self) -> usize {
        self.outputs.iter().filter(|o| o.is_success()).count()
    }

    pub fn all_failed(&self) -> bool {
        self.succeeded() == 0
    }
}

/// Narration and subtitles shared by every batch of a run.
struct RunInputs {
    audio: PathBuf,
    audio_duration_us: TimeUs,
    subtitles: PathBuf,
}

pub struct Pipeline<P, E, T, S> {
    config: RunConfig,
    sources: ClipSourceManager<P>,
    encoder: Arc<E>,
    transcriber: T,
    synthesizer: S,
    workers: WorkerPlan,
    progress: Option<watch::Sender<RenderProgress>>,
}

impl Pipeline<Ffprobe, FfmpegEncoder, CommandTranscriber, CommandSynthesizer> {
    /// Pipeline backed by the configured encoder and speech tool binaries.
    pub fn from_config(config: RunConfig) -> Self {
        let probe = Ffprobe::new(config.encode.ffprobe.clone());
        let encoder = FfmpegEncoder::new(config.encode.ffmpeg.clone());
        let transcriber = CommandTranscriber::new(config.tools.transcriber.clone());
        let synthesizer = CommandSynthesizer::new(config.tools.synthesizer.clone());
        Self::new(config, probe, encoder, transcriber, synthesizer)
    }
}

impl<P, E, T, S> Pipeline<P, E, T, S>
where
    P: MediaProbe,
    E: Encoder,
    T: Transcriber,
    S: Synthesizer,
{
    pub fn new(config: RunConfig, probe: P, encoder: E, transcriber: T, synthesizer: S) -> Self {
        let sources = ClipSourceManager::new(probe, config.video_root.clone(), config.seed);
        Self {
            config,
            sources,
            encoder: Arc::new(encoder),
            transcriber,
            synthesizer,
            workers: WorkerPlan::detect(),
            progress: None,
        }
    }

    pub fn with_workers(mut self, workers: WorkerPlan) -> Self {
        self.workers = workers;
        self
    }

    /// Report final-encode progress on this channel.
    pub fn with_progress(mut self, progress: watch::Sender<RenderProgress>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn sources(&self) -> &ClipSourceManager<P> {
        &self.sources
    }

    /// Timeline plan for narration of the given length.
    pub fn plan(&self, audio_duration: TimeUs) -> TimelinePlan {
        TimelinePlan::new(audio_duration, &self.config.folders, self.config.transition)
    }

    /// Produce every requested output. Configuration and narration errors
    /// fail the run; a failed batch is recorded and the next one proceeds.
    pub async fn run(&mut self) -> Result<RunReport> {
        self.config.validate()?;

        let run_id = Uuid::new_v4();
        let stamp = naming::timestamp(chrono::Local::now());
        let audio_name = if self.config.narration.is_some() && self.config.audio_path.as_os_str().is_empty() {
            PathBuf::from("narration")
        } else {
            self.config.audio_path.clone()
        };
        let batch_dir = self.config.output_dir.join(naming::batch_dir_name(
            self.config.output_tag.as_deref(),
            &stamp,
            &audio_name,
        ));
        std::fs::create_dir_all(&batch_dir)?;
        let batch_dir = std::path::absolute(&batch_dir)?;
        tracing::info!("Run {} writing to {}", run_id, batch_dir.display());

        let inputs = self.prepare_inputs(&batch_dir, &stamp).await?;
        let plan = self.plan(inputs.audio_duration_us);
        tracing::info!(
            "Planned {} blocks, {} chunks over {}",
            plan.blocks.len(),
            plan.chunks.len(),
            plan.total_us
        );

        let mut outputs = Vec::with_capacity(self.config.output_count);
        for batch_index in 0..self.config.output_count {
            tracing::info!("Batch {}/{}", batch_index + 1, self.config.output_count);
            let outcome = match self
                .run_batch(run_id, batch_index, &plan, &inputs, &batch_dir)
                .await
            {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!("Batch {} failed: {}", batch_index + 1, e);
                    BatchOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            };
            outputs.push(outcome);
        }

        let report = RunReport {
            run_id,
            batch_dir,
            outputs,
        };
        tracing::info!(
            "Run finished: {}/{} outputs succeeded",
            report.succeeded(),
            report.outputs.len()
        );
        Ok(report)
    }

    async fn prepare_inputs(&self, batch_dir: &Path, stamp: &str) -> Result<RunInputs> {
        let audio = match &self.config.narration {
            Some(script) => {
                external::synthesize_script(&self.synthesizer, script, &batch_dir.join("narration.mp3"))
                    .await?
            }
            None => self.config.audio_path.clone(),
        };

        let probe = self.sources.probe().probe(&audio)?;
        if probe.duration_us <= TimeUs::ZERO {
            return Err(RenderError::FfprobeFailed(format!(
                "{} has no duration",
                audio.display()
            )));
        }
        tracing::info!("Narration {} is {}", audio.display(), probe.duration_us);

        let original = match &self.config.subtitle_path {
            Some(path) => path.clone(),
            None => {
                let output = batch_dir.join(naming::generated_subtitle_name(stamp));
                self.transcriber.transcribe(&audio, &output).await?;
                output
            }
        };

        Ok(RunInputs {
            audio,
            audio_duration_us: probe.duration_us,
            subtitles: shift_subtitles(&original, batch_dir),
        })
    }

    async fn run_batch(
        &mut self,
        run_id: Uuid,
        batch_index: usize,
        plan: &TimelinePlan,
        inputs: &RunInputs,
        batch_dir: &Path,
    ) -> Result<BatchOutcome> {
        self.sources.reset_cursors();

        let scratch = batch_dir.join(format!("parts_{}", Uuid::new_v4().simple()));
        std::fs::create_dir_all(&scratch)?;

        let result = self
            .render_batch(run_id, batch_index, plan, inputs, batch_dir, &scratch)
            .await;

        if !self.config.keep_scratch {
            if let Err(e) = std::fs::remove_dir_all(&scratch) {
                tracing::warn!("Failed to remove scratch {}: {}", scratch.display(), e);
            }
        }
        result
    }

    async fn render_batch(
        &mut self,
        run_id: Uuid,
        batch_index: usize,
        plan: &TimelinePlan,
        inputs: &RunInputs,
        batch_dir: &Path,
        scratch: &Path,
    ) -> Result<BatchOutcome> {
        let settings = RenderSettings::from_config(&self.config, self.workers);
        let mut recorder = MetadataRecorder::new(
            run_id,
            batch_index,
            &inputs.audio,
            inputs.audio_duration_us,
            self.config.transition,
        );

        let parts = renderer::render_chunks(
            &plan.chunks,
            &mut self.sources,
            Arc::clone(&self.encoder),
            &settings,
            scratch,
            &mut recorder,
        )
        .await?;

        let audio = assembler::premix_audio(
            self.encoder.as_ref(),
            &inputs.audio,
            self.config.bgm.as_ref(),
            inputs.audio_duration_us,
            scratch,
        )
        .await;

        let video = naming::video_path(batch_dir, batch_index);
        let job = AssemblyJob {
            parts: &parts,
            audio: &audio,
            audio_duration_us: inputs.audio_duration_us,
            subtitles: Some(&inputs.subtitles),
            style: &self.config.subtitle_style,
            settings: &settings,
            scratch,
            output: &video,
        };
        let path = assembler::assemble(self.encoder.as_ref(), &job, self.progress.as_ref()).await?;

        let metadata = recorder.finish().persist_next_to(&video);
        Ok(BatchOutcome::Succeeded {
            video,
            metadata,
            path,
        })
    }
}

/// Write the track shifted earlier by the perceptual-lag offset, or fall
/// back to the original when it cannot be read.
fn shift_subtitles(original: &Path, batch_dir: &Path) -> PathBuf {
    let shifted_path = batch_dir.join("subtitles_shifted.srt");
    let shifted = subtitles::load_srt(original)
        .and_then(|entries| subtitles::save_srt(&shifted_path, &subtitles::shift(&entries, SUBTITLE_SHIFT)));
    match shifted {
        Ok(()) => shifted_path,
        Err(e) => {
            tracing::warn!(
                "Could not shift subtitles {}, using them unshifted: {}",
                original.display(),
                e
            );
            original.to_path_buf()
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
