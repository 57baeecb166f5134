use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context as _;
use autoclip_core::config::RunConfig;
use autoclip_core::types::{FolderSpec, Resolution, TimeUs};
use autoclip_render::ffmpeg::{binary_available, FfmpegEncoder, RenderProgress};
use autoclip_render::pipeline::{BatchOutcome, Pipeline};
use autoclip_render::preprocess;
use autoclip_render::probe::{Ffprobe, MediaProbe};
use clap::{Parser, Subcommand};
use tokio::sync::watch;

#[derive(Parser, Debug)]
#[command(name = "autoclip", version, about = "Stitch weighted clip folders onto narration")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render every requested output video.
    Run(RunArgs),
    /// Print the timeline plan as JSON without encoding anything.
    Plan(PlanArgs),
    /// Normalize a clip library to one resolution.
    Preprocess(PreprocessArgs),
    /// Write a default run configuration.
    InitConfig(InitArgs),
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Run configuration (TOML or JSON).
    #[arg(long)]
    config: PathBuf,

    /// Override the number of output videos.
    #[arg(long)]
    count: Option<usize>,
}

#[derive(Parser, Debug)]
struct PlanArgs {
    #[arg(long)]
    config: PathBuf,

    /// Plan for this many seconds instead of probing the narration.
    #[arg(long)]
    duration: Option<f64>,
}

#[derive(Parser, Debug)]
struct PreprocessArgs {
    #[arg(long)]
    input: PathBuf,

    #[arg(long)]
    output: PathBuf,

    #[arg(long, default_value_t = 1080)]
    width: u32,

    #[arg(long, default_value_t = 1920)]
    height: u32,
}

#[derive(Parser, Debug)]
struct InitArgs {
    /// Destination; `.toml` writes TOML, anything else JSON.
    path: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.cmd {
        Command::Run(args) => cmd_run(args).await,
        Command::Plan(args) => cmd_plan(args).map(|()| true),
        Command::Preprocess(args) => cmd_preprocess(args).await.map(|()| true),
        Command::InitConfig(args) => cmd_init(args).map(|()| true),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .init();
}

fn load_config(path: &Path) -> anyhow::Result<RunConfig> {
    RunConfig::load_from_file(path)
        .with_context(|| format!("load config '{}'", path.display()))
}

fn require_binary(binary: &Path) -> anyhow::Result<()> {
    if binary_available(binary) {
        Ok(())
    } else {
        anyhow::bail!("'{}' is not installed or not on PATH", binary.display())
    }
}

/// Returns whether at least one output succeeded.
async fn cmd_run(args: RunArgs) -> anyhow::Result<bool> {
    let mut config = load_config(&args.config)?;
    if let Some(count) = args.count {
        config.output_count = count;
    }
    require_binary(&config.encode.ffmpeg)?;
    require_binary(&config.encode.ffprobe)?;

    let (tx, mut rx) = watch::channel(RenderProgress::default());
    let progress = tokio::spawn(async move {
        let mut last_logged = -10.0;
        while rx.changed().await.is_ok() {
            let p = rx.borrow_and_update().clone();
            if p.percent < last_logged {
                last_logged = -10.0;
            }
            if p.percent - last_logged >= 10.0 {
                last_logged = p.percent;
                match p.eta_seconds {
                    Some(eta) => tracing::info!(
                        "Encoding {:.0}% at {} (eta {:.0}s)",
                        p.percent,
                        p.speed,
                        eta
                    ),
                    None => tracing::info!("Encoding {:.0}% at {}", p.percent, p.speed),
                }
            }
        }
    });

    let mut pipeline = Pipeline::from_config(config).with_progress(tx);
    let report = pipeline.run().await.context("run failed")?;
    drop(pipeline);
    let _ = progress.await;

    for (i, outcome) in report.outputs.iter().enumerate() {
        match outcome {
            BatchOutcome::Succeeded { video, path, .. } => {
                tracing::info!("Output {}: {} ({:?} path)", i + 1, video.display(), path)
            }
            BatchOutcome::Failed { error } => tracing::error!("Output {} failed: {}", i + 1, error),
        }
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(!report.all_failed())
}

fn cmd_plan(args: PlanArgs) -> anyhow::Result<()> {
    let config = load_config(&args.config)?;
    let total = match args.duration {
        Some(secs) => TimeUs::from_seconds(secs),
        None => {
            Ffprobe::new(config.encode.ffprobe.clone())
                .probe(&config.audio_path)
                .with_context(|| format!("probe '{}'", config.audio_path.display()))?
                .duration_us
        }
    };
    let plan = autoclip_core::planner::TimelinePlan::new(total, &config.folders, config.transition);
    tracing::info!(
        "{} blocks, {} chunks over {}",
        plan.blocks.len(),
        plan.chunks.len(),
        plan.total_us
    );
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}

async fn cmd_preprocess(args: PreprocessArgs) -> anyhow::Result<()> {
    let encoder = FfmpegEncoder::default();
    require_binary(Path::new("ffmpeg"))?;
    let summary = preprocess::preprocess_folder(
        &encoder,
        &args.input,
        &args.output,
        Resolution::new(args.width, args.height),
    )
    .await
    .with_context(|| format!("preprocess '{}'", args.input.display()))?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn cmd_init(args: InitArgs) -> anyhow::Result<()> {
    let config = RunConfig::new(
        "assets/audio/narration.mp3",
        vec![
            FolderSpec::new("intro", 1.0),
            FolderSpec::new("main", 3.0).with_random_cuts(2.0, 5.0),
        ],
    );
    config
        .save_to_file(&args.path)
        .with_context(|| format!("write config '{}'", args.path.display()))?;
    eprintln!("wrote {}", args.path.display());
    Ok(())
}
