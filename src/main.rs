// SYNOID Main Entry Point
// Copyright (c) 2026 Xing_The_Creator | SYNOID

use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use synoid_timeline::composer::default_output_path;
use synoid_timeline::composer::script::{Script, TtsMetadata};
use synoid_timeline::render::DurationProber;
use synoid_timeline::{Settings, TimelineComposer};

#[derive(Parser)]
#[command(name = "synoid-timeline")]
#[command(about = "SYNOID Timeline Renderer", long_about = None)]
struct Cli {
    /// settings.json to load (defaults apply when missing)
    #[arg(long, global = true, default_value = "config/settings.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a script into a finished video
    Render {
        #[arg(short, long)]
        script: PathBuf,

        /// TTS metadata produced by the narration stage
        #[arg(long)]
        tts: Option<PathBuf>,

        /// Subtitle file to burn in (replaces per-segment captions)
        #[arg(long)]
        subtitles: Option<PathBuf>,

        #[arg(short, long)]
        output: PathBuf,

        /// Print the ffmpeg command instead of running it
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the full timeline plan as JSON
    Plan {
        #[arg(short, long)]
        script: PathBuf,

        #[arg(long)]
        tts: Option<PathBuf>,

        #[arg(long)]
        subtitles: Option<PathBuf>,
    },

    /// Estimate duration and file size from the script alone
    Estimate {
        #[arg(short, long)]
        script: PathBuf,
    },

    /// Probe a media file's duration
    Probe { path: PathBuf },
}

fn load_inputs(script: &Path, tts: Option<&Path>) -> anyhow::Result<(Script, Option<TtsMetadata>)> {
    let script = Script::load(script).with_context(|| format!("loading script {:?}", script))?;
    let tts = match tts {
        Some(path) if path.exists() => {
            Some(TtsMetadata::load(path).with_context(|| format!("loading TTS metadata {:?}", path))?)
        }
        Some(path) => {
            warn!("[COMPOSER] TTS metadata {:?} not found, using nominal durations", path);
            None
        }
        None => None,
    };
    Ok((script, tts))
}

async fn wait_for_ctrl_c() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
    warn!("[RENDER] Interrupt received, stopping ffmpeg");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Cli::parse();
    let settings = Settings::load(&args.config)?;

    match args.command {
        Commands::Render { script, tts, subtitles, output, dry_run } => {
            let (script, tts) = load_inputs(&script, tts.as_deref())?;
            let composer = TimelineComposer::new(settings);
            if dry_run {
                let plan = composer.plan(&script, tts.as_ref(), subtitles.as_deref(), &output).await?;
                let command = composer.preview(&plan).await?;
                println!("{}", command);
                return Ok(());
            }
            let outcome = composer
                .compose_with_cancel(&script, tts.as_ref(), subtitles.as_deref(), &output, wait_for_ctrl_c())
                .await?;
            info!("✅ Video ready: {:?}", outcome.output_path);
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Commands::Plan { script, tts, subtitles } => {
            let (script, tts) = load_inputs(&script, tts.as_deref())?;
            let output = default_output_path(Path::new("output"), &script.title);
            let composer = TimelineComposer::new(settings);
            let plan = composer.plan(&script, tts.as_ref(), subtitles.as_deref(), &output).await?;
            let command = composer.preview(&plan).await?;
            println!("{}", serde_json::to_string_pretty(&plan)?);
            eprintln!("{}", command);
        }
        Commands::Estimate { script } => {
            let script = Script::load(&script).with_context(|| format!("loading script {:?}", script))?;
            let estimate = TimelineComposer::new(settings).estimate(&script);
            println!("{}", serde_json::to_string_pretty(&estimate)?);
        }
        Commands::Probe { path } => {
            let prober = DurationProber::new(&settings.binaries.ffprobe, settings.binaries.probe_timeout());
            match prober.try_probe(&path).await {
                Ok(seconds) => println!("{:.3}", seconds),
                Err(e) => anyhow::bail!("could not probe {:?}: {}", path, e),
            }
        }
    }

    Ok(())
}
