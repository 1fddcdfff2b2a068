//! dynaplay - Main entry point
//!
//! Plays one audio file through the output device with dynamic-range
//! compression, until the file ends or Ctrl+C / SIGTERM arrives.
//!
//! Exit status: 0 completed, 130 interrupted, 1 stopped partway,
//! 2 could not start.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use dynaplay::audio::{CpalOutput, FrameSource, PrefetchSource, SymphoniaSource};
use dynaplay::config::{ConfigOverrides, PlayerConfig};
use dynaplay::engine::load_engine;
use dynaplay::pipeline::StreamStatus;
use dynaplay::{LifecycleController, StreamOutcome, StreamReport};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Upper bound on the initial decode-ahead wait
const PREFILL_TIMEOUT: Duration = Duration::from_secs(5);

/// Command-line arguments for dynaplay
#[derive(Parser, Debug)]
#[command(name = "dynaplay")]
#[command(about = "Real-time audio playback with dynamic-range compression")]
#[command(version)]
struct Args {
    /// Audio file to play
    file: PathBuf,

    /// Config file (overrides DYNAPLAY_CONFIG and the per-user default)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output device name
    #[arg(short, long, env = "DYNAPLAY_DEVICE")]
    device: Option<String>,

    /// Dynamics engine: builtin or native
    #[arg(short, long, env = "DYNAPLAY_ENGINE")]
    engine: Option<String>,

    /// Frames per processing block
    #[arg(long)]
    block_frames: Option<usize>,

    /// Decode-ahead window in milliseconds (at least 1)
    #[arg(long)]
    prefetch_ms: Option<u32>,

    /// Compression threshold, linear amplitude in (0, 1]
    #[arg(long)]
    threshold: Option<f32>,

    /// Compression ratio (>= 1)
    #[arg(long)]
    ratio: Option<f32>,

    /// Attack time in seconds
    #[arg(long)]
    attack: Option<f32>,

    /// Release time in seconds
    #[arg(long)]
    release: Option<f32>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            device: self.device.clone(),
            engine: self.engine.clone(),
            block_frames: self.block_frames,
            prefetch_ms: self.prefetch_ms,
            threshold: self.threshold,
            ratio: self.ratio,
            attack: self.attack,
            release: self.release,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Config is read before logging starts so its level can apply
    let toml = dynaplay_common::config::load_or_default(args.config.as_deref());
    let level = toml
        .as_ref()
        .map(|t| t.logging.level.clone())
        .unwrap_or_else(|_| "info".to_string());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("dynaplay={},dynaplay_common={}", level, level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting dynaplay (git {}, built {}, {})",
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    match run(args, toml).await {
        Ok(StreamOutcome::Completed) => ExitCode::SUCCESS,
        Ok(StreamOutcome::Interrupted) => ExitCode::from(130),
        Ok(StreamOutcome::Failed(e)) => {
            error!("Playback stopped partway: {}", e);
            ExitCode::from(1)
        }
        Err(e) => {
            error!("Could not start playback: {:#}", e);
            ExitCode::from(2)
        }
    }
}

async fn run(
    args: Args,
    toml: dynaplay_common::Result<dynaplay_common::TomlConfig>,
) -> Result<StreamOutcome> {
    let toml = toml.context("Failed to load configuration")?;
    let config = PlayerConfig::resolve(&toml, &args.overrides()).context("Invalid configuration")?;

    let status = StreamStatus::new();
    let stream_status = Arc::clone(&status);
    let path = args.file;

    // The controller blocks until the stream ends; keep it off the runtime
    let mut stream = tokio::task::spawn_blocking(move || play(&path, &config, stream_status));

    let joined = tokio::select! {
        res = &mut stream => res,
        _ = shutdown_signal() => {
            status.interrupt();
            stream.await
        }
    };

    let report = joined
        .context("Playback task panicked")?
        .context("Failed to start stream")?;

    info!(
        "Played {} frames in {:.1}s ({} callbacks, {} underruns, {} deadline misses)",
        report.stats.frames_delivered,
        report.elapsed.as_secs_f64(),
        report.stats.callback_count,
        report.stats.underrun_count,
        report.stats.deadline_misses
    );

    Ok(report.outcome)
}

/// Open the file, load the engine and the device, and stream to the end
fn play(
    path: &Path,
    config: &PlayerConfig,
    status: Arc<StreamStatus>,
) -> dynaplay::Result<StreamReport> {
    let source = SymphoniaSource::open(path)?;
    let format = source.format();
    info!("Opened {} ({})", path.display(), format);

    let mut source =
        PrefetchSource::spawn(Box::new(source), config.prefetch_frames(format.sample_rate))?;
    if !source.wait_ready(PREFILL_TIMEOUT) {
        warn!(
            "Decode-ahead not filled after {:?} ({} frames buffered), starting anyway",
            PREFILL_TIMEOUT,
            source.buffered_frames()
        );
    }

    let engine = load_engine(&config.engine, &format)?;
    let device = CpalOutput::new(config.device.as_deref())?;

    let mut controller = LifecycleController::new(device, config.stream_settings(), status);
    controller.run(Box::new(source), engine)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, stopping playback");
        },
        _ = terminate => {
            info!("Received terminate signal, stopping playback");
        },
    }
}
