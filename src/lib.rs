pub mod core;
pub mod models;
pub mod platform;

use anyhow::Context;
use crate::core::config::Config;
use crate::core::frame_sink::PngSequenceSink;
use crate::core::frame_source::open_frame_source;
use crate::core::ml_models::ModelManager;
use crate::core::pose_detector::create_detector;
use crate::core::tracking_loop::TrackingSession;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber: JSON lines when `LOG_FORMAT=json`, coloured text otherwise.
///
/// `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("posetrack=info,posetrack_lib=info,ort=warn"));

    let result = if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .try_init()
    };

    if let Err(e) = result {
        eprintln!("Tracing already initialised: {}", e);
    }
}

/// Entry point of the `posetrack` binary: `posetrack [config.json]`.
///
/// Without an argument the configuration is read from (or created at)
/// `~/.posetrack/config/settings.json`. Tracks until Ctrl-C.
pub fn run() -> anyhow::Result<()> {
    init_tracing();

    let result = load_config().and_then(|config| {
        let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
        runtime.block_on(track(config))
    });

    if let Err(e) = &result {
        error!("posetrack failed: {:#}", e);
    }
    result
}

fn load_config() -> anyhow::Result<Config> {
    match std::env::args().nth(1) {
        Some(path) => {
            Config::load_from(&path).with_context(|| format!("failed to load config from {}", path))
        }
        None => Config::load().context("failed to load default config"),
    }
}

async fn track(config: Config) -> anyhow::Result<()> {
    let source_path = config
        .source_path
        .as_ref()
        .context("no source_path configured")?;
    let source = open_frame_source(source_path)
        .with_context(|| format!("failed to open {}", source_path.display()))?;

    let manager = ModelManager::new(&config.model_dir)?;
    let detector = create_detector(&config, &manager)
        .await
        .context("failed to create pose detector")?;

    let mut session = TrackingSession::new(&config, source, detector)?;
    if let Some(dir) = &config.output_dir {
        session = session.with_sink(Box::new(PngSequenceSink::new(dir)?));
        info!("Writing rendered frames to {}", dir.display());
    }

    let handle = session.spawn();

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Received shutdown signal");

    let stats = handle.shutdown().await.context("tracking task failed")?;
    info!(
        "Tracked {} ticks: {} with a pose, {} detection failures, {} without a frame, \
         {:.1}ms average",
        stats.ticks,
        stats.frames_with_pose,
        stats.detection_failures,
        stats.frames_missing,
        stats.average_processing_time_ms
    );

    Ok(())
}
