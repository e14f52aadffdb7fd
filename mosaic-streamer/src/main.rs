//! mosaic streamer — entry point.
//!
//! ```text
//! mosaic-streamer                  Stream with settings from the config
//! mosaic-streamer --config <path>  Load a custom config TOML
//! mosaic-streamer --gen-config     Write default config to stdout
//! ```

mod capture;
mod config;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mosaic_core::{FrameSource, ProducerSession};

use crate::capture::TestPatternSource;
use crate::config::StreamerConfig;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "mosaic-streamer", about = "mosaic pixel-stream producer")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "mosaic-streamer.toml")]
    config: PathBuf,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&StreamerConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    // Load config.
    let config = StreamerConfig::load(&cli.config);

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("mosaic-streamer v{}", env!("CARGO_PKG_VERSION"));
    info!("consumer: {}:{}", config.network.host, config.network.port);
    info!("source: {}", config.stream.source_uri);
    info!(
        "mode: {}",
        if config.stream.parallel {
            "parallel"
        } else {
            "single"
        }
    );

    let mut session = ProducerSession::new(config.to_session_config());
    session
        .connect((config.network.host.as_str(), config.network.port))
        .await?;

    let mut source = TestPatternSource::new(config.capture.width, config.capture.height);

    // Ctrl-C handler.
    let stop = Arc::new(AtomicBool::new(false));
    let stop_clone = Arc::clone(&stop);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received — stopping stream");
        stop_clone.store(true, Ordering::SeqCst);
    });

    let mut frames: u64 = 0;
    while !stop.load(Ordering::SeqCst) {
        let frame = source.next_frame()?;
        session.send_frame(frame).await?;
        frames += 1;
        if frames % 120 == 0 {
            info!(frames, fps = session.achieved_fps(), "streaming");
        }
    }

    // Deterministic teardown: the consumer evicts this source on QUIT.
    if let Err(e) = session.send_quit().await {
        warn!("quit not acknowledged: {e}");
    }
    info!(frames, "stream ended");

    Ok(())
}
