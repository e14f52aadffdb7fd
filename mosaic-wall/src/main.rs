//! mosaic wall — entry point.
//!
//! ```text
//! mosaic-wall                  Listen with settings from the config
//! mosaic-wall --config <path>  Load a custom config TOML
//! mosaic-wall --gen-config     Write default config to stdout
//! ```
//!
//! The consumption loop here stands in for the tiled-display renderer:
//! it pops the latest segments per source on its own tick, independent of
//! the connection workers, and reports what a renderer would draw.

mod config;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use mosaic_core::{ConsumerListener, StreamStores};

use crate::config::WallConfig;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "mosaic-wall", about = "mosaic pixel-stream consumer")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "mosaic-wall.toml")]
    config: PathBuf,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&WallConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let config = WallConfig::load(&cli.config);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("mosaic-wall v{}", env!("CARGO_PKG_VERSION"));

    let stores = Arc::new(StreamStores::new());
    let listener = ConsumerListener::bind(
        (config.network.bind.as_str(), config.network.port),
        Arc::clone(&stores),
    )
    .await?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let listener_handle = tokio::spawn(listener.run(shutdown_rx));

    // Consumption loop: runs on its own schedule and never blocks a
    // connection worker.
    let mut ticker = tokio::time::interval(Duration::from_millis(config.display.tick_ms.max(1)));
    let mut drawn: u64 = 0;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received — shutting down");
                break;
            }
            _ = ticker.tick() => {
                for uri in stores.pixels.uris() {
                    let segments = stores.pixels.pop_latest(&uri);
                    if segments.is_empty() {
                        continue;
                    }
                    let (width, height) = stores.pixels.dimensions(&uri).unwrap_or((0, 0));
                    for segment in &segments {
                        if segment.parameters.is_reset() {
                            debug!(%uri, index = segment.parameters.source_index, "tile cleared");
                        } else {
                            drawn += 1;
                        }
                    }
                    debug!(%uri, count = segments.len(), width, height, "frame update");
                    if drawn > 0 && drawn % 500 == 0 {
                        info!(%uri, drawn, width, height, "wall is receiving");
                    }
                }
                for uri in stores.vectors.uris() {
                    let segments = stores.vectors.pop_latest(&uri);
                    if !segments.is_empty() {
                        debug!(%uri, count = segments.len(), "vector update");
                    }
                }
            }
        }
    }

    shutdown_tx.send(true).ok();
    listener_handle.await??;
    info!(drawn, "wall stopped");

    Ok(())
}
