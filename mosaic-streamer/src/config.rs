//! Configuration for the streamer binary.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use mosaic_core::{SessionConfig, StreamMode};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamerConfig {
    /// Consumer endpoint.
    pub network: NetworkConfig,
    /// Streaming settings.
    pub stream: StreamConfig,
    /// Synthetic capture settings.
    pub capture: CaptureConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Consumer host to connect to.
    pub host: String,
    /// Consumer TCP port.
    pub port: u16,
    /// Acknowledgment / handshake deadline in milliseconds.
    pub ack_timeout_ms: u64,
}

/// Streaming settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Source identity carried in every message header.
    pub source_uri: String,
    /// Split frames into a parallel tile grid.
    pub parallel: bool,
    /// Nominal tile edge in pixels (parallel mode).
    pub tile_size: u32,
    /// Target frames per second.
    pub fps: u32,
    /// Compress segment blobs.
    pub compression: bool,
}

/// Synthetic capture settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Captured frame width in pixels.
    pub width: u32,
    /// Captured frame height in pixels.
    pub height: u32,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 1701,
            ack_timeout_ms: 5000,
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            source_uri: "mosaic://desktop".into(),
            parallel: true,
            tile_size: 512,
            fps: 24,
            compression: true,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 768,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl StreamerConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Convert into the session configuration.
    pub fn to_session_config(&self) -> SessionConfig {
        let fps = self.stream.fps.clamp(1, 120);
        SessionConfig {
            source_uri: self.stream.source_uri.clone(),
            mode: if self.stream.parallel {
                StreamMode::Parallel {
                    nominal_tile_size: self.stream.tile_size.max(64),
                }
            } else {
                StreamMode::Single
            },
            compression: self.stream.compression,
            min_frame_interval: Duration::from_secs_f64(1.0 / fps as f64),
            ack_timeout: Duration::from_millis(self.network.ack_timeout_ms.max(1)),
            max_workers: 0,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let cfg = StreamerConfig::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        assert!(text.contains("source_uri"));
        assert!(text.contains("tile_size"));
    }

    #[test]
    fn roundtrip_config() {
        let cfg = StreamerConfig::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        let parsed: StreamerConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.network.port, 1701);
        assert_eq!(parsed.stream.fps, 24);
    }

    #[test]
    fn to_session_config_clamps() {
        let mut cfg = StreamerConfig::default();
        cfg.stream.fps = 0;
        cfg.stream.tile_size = 1;
        let session = cfg.to_session_config();
        assert_eq!(session.min_frame_interval, Duration::from_secs(1));
        assert_eq!(
            session.mode,
            StreamMode::Parallel {
                nominal_tile_size: 64
            }
        );
    }
}
