//! Domain-specific error types for the mosaic pixel-stream protocol.
//!
//! All fallible operations return `Result<T, MosaicError>`.
//! No panics on invalid input — every error is typed and recoverable.

use std::time::Duration;
use thiserror::Error;

/// The canonical error type for the mosaic protocol.
#[derive(Debug, Error)]
pub enum MosaicError {
    // ── Protocol Errors ──────────────────────────────────────────
    /// A numeric value did not map to any known enum variant.
    #[error("unknown {type_name} discriminant: {value:#x}")]
    UnknownVariant { type_name: &'static str, value: i64 },

    /// The protocol version offered by the peer is not supported.
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u32),

    /// A message violated protocol rules.
    #[error("protocol violation: {0}")]
    ProtocolViolation(&'static str),

    // ── Framing Errors ───────────────────────────────────────────
    /// The payload exceeds the configured maximum size.
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The received buffer is shorter or longer than expected.
    #[error("invalid message length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    // ── Connection Errors ────────────────────────────────────────
    /// The TCP/IO layer reported an error.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// An operation was attempted on a session that is not streaming.
    #[error("session is not connected")]
    NotConnected,

    /// An operation exceeded its deadline.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    // ── Codec Errors ─────────────────────────────────────────────
    /// Compression or decompression of a segment failed.
    #[error("encoding error: {0}")]
    Encoding(String),
}
