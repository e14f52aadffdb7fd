//! # mosaic-core
//!
//! Core protocol library for the mosaic tiled-display pixel stream.
//!
//! A producer captures an image (desktop, window, render target), cuts it
//! into independently compressed rectangular segments, and streams them
//! over TCP to a consumer that reassembles the most recent frame per
//! source for a tiled display.
//!
//! ```text
//! PRODUCER                                    CONSUMER
//! ┌─────────────────────────┐                ┌──────────────────────────┐
//! │ FrameSource (capture)   │                │ ConsumerListener         │
//! │   ↓                     │                │   ↓ (one per connection) │
//! │ tiling::plan            │     TCP        │ ConnectionWorker         │
//! │   ↓                     │ ──────────►    │   ↓                      │
//! │ SegmentCodec (parallel) │  ◄── ack ──    │ SegmentStore             │
//! │   ↓                     │                │   ↓                      │
//! │ ProducerSession::send   │                │ render loop (external)   │
//! └─────────────────────────┘                └──────────────────────────┘
//! ```
//!
//! This crate contains:
//! - **Protocol types**: `MessageHeader`, `SegmentParameters`, `Segment`,
//!   `MessageType`, the version handshake and ack constants
//! - **Tiling**: the planner that cuts a frame into segment rectangles
//! - **Codec**: per-segment zstd compression of framebuffer rectangles
//! - **Session**: the producer state machine with its synchronous
//!   send/ack loop, frame pacing, and throughput window
//! - **Net**: the consumer listener, per-connection workers, and the
//!   incremental message framing codec
//! - **Store**: the concurrent latest-wins segment reassembly store
//! - **Error**: `MosaicError` — typed, `thiserror`-based error hierarchy

pub mod codec;
pub mod error;
pub mod net;
pub mod protocol;
pub mod session;
pub mod store;
pub mod tiling;
pub mod types;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use codec::{DEFAULT_COMPRESSION_LEVEL, SegmentCodec};
pub use error::MosaicError;
pub use net::{ConnectionWorker, ConsumerListener, IncomingMessage, MAX_PAYLOAD_SIZE, MessageCodec};
pub use protocol::{
    ACK, MessageHeader, MessageType, PROTOCOL_VERSION, SOURCE_URI_LEN, Segment, SegmentParameters,
};
pub use session::{
    ProducerSession, SessionConfig, SessionState, THROUGHPUT_WINDOW, ThroughputWindow,
};
pub use store::{SegmentStore, StreamStores};
pub use tiling::{SegmentRect, StreamMode};
pub use types::{FrameSource, PixelFormat, RawFrame};
