//! Producer-side streaming session.
//!
//! Owns the TCP connection to the consumer and drives the full send
//! pipeline: tiling, parallel segment compression, framing, and the
//! per-message acknowledgment wait. The protocol is strictly synchronous
//! (one outstanding message at a time), so a slow consumer naturally
//! throttles the producer.
//!
//! State machine: `Disconnected → Handshaking → Streaming → Disconnected`.

use std::ops::Range;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::codec::SegmentCodec;
use crate::error::MosaicError;
use crate::protocol::header::MessageHeader;
use crate::protocol::message::{ACK, MessageType, PROTOCOL_VERSION};
use crate::protocol::segment::SegmentParameters;
use crate::tiling::{self, SegmentRect, StreamMode};
use crate::types::RawFrame;

/// Frames per throughput-window report.
pub const THROUGHPUT_WINDOW: usize = 30;

// ── SessionConfig ────────────────────────────────────────────────

/// Configuration for a [`ProducerSession`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Free-text identity carried in every message header; also the
    /// consumer's reassembly-store key.
    pub source_uri: String,
    /// Single segment per frame, or a parallel tile grid.
    pub mode: StreamMode,
    /// Compress segment blobs (uncompressed raw rows otherwise).
    pub compression: bool,
    /// Minimum wall-clock time per frame; the session sleeps out the
    /// remainder after the last acknowledgment.
    pub min_frame_interval: Duration,
    /// Deadline for the handshake read and each acknowledgment read.
    pub ack_timeout: Duration,
    /// Compression pool size; 0 means the machine's logical CPU count.
    pub max_workers: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            source_uri: "mosaic://desktop".into(),
            mode: StreamMode::Single,
            compression: true,
            min_frame_interval: Duration::from_millis(33),
            ack_timeout: Duration::from_secs(5),
            max_workers: 0,
        }
    }
}

// ── SessionState ─────────────────────────────────────────────────

/// Connection lifecycle of a producer session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Handshaking,
    Streaming,
}

// ── ThroughputWindow ─────────────────────────────────────────────

/// Rolling window over the last N frame timestamps.
///
/// The window resets once it fills, so the reported rate is a "latest
/// N-frame average" rather than a continuously smoothed figure.
#[derive(Debug)]
pub struct ThroughputWindow {
    capacity: usize,
    timestamps: Vec<Instant>,
    last_rate: f64,
}

impl ThroughputWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            capacity,
            timestamps: Vec::with_capacity(capacity),
            last_rate: 0.0,
        }
    }

    /// Record one frame completion at `when`.
    pub fn record(&mut self, when: Instant) {
        self.timestamps.push(when);
        if self.timestamps.len() >= self.capacity {
            let span = self.timestamps[self.timestamps.len() - 1]
                .duration_since(self.timestamps[0]);
            if !span.is_zero() {
                self.last_rate = (self.timestamps.len() - 1) as f64 / span.as_secs_f64();
            }
            self.timestamps.clear();
        }
    }

    /// Frames per second over the most recently completed window.
    pub fn rate(&self) -> f64 {
        self.last_rate
    }

    /// Timestamps collected toward the next window.
    pub fn pending(&self) -> usize {
        self.timestamps.len()
    }
}

// ── ProducerSession ──────────────────────────────────────────────

/// Client role of the pixel-stream protocol.
pub struct ProducerSession {
    config: SessionConfig,
    state: SessionState,
    stream: Option<TcpStream>,
    codec: Arc<SegmentCodec>,
    workers: Arc<Semaphore>,
    layout: Vec<SegmentRect>,
    layout_dims: Option<(u32, u32)>,
    layout_dirty: bool,
    window: ThroughputWindow,
}

impl ProducerSession {
    /// A disconnected session. Call [`connect`](Self::connect) before
    /// streaming.
    pub fn new(config: SessionConfig) -> Self {
        let pool = if config.max_workers == 0 {
            num_cpus::get()
        } else {
            config.max_workers
        };
        Self {
            config,
            state: SessionState::Disconnected,
            stream: None,
            codec: Arc::new(SegmentCodec::new()),
            workers: Arc::new(Semaphore::new(pool.max(1))),
            layout: Vec::new(),
            layout_dims: None,
            layout_dirty: false,
            window: ThroughputWindow::new(THROUGHPUT_WINDOW),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Streaming
    }

    /// Latest-window average send rate in frames per second.
    pub fn achieved_fps(&self) -> f64 {
        self.window.rate()
    }

    /// Switch streaming mode. Takes effect on the next frame; if the tile
    /// count shrinks, clear sentinels go out for the dropped indices
    /// before the first frame in the new mode.
    pub fn set_mode(&mut self, mode: StreamMode) {
        if self.config.mode != mode {
            self.config.mode = mode;
            self.layout_dirty = true;
        }
    }

    /// Open the TCP connection and perform the version handshake.
    ///
    /// The consumer announces its protocol version immediately; a
    /// mismatch is a hard failure — the connection is closed, no framed
    /// message is ever sent, and there is no retry.
    pub async fn connect(&mut self, addr: impl ToSocketAddrs) -> Result<(), MosaicError> {
        let mut stream = TcpStream::connect(addr).await?;
        self.state = SessionState::Handshaking;

        let mut version = [0u8; 4];
        match timeout(self.config.ack_timeout, stream.read_exact(&mut version)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                self.state = SessionState::Disconnected;
                return Err(e.into());
            }
            Err(_) => {
                self.state = SessionState::Disconnected;
                return Err(MosaicError::Timeout(self.config.ack_timeout));
            }
        }

        let peer_version = u32::from_ne_bytes(version);
        if peer_version != PROTOCOL_VERSION {
            self.state = SessionState::Disconnected;
            return Err(MosaicError::UnsupportedVersion(peer_version));
        }

        info!(uri = %self.config.source_uri, "handshake complete (v{peer_version})");
        self.stream = Some(stream);
        self.state = SessionState::Streaming;
        Ok(())
    }

    /// Stream one captured frame: replan tiles if needed, compress all
    /// segments in parallel, then send each segment and wait for its
    /// acknowledgment before the next. Sleeps out the remainder of the
    /// configured frame interval before returning.
    pub async fn send_frame(&mut self, frame: RawFrame) -> Result<(), MosaicError> {
        if self.state != SessionState::Streaming {
            return Err(MosaicError::NotConnected);
        }
        let frame_start = Instant::now();

        self.update_layout(frame.width, frame.height).await?;

        let message_type = match self.config.mode {
            StreamMode::Single => MessageType::PixelStream,
            StreamMode::Parallel { .. } => MessageType::ParallelPixelStream,
        };
        let (total_width, total_height) = (frame.width as i32, frame.height as i32);

        let blobs = self.compress_segments(frame).await;
        for (index, rect, blob) in blobs {
            let params = SegmentParameters {
                source_index: index as i32,
                x: rect.x as i32,
                y: rect.y as i32,
                width: rect.width as i32,
                height: rect.height as i32,
                total_width,
                total_height,
                compressed: self.config.compression,
            };
            self.send_message(message_type, &params, &blob).await?;
        }

        self.window.record(Instant::now());
        self.pace(frame_start).await;
        Ok(())
    }

    /// Stream a vector-graphics document under the same source URI.
    pub async fn send_svg(&mut self, data: &[u8], width: u32, height: u32) -> Result<(), MosaicError> {
        if self.state != SessionState::Streaming {
            return Err(MosaicError::NotConnected);
        }
        let params = SegmentParameters {
            source_index: 0,
            x: 0,
            y: 0,
            width: width as i32,
            height: height as i32,
            total_width: width as i32,
            total_height: height as i32,
            compressed: false,
        };
        self.send_message(MessageType::SvgStream, &params, data).await
    }

    /// Send the terminal QUIT so the consumer evicts this source
    /// deterministically, then tear the session down.
    pub async fn send_quit(&mut self) -> Result<(), MosaicError> {
        if self.state != SessionState::Streaming {
            return Err(MosaicError::NotConnected);
        }
        let header = MessageHeader::new(MessageType::Quit, 0, &self.config.source_uri);
        let result = self.write_and_ack(&header.encode(), None, &[]).await;
        self.disconnect();
        result
    }

    // ── Internal ─────────────────────────────────────────────────

    fn disconnect(&mut self) {
        self.stream = None;
        self.state = SessionState::Disconnected;
        self.layout.clear();
        self.layout_dims = None;
    }

    /// Replan segment rectangles when dimensions or mode changed. The new
    /// layout replaces the old one before any segment of the next frame
    /// is sent, so no frame ever mixes layouts.
    async fn update_layout(&mut self, width: u32, height: u32) -> Result<(), MosaicError> {
        if self.layout_dims == Some((width, height)) && !self.layout_dirty {
            return Ok(());
        }

        let new_layout = tiling::plan(width, height, self.config.mode);
        debug!(
            uri = %self.config.source_uri,
            segments = new_layout.len(),
            "planned {width}x{height} layout"
        );

        if self.layout.len() > new_layout.len() {
            self.reset_segments(new_layout.len()..self.layout.len(), width, height)
                .await?;
        }
        if let Some(dims) = self.layout_dims {
            if dims != (width, height) {
                self.send_dimensions_changed(width, height).await?;
            }
        }

        self.layout = new_layout;
        self.layout_dims = Some((width, height));
        self.layout_dirty = false;
        Ok(())
    }

    /// Clear consumer-side slots for indices no longer in use: one
    /// zero-geometry sentinel per dropped index.
    async fn reset_segments(&mut self, indices: Range<usize>, width: u32, height: u32) -> Result<(), MosaicError> {
        for index in indices {
            let params = SegmentParameters::reset(index as i32, width as i32, height as i32);
            self.send_message(MessageType::ParallelPixelStream, &params, &[])
                .await?;
        }
        Ok(())
    }

    async fn send_dimensions_changed(&mut self, width: u32, height: u32) -> Result<(), MosaicError> {
        let params = SegmentParameters::reset(0, width as i32, height as i32);
        self.send_message(MessageType::DimensionsChanged, &params, &[])
            .await
    }

    /// Compress every planned segment of `frame` on the bounded blocking
    /// pool, joining all results before any is sent. A codec failure on
    /// one segment skips only that segment.
    async fn compress_segments(&self, frame: RawFrame) -> Vec<(usize, SegmentRect, Vec<u8>)> {
        let frame = Arc::new(frame);
        let mut join = JoinSet::new();

        for (index, rect) in self.layout.iter().copied().enumerate() {
            let frame = Arc::clone(&frame);
            let codec = Arc::clone(&self.codec);
            let workers = Arc::clone(&self.workers);
            let compression = self.config.compression;

            join.spawn(async move {
                // The pool is never closed; a permit always arrives.
                let _permit = workers.acquire_owned().await.ok();
                let result = match tokio::task::spawn_blocking(move || {
                    if compression {
                        codec.compress(&frame, &rect)
                    } else {
                        codec.extract(&frame, &rect)
                    }
                })
                .await
                {
                    Ok(r) => r,
                    Err(e) => Err(MosaicError::Encoding(format!("codec worker: {e}"))),
                };
                (index, rect, result)
            });
        }

        let mut blobs = Vec::with_capacity(self.layout.len());
        while let Some(joined) = join.join_next().await {
            match joined {
                Ok((index, rect, Ok(blob))) => blobs.push((index, rect, blob)),
                Ok((index, _, Err(e))) => {
                    warn!(segment = index, "segment compression failed, skipping: {e}");
                }
                Err(e) => warn!("compression task panicked: {e}"),
            }
        }
        // Segments may finish in any order; send in index order.
        blobs.sort_by_key(|(index, ..)| *index);
        blobs
    }

    /// Frame one message and block for its acknowledgment. Any transport
    /// failure tears the session down to Disconnected.
    async fn send_message(
        &mut self,
        message_type: MessageType,
        params: &SegmentParameters,
        blob: &[u8],
    ) -> Result<(), MosaicError> {
        let payload_size = (SegmentParameters::SIZE + blob.len()) as u32;
        let header = MessageHeader::new(message_type, payload_size, &self.config.source_uri);
        let result = self
            .write_and_ack(&header.encode(), Some(&params.encode()), blob)
            .await;
        if result.is_err() {
            self.disconnect();
        }
        result
    }

    async fn write_and_ack(
        &mut self,
        header: &[u8],
        params: Option<&[u8]>,
        blob: &[u8],
    ) -> Result<(), MosaicError> {
        let ack_timeout = self.config.ack_timeout;
        let stream = self.stream.as_mut().ok_or(MosaicError::NotConnected)?;

        // write_all loops internally until every byte is on the wire.
        stream.write_all(header).await?;
        if let Some(params) = params {
            stream.write_all(params).await?;
        }
        if !blob.is_empty() {
            stream.write_all(blob).await?;
        }

        // Strictly one outstanding message: block for the bare 3-byte ack.
        let mut ack = [0u8; 3];
        match timeout(ack_timeout, stream.read_exact(&mut ack)).await {
            Ok(Ok(_)) => {
                if ack != ACK {
                    return Err(MosaicError::ProtocolViolation(
                        "unexpected acknowledgment bytes",
                    ));
                }
                Ok(())
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(MosaicError::Timeout(ack_timeout)),
        }
    }

    /// Sleep for the remainder of the configured frame interval.
    async fn pace(&self, frame_start: Instant) {
        let elapsed = frame_start.elapsed();
        if elapsed < self.config.min_frame_interval {
            tokio::time::sleep(self.config.min_frame_interval - elapsed).await;
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PixelFormat;
    use tokio::net::TcpListener;
    use tokio_test::assert_ok;

    fn quick_config() -> SessionConfig {
        SessionConfig {
            min_frame_interval: Duration::ZERO,
            ack_timeout: Duration::from_millis(200),
            ..SessionConfig::default()
        }
    }

    fn small_frame() -> RawFrame {
        RawFrame {
            width: 8,
            height: 8,
            stride: 32,
            format: PixelFormat::Bgra8,
            data: vec![0x5A; 32 * 8],
        }
    }

    #[test]
    fn throughput_window_reports_latest_average() {
        let mut window = ThroughputWindow::new(4);
        assert_eq!(window.rate(), 0.0);

        let t0 = Instant::now();
        for i in 0..4 {
            window.record(t0 + Duration::from_millis(100 * i));
        }
        // 3 intervals over 300 ms ≈ 10 fps, and the window reset.
        assert!((window.rate() - 10.0).abs() < 1.0, "rate = {}", window.rate());
        assert_eq!(window.pending(), 0);

        // A slower second window replaces, not blends with, the first.
        for i in 0..4 {
            window.record(t0 + Duration::from_secs(10) + Duration::from_millis(300 * i));
        }
        assert!((window.rate() - 3.33).abs() < 0.5, "rate = {}", window.rate());
    }

    #[test]
    fn new_session_is_disconnected() {
        let session = ProducerSession::new(SessionConfig::default());
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(!session.is_connected());
    }

    #[tokio::test]
    async fn send_frame_requires_connection() {
        let mut session = ProducerSession::new(quick_config());
        let result = session.send_frame(small_frame()).await;
        assert!(matches!(result, Err(MosaicError::NotConnected)));
    }

    #[tokio::test]
    async fn version_mismatch_refused_and_nothing_sent() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.write_all(&2u32.to_ne_bytes()).await.unwrap();
            // The client must close without ever framing a message.
            let mut buf = [0u8; 1];
            let n = stream.read(&mut buf).await.unwrap();
            n
        });

        let mut session = ProducerSession::new(quick_config());
        let result = session.connect(addr).await;
        assert!(matches!(result, Err(MosaicError::UnsupportedVersion(2))));
        assert_eq!(session.state(), SessionState::Disconnected);
        drop(session);

        let bytes_from_client = tokio::time::timeout(Duration::from_secs(2), server)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(bytes_from_client, 0);
    }

    #[tokio::test]
    async fn ack_timeout_disconnects() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.write_all(&PROTOCOL_VERSION.to_ne_bytes()).await.unwrap();
            // Read the client's message but never acknowledge it.
            let mut sink = vec![0u8; 4096];
            let _ = stream.read(&mut sink).await;
            tokio::time::sleep(Duration::from_secs(1)).await;
        });

        let mut session = ProducerSession::new(quick_config());
        tokio_test::assert_ok!(session.connect(addr).await);

        let result = session.send_frame(small_frame()).await;
        assert!(matches!(result, Err(MosaicError::Timeout(_))));
        assert_eq!(session.state(), SessionState::Disconnected);

        server.abort();
    }
}
