//! Per-segment image codec.
//!
//! Turns a sub-rectangle of a raw framebuffer into a compressed byte blob
//! and back. Each segment is independent of every other segment, so
//! compression of one frame's segments is embarrassingly parallel.

use crate::error::MosaicError;
use crate::tiling::SegmentRect;
use crate::types::RawFrame;

/// Default zstd compression level (1 = fast / less compression). The
/// stream is latency-sensitive, so favour speed.
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 1;

// ── SegmentCodec ─────────────────────────────────────────────────

/// Fixed-quality zstd codec operating on one segment at a time.
#[derive(Debug, Clone)]
pub struct SegmentCodec {
    level: i32,
}

impl SegmentCodec {
    /// Codec at [`DEFAULT_COMPRESSION_LEVEL`].
    pub fn new() -> Self {
        Self::with_level(DEFAULT_COMPRESSION_LEVEL)
    }

    /// Codec at an explicit zstd level.
    pub fn with_level(level: i32) -> Self {
        Self { level }
    }

    /// Extract `rect` from `frame` as tightly packed rows (no stride
    /// padding). This is the uncompressed segment representation.
    pub fn extract(&self, frame: &RawFrame, rect: &SegmentRect) -> Result<Vec<u8>, MosaicError> {
        if rect.x + rect.width > frame.width || rect.y + rect.height > frame.height {
            return Err(MosaicError::Encoding(format!(
                "segment rect {rect:?} exceeds frame {}x{}",
                frame.width, frame.height
            )));
        }

        let bpp = frame.format.bytes_per_pixel();
        if (frame.stride as usize) < frame.width as usize * bpp
            || frame.data.len() < frame.byte_len()
        {
            return Err(MosaicError::Encoding(format!(
                "inconsistent frame buffer: {} bytes for {}x{} stride {}",
                frame.data.len(),
                frame.width,
                frame.height,
                frame.stride
            )));
        }
        let row_bytes = rect.width as usize * bpp;
        let start_x = rect.x as usize * bpp;
        let mut out = Vec::with_capacity(row_bytes * rect.height as usize);

        for row in 0..rect.height {
            let y = (rect.y + row) as usize;
            let offset = y * frame.stride as usize + start_x;
            out.extend_from_slice(&frame.data[offset..offset + row_bytes]);
        }

        Ok(out)
    }

    /// Compress `rect` of `frame` into an opaque blob.
    pub fn compress(&self, frame: &RawFrame, rect: &SegmentRect) -> Result<Vec<u8>, MosaicError> {
        let raw = self.extract(frame, rect)?;
        zstd::encode_all(raw.as_slice(), self.level)
            .map_err(|e| MosaicError::Encoding(format!("zstd encode failed: {e}")))
    }

    /// Decompress a segment blob back into tightly packed pixel rows.
    /// Owned by the rendering collaborator, but the boundary lives here.
    pub fn decompress(&self, blob: &[u8]) -> Result<Vec<u8>, MosaicError> {
        zstd::decode_all(blob).map_err(|e| MosaicError::Encoding(format!("zstd decode failed: {e}")))
    }
}

impl Default for SegmentCodec {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ────────────────────────────────────────────────────────
