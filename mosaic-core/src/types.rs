//! Shared pixel types for the capture/stream pipeline.
//!
//! These are **internal** frame representations exchanged between the
//! capture collaborator and the streaming session. They are distinct from
//! [`crate::protocol::segment::Segment`], which is the wire type.

use crate::error::MosaicError;

// ── PixelFormat ──────────────────────────────────────────────────

/// Pixel layout for raw captured frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 4 bytes per pixel: Blue, Green, Red, Alpha.
    Bgra8,
    /// 4 bytes per pixel: Red, Green, Blue, Alpha.
    Rgba8,
    /// 3 bytes per pixel: Red, Green, Blue.
    Rgb8,
}

impl PixelFormat {
    /// Bytes consumed by a single pixel in this format.
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Bgra8 | PixelFormat::Rgba8 => 4,
            PixelFormat::Rgb8 => 3,
        }
    }
}

// ── RawFrame ─────────────────────────────────────────────────────

/// A raw, uncompressed image obtained from the capture collaborator.
///
/// The `data` buffer holds `height` rows of `stride` bytes each.
/// `stride` may be larger than `width * bytes_per_pixel` due to
/// row-alignment requirements of the capture source.
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Row pitch in **bytes** (may exceed `width * bpp`).
    pub stride: u32,
    /// Pixel layout.
    pub format: PixelFormat,
    /// Raw pixel data — `stride * height` bytes.
    pub data: Vec<u8>,
}

impl RawFrame {
    /// Total byte size the raw bitmap occupies.
    pub fn byte_len(&self) -> usize {
        self.stride as usize * self.height as usize
    }

    /// Returns a row slice (including possible padding bytes).
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride as usize;
        let end = start + self.stride as usize;
        &self.data[start..end]
    }
}

// ── FrameSource ──────────────────────────────────────────────────

/// The capture boundary: anything that can hand out the current
/// framebuffer once per producer tick.
///
/// Real desktop/window capture lives outside this crate; tests and the
/// streamer binary provide synthetic implementations.
pub trait FrameSource {
    /// Produce the next frame to stream.
    fn next_frame(&mut self) -> Result<RawFrame, MosaicError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_per_pixel() {
        assert_eq!(PixelFormat::Bgra8.bytes_per_pixel(), 4);
        assert_eq!(PixelFormat::Rgba8.bytes_per_pixel(), 4);
        assert_eq!(PixelFormat::Rgb8.bytes_per_pixel(), 3);
    }

    #[test]
    fn row_accounts_for_stride() {
        let frame = RawFrame {
            width: 2,
            height: 2,
            stride: 16, // padded beyond 2 * 4
            format: PixelFormat::Rgba8,
            data: (0..32).collect(),
        };
        assert_eq!(frame.byte_len(), 32);
        assert_eq!(frame.row(1)[0], 16);
    }
}
