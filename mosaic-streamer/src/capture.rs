//! Synthetic capture source.
//!
//! Real desktop/window capture is platform glue outside this binary's
//! scope; the moving test pattern exercises the full streaming path and
//! makes stale frames visible on the consumer side.

use mosaic_core::{FrameSource, MosaicError, PixelFormat, RawFrame};

/// Generates BGRA frames with a gradient background and a sweeping
/// vertical bar, advancing one step per captured frame.
pub struct TestPatternSource {
    width: u32,
    height: u32,
    tick: u32,
}

impl TestPatternSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            tick: 0,
        }
    }
}

impl FrameSource for TestPatternSource {
    fn next_frame(&mut self) -> Result<RawFrame, MosaicError> {
        let stride = self.width * 4;
        let mut data = vec![0u8; (stride * self.height) as usize];
        let bar_x = self.tick % self.width;

        for y in 0..self.height {
            for x in 0..self.width {
                let off = (y * stride + x * 4) as usize;
                let in_bar = x.abs_diff(bar_x) < 8;
                data[off] = (x * 255 / self.width) as u8; // B
                data[off + 1] = (y * 255 / self.height) as u8; // G
                data[off + 2] = if in_bar { 0xFF } else { 0x20 }; // R
                data[off + 3] = 0xFF; // A
            }
        }

        self.tick = self.tick.wrapping_add(4);
        Ok(RawFrame {
            width: self.width,
            height: self.height,
            stride,
            format: PixelFormat::Bgra8,
            data,
        })
    }
}
