//! Tiling planner: decides how a full image is split into segments.
//!
//! In parallel mode the subdivision count per axis is the nominal tile
//! size rounded into the image dimension (minimum 1). Interior tiles use
//! the truncated quotient; the final row/column extends to the image edge
//! so the rectangles always cover the image exactly, with no gaps and no
//! overlaps.

// ── StreamMode ───────────────────────────────────────────────────

/// How a source's frames are cut into segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMode {
    /// One segment spanning the whole image.
    Single,
    /// A grid of roughly `nominal_tile_size`-pixel tiles, compressed and
    /// sent as independent segments.
    Parallel { nominal_tile_size: u32 },
}

// ── SegmentRect ──────────────────────────────────────────────────

/// One planned segment rectangle, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Plan the segment rectangles for an image of `total_width` ×
/// `total_height` pixels, in row-major order. The position of a rect in
/// the returned list is its stable `source_index`.
///
/// Returns an empty plan for degenerate (zero-area) dimensions.
pub fn plan(total_width: u32, total_height: u32, mode: StreamMode) -> Vec<SegmentRect> {
    if total_width == 0 || total_height == 0 {
        return Vec::new();
    }

    match mode {
        StreamMode::Single => vec![SegmentRect {
            x: 0,
            y: 0,
            width: total_width,
            height: total_height,
        }],
        StreamMode::Parallel { nominal_tile_size } => {
            let nx = subdivisions(total_width, nominal_tile_size);
            let ny = subdivisions(total_height, nominal_tile_size);
            let tile_w = total_width / nx;
            let tile_h = total_height / ny;

            let mut rects = Vec::with_capacity((nx * ny) as usize);
            for row in 0..ny {
                let y = row * tile_h;
                let height = if row == ny - 1 { total_height - y } else { tile_h };
                for col in 0..nx {
                    let x = col * tile_w;
                    let width = if col == nx - 1 { total_width - x } else { tile_w };
                    rects.push(SegmentRect { x, y, width, height });
                }
            }
            rects
        }
    }
}

/// Round-to-nearest subdivision count, never below 1.
fn subdivisions(total: u32, nominal: u32) -> u32 {
    if nominal == 0 {
        return 1;
    }
    let n = (total as f64 / nominal as f64).round() as u32;
    n.max(1)
}

// ── Tests ────────────────────────────────────────────────────────
