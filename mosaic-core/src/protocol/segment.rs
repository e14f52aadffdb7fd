//! Segment placement parameters and the owned wire segment.

use crate::error::MosaicError;

// ── SegmentParameters ────────────────────────────────────────────

/// Placement record for one rectangular segment of a streamed image.
///
/// `width == 0 && height == 0` is the reserved clear/reset sentinel,
/// emitted when a producer shrinks its tile count so a consumer does not
/// retain stale geometry for indices no longer in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentParameters {
    /// Which tile stream of the source emitted this (0 in single mode).
    /// Stable across frames from the same tile.
    pub source_index: i32,
    /// Placement within the full image, in pixels.
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    /// Full image dimensions, for coordinate normalization on the
    /// reassembly side.
    pub total_width: i32,
    pub total_height: i32,
    /// Whether the blob that follows is compressed.
    pub compressed: bool,
}

impl SegmentParameters {
    /// Encoded size on the wire.
    pub const SIZE: usize = 29;

    /// The clear/reset sentinel for `source_index`, carrying the current
    /// total dimensions so the reassembly store keeps valid geometry.
    pub fn reset(source_index: i32, total_width: i32, total_height: i32) -> Self {
        Self {
            source_index,
            x: 0,
            y: 0,
            width: 0,
            height: 0,
            total_width,
            total_height,
            compressed: false,
        }
    }

    /// Whether this is the clear/reset sentinel rather than pixel content.
    pub fn is_reset(&self) -> bool {
        self.width == 0 && self.height == 0
    }

    /// Serialize to bytes (host byte order).
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&self.source_index.to_ne_bytes());
        buf[4..8].copy_from_slice(&self.x.to_ne_bytes());
        buf[8..12].copy_from_slice(&self.y.to_ne_bytes());
        buf[12..16].copy_from_slice(&self.width.to_ne_bytes());
        buf[16..20].copy_from_slice(&self.height.to_ne_bytes());
        buf[20..24].copy_from_slice(&self.total_width.to_ne_bytes());
        buf[24..28].copy_from_slice(&self.total_height.to_ne_bytes());
        buf[28] = self.compressed as u8;
        buf
    }

    /// Deserialize from bytes.
    pub fn decode(data: &[u8]) -> Result<Self, MosaicError> {
        if data.len() < Self::SIZE {
            return Err(MosaicError::InvalidLength {
                expected: Self::SIZE,
                actual: data.len(),
            });
        }
        Ok(Self {
            source_index: i32::from_ne_bytes(data[0..4].try_into().unwrap()),
            x: i32::from_ne_bytes(data[4..8].try_into().unwrap()),
            y: i32::from_ne_bytes(data[8..12].try_into().unwrap()),
            width: i32::from_ne_bytes(data[12..16].try_into().unwrap()),
            height: i32::from_ne_bytes(data[16..20].try_into().unwrap()),
            total_width: i32::from_ne_bytes(data[20..24].try_into().unwrap()),
            total_height: i32::from_ne_bytes(data[24..28].try_into().unwrap()),
            compressed: data[28] != 0,
        })
    }
}

// ── Segment ──────────────────────────────────────────────────────

/// One received or about-to-be-sent segment: placement plus the opaque
/// image blob.
///
/// Ownership transfers through the pipeline (send path → wire → store →
/// consumer); a segment is never shared between stages.
#[derive(Debug, Clone)]
pub struct Segment {
    pub parameters: SegmentParameters,
    pub data: Vec<u8>,
}

impl Segment {
    /// Decode a segment from a full message payload
    /// (`SegmentParameters` record followed by the blob).
    pub fn from_payload(payload: &[u8]) -> Result<Self, MosaicError> {
        let parameters = SegmentParameters::decode(payload)?;
        Ok(Self {
            parameters,
            data: payload[SegmentParameters::SIZE..].to_vec(),
        })
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SegmentParameters {
        SegmentParameters {
            source_index: 3,
            x: 512,
            y: 384,
            width: 512,
            height: 384,
            total_width: 1024,
            total_height: 768,
            compressed: true,
        }
    }

    #[test]
    fn parameters_roundtrip() {
        let params = sample();
        let decoded = SegmentParameters::decode(&params.encode()).unwrap();
        assert_eq!(decoded, params);
    }

    #[test]
    fn decode_too_short() {
        assert!(matches!(
            SegmentParameters::decode(&[0u8; 12]),
            Err(MosaicError::InvalidLength { .. })
        ));
    }

    #[test]
    fn reset_sentinel() {
        let params = SegmentParameters::reset(2, 1024, 768);
        assert!(params.is_reset());
        assert_eq!(params.source_index, 2);
        assert_eq!(params.total_width, 1024);
        assert!(!sample().is_reset());
    }

    #[test]
    fn segment_from_payload() {
        let params = sample();
        let mut payload = params.encode().to_vec();
        payload.extend_from_slice(&[0xAB; 16]);

        let segment = Segment::from_payload(&payload).unwrap();
        assert_eq!(segment.parameters, params);
        assert_eq!(segment.data.len(), 16);
        assert!(segment.data.iter().all(|&b| b == 0xAB));
    }

    #[test]
    fn segment_from_bare_parameters() {
        let params = SegmentParameters::reset(1, 640, 480);
        let segment = Segment::from_payload(&params.encode()).unwrap();
        assert!(segment.parameters.is_reset());
        assert!(segment.data.is_empty());
    }
}
