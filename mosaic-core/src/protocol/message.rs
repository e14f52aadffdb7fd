//! Message type tags and protocol constants.
//!
//! Uses proper enums with `TryFrom` — no panics on unknown values.

use crate::error::MosaicError;
use std::fmt;

/// Protocol version announced by the consumer on every new connection.
///
/// A producer compiled against a different version must refuse to stream.
pub const PROTOCOL_VERSION: u32 = 1;

/// The bare 3-byte acknowledgment written after each received message.
pub const ACK: [u8; 3] = *b"ack";

// ── MessageType ──────────────────────────────────────────────────

/// Identifies the payload carried by a framed message.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// A single-segment pixel frame; always stored under index 0.
    PixelStream = 1,
    /// One tile of a multi-segment frame, routed by `source_index`.
    ParallelPixelStream = 2,
    /// Total image dimensions changed; no pixel payload.
    DimensionsChanged = 3,
    /// A vector-graphics segment; same framing, separate store.
    SvgStream = 4,
    /// Producer teardown; the consumer evicts the source.
    Quit = 5,
    /// Reserved tag for the acknowledgment (never header-framed).
    Ack = 6,
}

impl TryFrom<i32> for MessageType {
    type Error = MosaicError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(MessageType::PixelStream),
            2 => Ok(MessageType::ParallelPixelStream),
            3 => Ok(MessageType::DimensionsChanged),
            4 => Ok(MessageType::SvgStream),
            5 => Ok(MessageType::Quit),
            6 => Ok(MessageType::Ack),
            _ => Err(MosaicError::UnknownVariant {
                type_name: "MessageType",
                value: value as i64,
            }),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl MessageType {
    /// Returns `true` if messages of this type carry
    /// [`SegmentParameters`](crate::protocol::SegmentParameters) plus a blob.
    pub fn carries_segment(self) -> bool {
        matches!(
            self,
            MessageType::PixelStream | MessageType::ParallelPixelStream | MessageType::SvgStream
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_type_roundtrip() {
        let types = [
            MessageType::PixelStream,
            MessageType::ParallelPixelStream,
            MessageType::DimensionsChanged,
            MessageType::SvgStream,
            MessageType::Quit,
            MessageType::Ack,
        ];
        for ty in types {
            assert_eq!(MessageType::try_from(ty as i32).unwrap(), ty);
        }
    }

    #[test]
    fn message_type_invalid() {
        assert!(MessageType::try_from(0).is_err());
        assert!(MessageType::try_from(99).is_err());
        assert!(MessageType::try_from(-1).is_err());
    }

    #[test]
    fn segment_bearing_types() {
        assert!(MessageType::PixelStream.carries_segment());
        assert!(MessageType::ParallelPixelStream.carries_segment());
        assert!(MessageType::SvgStream.carries_segment());
        assert!(!MessageType::DimensionsChanged.carries_segment());
        assert!(!MessageType::Quit.carries_segment());
    }
}
