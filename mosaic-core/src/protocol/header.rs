//! The fixed-size message header framing every wire message.

use crate::error::MosaicError;
use crate::protocol::message::MessageType;

/// Fixed capacity of the source URI field, including the terminating NUL.
pub const SOURCE_URI_LEN: usize = 64;

// ── MessageHeader ────────────────────────────────────────────────

/// Per-message framing record: payload length, type tag, and the
/// free-text URI identifying the producing source.
///
/// Constructed fresh for every message, never reused across sends. The
/// `message_type` field is kept as the raw wire tag so a receiver can
/// acknowledge (and skip) messages whose type it does not understand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    payload_size: u32,
    message_type: i32,
    source_uri: [u8; SOURCE_URI_LEN],
}

impl MessageHeader {
    /// Encoded size on the wire.
    pub const SIZE: usize = 8 + SOURCE_URI_LEN;

    /// Build a header for a message of `message_type` carrying
    /// `payload_size` bytes. URIs longer than the field are silently
    /// truncated; the field is always NUL-terminated.
    pub fn new(message_type: MessageType, payload_size: u32, uri: &str) -> Self {
        let mut source_uri = [0u8; SOURCE_URI_LEN];
        let bytes = uri.as_bytes();
        let len = bytes.len().min(SOURCE_URI_LEN - 1);
        source_uri[..len].copy_from_slice(&bytes[..len]);
        Self {
            payload_size,
            message_type: message_type as i32,
            source_uri,
        }
    }

    /// Exact number of bytes that follow this header on the wire.
    pub fn payload_size(&self) -> u32 {
        self.payload_size
    }

    /// The raw wire tag, preserved even when unknown.
    pub fn message_type_raw(&self) -> i32 {
        self.message_type
    }

    /// Decode the wire tag into a known [`MessageType`].
    pub fn message_type(&self) -> Result<MessageType, MosaicError> {
        MessageType::try_from(self.message_type)
    }

    /// The source URI up to its first NUL (lossy for invalid UTF-8).
    pub fn uri(&self) -> String {
        let end = self
            .source_uri
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(SOURCE_URI_LEN);
        String::from_utf8_lossy(&self.source_uri[..end]).into_owned()
    }

    /// Serialize to bytes (host byte order).
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&self.payload_size.to_ne_bytes());
        buf[4..8].copy_from_slice(&self.message_type.to_ne_bytes());
        buf[8..].copy_from_slice(&self.source_uri);
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
        let mut source_uri = [0u8; SOURCE_URI_LEN];
        source_uri.copy_from_slice(&data[8..Self::SIZE]);
        // Enforce the NUL-termination invariant on received headers.
        source_uri[SOURCE_URI_LEN - 1] = 0;
        Ok(Self {
            payload_size: u32::from_ne_bytes(data[0..4].try_into().unwrap()),
            message_type: i32::from_ne_bytes(data[4..8].try_into().unwrap()),
            source_uri,
        })
    }
}

// ── Tests ────────────────────────────────────────────────────────
