//! Incremental message framing for the receive path.
//!
//! TCP delivers arbitrary-sized chunks; the decoder buffers until a full
//! header is available, then until the header's declared payload is
//! complete, and only then yields a message. A partial buffer is never
//! reinterpreted as a complete message.

use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::Decoder;

use crate::error::MosaicError;
use crate::protocol::header::MessageHeader;

/// Upper bound on a single message payload. Generous for full-screen
/// segments, but rejects absurd lengths from corrupt or hostile framing.
pub const MAX_PAYLOAD_SIZE: usize = 64 * 1024 * 1024;

// ── IncomingMessage ──────────────────────────────────────────────

/// One fully framed message as read off the wire.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub header: MessageHeader,
    pub payload: Bytes,
}

// ── MessageCodec ─────────────────────────────────────────────────

/// `tokio_util` decoder producing [`IncomingMessage`]s.
#[derive(Debug, Default)]
pub struct MessageCodec;

impl Decoder for MessageCodec {
    type Item = IncomingMessage;
    type Error = MosaicError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < MessageHeader::SIZE {
            return Ok(None);
        }

        let header = MessageHeader::decode(&src[..MessageHeader::SIZE])?;
        let payload_len = header.payload_size() as usize;
        if payload_len > MAX_PAYLOAD_SIZE {
            return Err(MosaicError::PayloadTooLarge {
                size: payload_len,
                max: MAX_PAYLOAD_SIZE,
            });
        }

        let total = MessageHeader::SIZE + payload_len;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        src.advance(MessageHeader::SIZE);
        let payload = src.split_to(payload_len).freeze();
        Ok(Some(IncomingMessage { header, payload }))
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::message::MessageType;

    fn wire_message(payload: &[u8]) -> Vec<u8> {
        let header = MessageHeader::new(
            MessageType::ParallelPixelStream,
            payload.len() as u32,
            "mosaic://test",
        );
        let mut bytes = header.encode().to_vec();
        bytes.extend_from_slice(payload);
        bytes
    }

    #[test]
    fn whole_message_in_one_chunk() {
        let wire = wire_message(b"pixels");
        let mut buf = BytesMut::from(&wire[..]);

        let msg = MessageCodec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(msg.header.uri(), "mosaic://test");
        assert_eq!(&msg.payload[..], b"pixels");
        assert!(buf.is_empty());
    }

    #[test]
    fn byte_by_byte_delivery() {
        let wire = wire_message(b"slow pixels");
        let mut codec = MessageCodec;
        let mut buf = BytesMut::new();

        for (i, &byte) in wire.iter().enumerate() {
            buf.extend_from_slice(&[byte]);
            let decoded = codec.decode(&mut buf).unwrap();
            if i + 1 < wire.len() {
                assert!(decoded.is_none(), "decoded early at byte {i}");
            } else {
                let msg = decoded.unwrap();
                assert_eq!(&msg.payload[..], b"slow pixels");
            }
        }
    }

    #[test]
    fn ragged_chunks_across_two_messages() {
        let mut wire = wire_message(b"first");
        wire.extend_from_slice(&wire_message(b"second payload"));

        let mut codec = MessageCodec;
        let mut buf = BytesMut::new();
        let mut decoded = Vec::new();

        for chunk in wire.chunks(7) {
            buf.extend_from_slice(chunk);
            while let Some(msg) = codec.decode(&mut buf).unwrap() {
                decoded.push(msg);
            }
        }

        assert_eq!(decoded.len(), 2);
        assert_eq!(&decoded[0].payload[..], b"first");
        assert_eq!(&decoded[1].payload[..], b"second payload");
    }

    #[test]
    fn zero_payload_message() {
        let wire = wire_message(b"");
        let mut buf = BytesMut::from(&wire[..]);

        let msg = MessageCodec.decode(&mut buf).unwrap().unwrap();
        assert!(msg.payload.is_empty());
    }

    #[test]
    fn oversized_payload_rejected() {
        let mut header =
            MessageHeader::new(MessageType::PixelStream, 0, "mosaic://test").encode();
        let huge = (MAX_PAYLOAD_SIZE as u32 + 1).to_ne_bytes();
        header[0..4].copy_from_slice(&huge);

        let mut buf = BytesMut::from(&header[..]);
        assert!(matches!(
            MessageCodec.decode(&mut buf),
            Err(MosaicError::PayloadTooLarge { .. })
        ));
    }
}
