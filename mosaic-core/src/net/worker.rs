//! Per-connection receive worker.
//!
//! One worker per accepted producer connection. Workers share no mutable
//! state with each other except the reassembly stores, which synchronize
//! internally. A worker that dies takes down only its own connection; the
//! stores' data for that source stays (eviction happens on QUIT, not on
//! disconnect).

use std::net::SocketAddr;
use std::sync::Arc;

use futures::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::FramedRead;
use tracing::{debug, info, warn};

use crate::error::MosaicError;
use crate::net::framing::{IncomingMessage, MessageCodec};
use crate::protocol::message::{ACK, MessageType, PROTOCOL_VERSION};
use crate::protocol::segment::Segment;
use crate::store::StreamStores;

// ── ConnectionWorker ─────────────────────────────────────────────

/// Server side of one producer connection: announces the protocol
/// version, then reads framed messages in a loop, dispatching each to the
/// stores and acknowledging it with the bare 3-byte ack.
pub struct ConnectionWorker<S> {
    stream: S,
    peer: SocketAddr,
    stores: Arc<StreamStores>,
}

impl<S> ConnectionWorker<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, peer: SocketAddr, stores: Arc<StreamStores>) -> Self {
        Self {
            stream,
            peer,
            stores,
        }
    }

    /// Run the receive loop until the peer disconnects or the transport
    /// fails. Returns `Ok` on clean EOF.
    pub async fn run(self) -> Result<(), MosaicError> {
        let peer = self.peer;
        let (read_half, mut write_half) = tokio::io::split(self.stream);

        // Version announcement comes first, before any framed traffic.
        write_half
            .write_all(&PROTOCOL_VERSION.to_ne_bytes())
            .await?;

        let mut messages = FramedRead::new(read_half, MessageCodec);

        while let Some(next) = messages.next().await {
            let message = next?;
            Self::dispatch(&self.stores, peer, &message);
            // Ack unconditionally, including unknown or malformed messages,
            // so the peer's synchronous send loop never deadlocks.
            write_half.write_all(&ACK).await?;
        }

        debug!(%peer, "producer disconnected");
        Ok(())
    }

    /// Route one message to the stores. Never fatal: protocol-level
    /// problems are logged and the connection continues.
    fn dispatch(stores: &StreamStores, peer: SocketAddr, message: &IncomingMessage) {
        let uri = message.header.uri();

        match message.header.message_type() {
            Ok(MessageType::PixelStream) => match Segment::from_payload(&message.payload) {
                Ok(mut segment) => {
                    // Single-segment streams always occupy index 0.
                    segment.parameters.source_index = 0;
                    stores.pixels.insert(&uri, segment);
                }
                Err(e) => warn!(%peer, %uri, "bad pixel stream payload: {e}"),
            },
            Ok(MessageType::ParallelPixelStream) => match Segment::from_payload(&message.payload) {
                Ok(segment) => stores.pixels.insert(&uri, segment),
                Err(e) => warn!(%peer, %uri, "bad parallel segment payload: {e}"),
            },
            Ok(MessageType::DimensionsChanged) => match Segment::from_payload(&message.payload) {
                Ok(segment) => stores.pixels.update_dimensions(
                    &uri,
                    segment.parameters.total_width,
                    segment.parameters.total_height,
                ),
                Err(e) => warn!(%peer, %uri, "bad dimensions payload: {e}"),
            },
            Ok(MessageType::SvgStream) => match Segment::from_payload(&message.payload) {
                Ok(segment) => stores.vectors.insert(&uri, segment),
                Err(e) => warn!(%peer, %uri, "bad svg payload: {e}"),
            },
            Ok(MessageType::Quit) => {
                info!(%peer, %uri, "producer quit; evicting source");
                stores.remove(&uri);
            }
            Ok(MessageType::Ack) => {
                // Acks are bare 3-byte writes, never header-framed.
                warn!(%peer, %uri, "peer framed an ack message; discarding");
            }
            Err(e) => {
                warn!(%peer, %uri, "rejected message: {e}");
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::header::MessageHeader;
    use crate::protocol::segment::SegmentParameters;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn peer() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    fn segment_message(ty: MessageType, uri: &str, params: SegmentParameters, blob: &[u8]) -> Vec<u8> {
        let payload_size = (SegmentParameters::SIZE + blob.len()) as u32;
        let mut wire = MessageHeader::new(ty, payload_size, uri).encode().to_vec();
        wire.extend_from_slice(&params.encode());
        wire.extend_from_slice(blob);
        wire
    }

    fn params(index: i32) -> SegmentParameters {
        SegmentParameters {
            source_index: index,
            x: 0,
            y: 0,
            width: 32,
            height: 32,
            total_width: 64,
            total_height: 64,
            compressed: false,
        }
    }

    /// Drive a worker over an in-memory duplex, delivering the wire bytes
    /// in deliberately tiny chunks to exercise partial-read handling.
    #[tokio::test]
    async fn split_reads_still_frame_correctly() {
        let (client, server) = tokio::io::duplex(16);
        let stores = Arc::new(StreamStores::new());
        let worker = ConnectionWorker::new(server, peer(), Arc::clone(&stores));
        let handle = tokio::spawn(worker.run());

        let (mut rd, mut wr) = tokio::io::split(client);

        let mut version = [0u8; 4];
        rd.read_exact(&mut version).await.unwrap();
        assert_eq!(u32::from_ne_bytes(version), PROTOCOL_VERSION);

        let wire = segment_message(
            MessageType::ParallelPixelStream,
            "mosaic://split",
            params(2),
            &[0xEE; 48],
        );
        for chunk in wire.chunks(3) {
            wr.write_all(chunk).await.unwrap();
        }

        let mut ack = [0u8; 3];
        rd.read_exact(&mut ack).await.unwrap();
        assert_eq!(ack, ACK);

        drop(wr);
        drop(rd);
        handle.await.unwrap().unwrap();

        let popped = stores.pixels.pop_latest("mosaic://split");
        assert_eq!(popped.len(), 1);
        assert_eq!(popped[0].parameters.source_index, 2);
        assert_eq!(popped[0].data.len(), 48);
    }

    #[tokio::test]
    async fn unknown_type_is_acked_and_skipped() {
        let (client, server) = tokio::io::duplex(1024);
        let stores = Arc::new(StreamStores::new());
        let worker = ConnectionWorker::new(server, peer(), Arc::clone(&stores));
        let handle = tokio::spawn(worker.run());

        let (mut rd, mut wr) = tokio::io::split(client);
        let mut version = [0u8; 4];
        rd.read_exact(&mut version).await.unwrap();

        // Unknown tag 99 with a small payload.
        let mut wire = MessageHeader::new(MessageType::Quit, 4, "mosaic://u")
            .encode()
            .to_vec();
        wire[4..8].copy_from_slice(&99i32.to_ne_bytes());
        wire.extend_from_slice(b"junk");
        wr.write_all(&wire).await.unwrap();

        let mut ack = [0u8; 3];
        rd.read_exact(&mut ack).await.unwrap();
        assert_eq!(ack, ACK);

        // The connection keeps working afterwards.
        let wire = segment_message(
            MessageType::PixelStream,
            "mosaic://u",
            params(7),
            &[1, 2, 3],
        );
        wr.write_all(&wire).await.unwrap();
        rd.read_exact(&mut ack).await.unwrap();
        assert_eq!(ack, ACK);

        drop(wr);
        drop(rd);
        handle.await.unwrap().unwrap();

        let popped = stores.pixels.pop_latest("mosaic://u");
        assert_eq!(popped.len(), 1);
        // Single-segment streams are forced to index 0.
        assert_eq!(popped[0].parameters.source_index, 0);
    }

    #[tokio::test]
    async fn quit_evicts_both_stores() {
        let (client, server) = tokio::io::duplex(1024);
        let stores = Arc::new(StreamStores::new());
        let worker = ConnectionWorker::new(server, peer(), Arc::clone(&stores));
        let handle = tokio::spawn(worker.run());

        let (mut rd, mut wr) = tokio::io::split(client);
        let mut version = [0u8; 4];
        rd.read_exact(&mut version).await.unwrap();
        let mut ack = [0u8; 3];

        let uri = "mosaic://quitter";
        wr.write_all(&segment_message(MessageType::ParallelPixelStream, uri, params(0), &[9]))
            .await
            .unwrap();
        rd.read_exact(&mut ack).await.unwrap();
        wr.write_all(&segment_message(MessageType::SvgStream, uri, params(0), b"<svg/>"))
            .await
            .unwrap();
        rd.read_exact(&mut ack).await.unwrap();

        wr.write_all(&MessageHeader::new(MessageType::Quit, 0, uri).encode())
            .await
            .unwrap();
        rd.read_exact(&mut ack).await.unwrap();
        assert_eq!(ack, ACK);

        drop(wr);
        drop(rd);
        handle.await.unwrap().unwrap();

        assert!(stores.pixels.pop_latest(uri).is_empty());
        assert!(stores.vectors.pop_latest(uri).is_empty());
        assert!(stores.pixels.uris().is_empty());
    }

    #[tokio::test]
    async fn truncated_segment_payload_is_recoverable() {
        let (client, server) = tokio::io::duplex(1024);
        let stores = Arc::new(StreamStores::new());
        let worker = ConnectionWorker::new(server, peer(), Arc::clone(&stores));
        let handle = tokio::spawn(worker.run());

        let (mut rd, mut wr) = tokio::io::split(client);
        let mut version = [0u8; 4];
        rd.read_exact(&mut version).await.unwrap();

        // Declares a 5-byte payload, too short for SegmentParameters.
        let mut wire = MessageHeader::new(MessageType::ParallelPixelStream, 5, "mosaic://t")
            .encode()
            .to_vec();
        wire.extend_from_slice(&[0u8; 5]);
        wr.write_all(&wire).await.unwrap();

        let mut ack = [0u8; 3];
        rd.read_exact(&mut ack).await.unwrap();
        assert_eq!(ack, ACK);

        drop(wr);
        drop(rd);
        handle.await.unwrap().unwrap();
        assert!(stores.pixels.pop_latest("mosaic://t").is_empty());
    }
}
