//! Wire protocol for the mosaic pixel stream.
//!
//! Every message on the wire is a fixed-size [`MessageHeader`] followed by
//! `payload_size` bytes of payload. Pixel and vector messages carry a
//! fixed-size [`SegmentParameters`] record followed by an opaque image blob.
//! Acknowledgments are **not** header-framed: they are the bare 3-byte
//! literal [`ACK`], written standalone after each received message.
//!
//! ## Wire format
//!
//! **Message header** (72 bytes):
//! ```text
//! payload_size:  u32      (4)
//! message_type:  i32      (4)
//! source_uri:    [u8; 64] (NUL-terminated, truncated)
//! ```
//!
//! **Segment parameters** (29 bytes):
//! ```text
//! source_index:  i32  (4)
//! x:             i32  (4)
//! y:             i32  (4)
//! width:         i32  (4)
//! height:        i32  (4)
//! total_width:   i32  (4)
//! total_height:  i32  (4)
//! compressed:    u8   (1)
//! ```
//!
//! All integers are encoded in the **host's native byte order**. This is a
//! deliberate compatibility decision inherited from the wire contract; it
//! is a known portability caveat for mixed-endianness deployments.
//!
//! Immediately after accepting a connection the consumer writes a 4-byte
//! protocol version integer; the producer must read and validate it before
//! sending any framed message.

pub mod header;
pub mod message;
pub mod segment;

pub use header::{MessageHeader, SOURCE_URI_LEN};
pub use message::{ACK, MessageType, PROTOCOL_VERSION};
pub use segment::{Segment, SegmentParameters};
