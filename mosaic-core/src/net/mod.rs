//! Consumer-side networking: message framing, the per-connection worker,
//! and the accept loop.

pub mod framing;
pub mod listener;
pub mod worker;

pub use framing::{IncomingMessage, MAX_PAYLOAD_SIZE, MessageCodec};
pub use listener::ConsumerListener;
pub use worker::ConnectionWorker;
