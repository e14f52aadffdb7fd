//! Accept loop for inbound producer connections.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::MosaicError;
use crate::net::worker::ConnectionWorker;
use crate::store::StreamStores;

// ── ConsumerListener ─────────────────────────────────────────────

/// Accepts producer connections and spawns one [`ConnectionWorker`] task
/// per connection. Workers are independent; a failing connection never
/// affects another or the stores' unrelated entries.
pub struct ConsumerListener {
    listener: TcpListener,
    stores: Arc<StreamStores>,
}

impl ConsumerListener {
    /// Bind the well-known streaming port.
    pub async fn bind(addr: impl ToSocketAddrs, stores: Arc<StreamStores>) -> Result<Self, MosaicError> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, stores })
    }

    /// The actually bound address (useful with port 0).
    pub fn local_addr(&self) -> Result<SocketAddr, MosaicError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept until `shutdown` fires. Accepting itself never times out;
    /// the watch channel is what makes clean process shutdown possible.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<(), MosaicError> {
        info!(addr = %self.local_addr()?, "listening for producers");

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("listener shutting down");
                    return Ok(());
                }
                accepted = self.listener.accept() => {
                    let (stream, peer) = accepted?;
                    debug!(%peer, "accepted producer connection");
                    let stores = Arc::clone(&self.stores);
                    tokio::spawn(async move {
                        let worker = ConnectionWorker::new(stream, peer, stores);
                        if let Err(e) = worker.run().await {
                            warn!(%peer, "connection worker exited: {e}");
                        }
                    });
                }
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn shutdown_interrupts_accept() {
        let stores = Arc::new(StreamStores::new());
        let listener = ConsumerListener::bind("127.0.0.1:0", stores).await.unwrap();
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(listener.run(rx));
        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send(true).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("listener did not stop")
            .unwrap();
        assert!(result.is_ok());
    }
}
