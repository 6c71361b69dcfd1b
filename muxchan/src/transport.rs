//! Transport layer - the injected duplex provider a channel runs over

use crate::envelope::Payload;
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// Transport trait for abstracting the underlying duplex connection.
///
/// `is_closed` and `close` are optional capabilities; providers that cannot
/// support them keep the defaults.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Send a payload to the peer
    async fn send(&self, payload: Payload) -> Result<()>;

    /// Receive the next inbound payload
    async fn recv(&self) -> Result<Payload>;

    /// Whether the connection is known to be closed
    fn is_closed(&self) -> bool {
        false
    }

    /// Close the transport
    async fn close(&self) -> Result<()> {
        Err(Error::NotImplemented("close"))
    }
}

/// In-memory transport: one end of a connected pair.
///
/// Closing either end marks both ends closed, mirroring a dropped duplex
/// connection.
pub struct MemoryTransport {
    tx: mpsc::UnboundedSender<Payload>,
    rx: Mutex<mpsc::UnboundedReceiver<Payload>>,
    closed: Arc<AtomicBool>,
}

/// Create two connected in-memory transports
pub fn pair() -> (MemoryTransport, MemoryTransport) {
    let (left_tx, right_rx) = mpsc::unbounded_channel();
    let (right_tx, left_rx) = mpsc::unbounded_channel();
    let closed = Arc::new(AtomicBool::new(false));

    (
        MemoryTransport {
            tx: left_tx,
            rx: Mutex::new(left_rx),
            closed: closed.clone(),
        },
        MemoryTransport {
            tx: right_tx,
            rx: Mutex::new(right_rx),
            closed,
        },
    )
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&self, payload: Payload) -> Result<()> {
        self.tx
            .send(payload)
            .map_err(|_| Error::transport_msg("peer receiver dropped"))
    }

    async fn recv(&self) -> Result<Payload> {
        let mut rx = self.rx.lock().await;
        rx.recv().await.ok_or(Error::ChannelClosed)
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
