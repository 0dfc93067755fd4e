//! Peer connections and the outbound transport seam.
//!
//! The engine does not speak to sockets. Each registered peer is an
//! [`Arc<dyn PeerTransport>`] that accepts encoded frames; the transport
//! owns reliable in-order delivery, send timeouts and teardown. A failed
//! send is treated as "the host will remove this connection" and the flush
//! moves on.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;

/// Errors surfaced by a peer transport send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The peer's outbound channel is full; the frame was dropped.
    #[error("outbound channel full")]
    Full,
    /// The connection is gone; the receiver end was dropped.
    #[error("connection closed")]
    Closed,
}

/// Outbound half of a registered peer connection.
pub trait PeerTransport: Send + Sync {
    /// Queue one encoded frame for delivery.
    ///
    /// # Errors
    ///
    /// [`TransportError`] when the frame could not be queued.
    fn send(&self, frame: Bytes) -> Result<(), TransportError>;
}

/// Identity of a registered transport, compared by allocation address.
/// Registering the same `Arc` twice is a duplicate; two distinct transports
/// to the same remote host are not.
pub(crate) fn transport_identity(conn: &Arc<dyn PeerTransport>) -> usize {
    Arc::as_ptr(conn).cast::<()>() as usize
}

/// Bounded-channel [`PeerTransport`] for in-process peers and tests.
///
/// The receiver half belongs to the host's write loop, which drains frames
/// onto the real socket. Sends never block: a full channel surfaces
/// backpressure as [`TransportError::Full`] instead of stalling a flush.
#[derive(Debug)]
pub struct ChannelPeer {
    tx: mpsc::Sender<Bytes>,
}

impl ChannelPeer {
    /// Create a peer with the given channel bound, returning the transport
    /// and the receiver for the write loop.
    #[must_use]
    pub fn new(capacity: usize) -> (Arc<Self>, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Arc::new(Self { tx }), rx)
    }
}

impl PeerTransport for ChannelPeer {
    fn send(&self, frame: Bytes) -> Result<(), TransportError> {
        self.tx.try_send(frame).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => TransportError::Full,
            mpsc::error::TrySendError::Closed(_) => TransportError::Closed,
        })
    }
}
