//! In-process transport.
//!
//! [`pair`] returns a client-side [`LoopbackTransport`] and the [`Peer`] that
//! plays the server. Documents cross unchanged; there is no framing. Used by
//! the test suites and by embedders that host the NETCONF server in the same
//! process.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::{Outbound, Session, Transport, TransportError};

/// Creates a connected transport/peer pair.
pub fn pair() -> (LoopbackTransport, Peer) {
    let (to_peer, from_client) = mpsc::unbounded_channel();
    let (to_client, from_peer) = mpsc::unbounded_channel();
    (
        LoopbackTransport { to_peer, from_peer },
        Peer {
            from_client,
            to_client,
        },
    )
}

/// Client side of a loopback channel.
#[derive(Debug)]
pub struct LoopbackTransport {
    to_peer: mpsc::UnboundedSender<String>,
    from_peer: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        if self.to_peer.is_closed() {
            return Err(TransportError::Disconnected);
        }
        Ok(())
    }

    async fn run(
        mut self: Box<Self>,
        mut outbound: Outbound,
        session: Session,
    ) -> Result<(), TransportError> {
        loop {
            tokio::select! {
                document = outbound.next() => match document {
                    Some(document) => self
                        .to_peer
                        .send(document)
                        .map_err(|_| TransportError::Disconnected)?,
                    None => {
                        debug!("loopback transport shutting down");
                        return Ok(());
                    }
                },
                inbound = self.from_peer.recv() => match inbound {
                    Some(raw) => session.dispatch_message(&raw),
                    None => return Err(TransportError::Disconnected),
                },
            }
        }
    }
}

/// Server side of a loopback channel.
#[derive(Debug)]
pub struct Peer {
    from_client: mpsc::UnboundedReceiver<String>,
    to_client: mpsc::UnboundedSender<String>,
}

impl Peer {
    /// Next document written by the client, or `None` once the client side
    /// is gone.
    pub async fn recv(&mut self) -> Option<String> {
        self.from_client.recv().await
    }

    /// Delivers a document to the client.
    pub fn send(&self, document: impl Into<String>) -> Result<(), TransportError> {
        self.to_client
            .send(document.into())
            .map_err(|_| TransportError::Disconnected)
    }

    /// Closes the channel. The client's worker ends with
    /// [`TransportError::Disconnected`].
    pub fn hang_up(self) {}
}
