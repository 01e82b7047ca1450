//! The contract between the session engine and a concrete transport.
//!
//! A transport owns the raw channel to the server (an SSH subsystem, a TLS
//! stream, an in-process pipe). The engine never touches bytes: it hands the
//! transport an [`Outbound`] queue of whole documents to write and expects
//! every whole inbound document to come back through
//! [`Session::dispatch_message`].

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{Session, TransportError};

/// A channel capable of carrying NETCONF documents.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Opens the channel. Transport-specific parameters are supplied when the
    /// transport value is constructed.
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Services the open channel until it closes.
    ///
    /// This is the session worker's body. It must keep writing documents
    /// taken from `outbound` and keep feeding inbound documents to
    /// [`Session::dispatch_message`]. When `outbound` yields `None` the
    /// session is shutting down and `run` should return `Ok(())`.
    async fn run(
        self: Box<Self>,
        outbound: Outbound,
        session: Session,
    ) -> Result<(), TransportError>;
}

/// Documents queued by [`Session::send`], in order.
#[derive(Debug)]
pub struct Outbound {
    queue: mpsc::UnboundedReceiver<String>,
    shutdown: CancellationToken,
}

impl Outbound {
    pub(crate) fn new(queue: mpsc::UnboundedReceiver<String>, shutdown: CancellationToken) -> Self {
        Self { queue, shutdown }
    }

    /// Waits for the next document to write.
    ///
    /// Returns `None` once the session is shutting down. Documents still
    /// queued at that point are discarded.
    pub async fn next(&mut self) -> Option<String> {
        tokio::select! {
            biased;
            () = self.shutdown.cancelled() => None,
            document = self.queue.recv() => document,
        }
    }

    /// Resolves once the session is shutting down.
    ///
    /// For transports that block on reads independently of [`next`](Self::next).
    pub async fn closed(&self) {
        self.shutdown.cancelled().await;
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}
