//! Error types for the session engine.
//!
//! [`TransportError`] is produced by [`crate::Transport`] implementations.
//! [`SessionError`] covers everything the engine itself reports, and is also
//! the value broadcast to listeners through
//! [`crate::SessionListener::errback`].

use std::time::Duration;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

/// Failure reported by a transport while connecting or running.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Underlying I/O failed.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The remote end closed the channel.
    #[error("remote end disconnected")]
    Disconnected,

    /// Any other transport-specific failure.
    #[error("transport error: {message}")]
    Other {
        /// Description supplied by the transport.
        message: String,
    },
}

impl TransportError {
    /// Creates a [`TransportError::Other`].
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Session errors
// ---------------------------------------------------------------------------

/// Errors reported by a [`crate::Session`].
#[derive(Debug, Error)]
pub enum SessionError {
    /// The transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The session has been closed, or its worker has exited; nothing more
    /// can be sent.
    #[error("session is closed")]
    Closed,

    /// `connect` was called on a session whose worker was already started.
    #[error("session worker already started")]
    AlreadyStarted,

    /// The greeting exchange failed.
    #[error("handshake failed: {reason}")]
    Handshake {
        /// Why the handshake failed.
        reason: String,
    },

    /// The server did not greet within the configured bound.
    #[error("no <hello> received from server within {timeout:?}")]
    HandshakeTimeout {
        /// The bound that elapsed.
        timeout: Duration,
    },

    /// A local document could not be serialized.
    #[error(transparent)]
    Xml(#[from] netconf::XmlError),
}

impl SessionError {
    pub(crate) fn handshake(reason: impl std::fmt::Display) -> Self {
        Self::Handshake {
            reason: reason.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Listener errors
// ---------------------------------------------------------------------------

/// Failure returned by a listener callback.
///
/// The session logs it and carries on dispatching to the other listeners.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ListenerError {
    message: String,
}

impl ListenerError {
    pub fn new(message: impl std::fmt::Display) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}
