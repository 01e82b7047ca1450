//! Error types for NETCONF operations.
//!
//! [`OperationError`] groups the failures an operation call can produce:
//!
//! - parameter validation, raised before anything is sent;
//! - capability preconditions, raised before anything is sent;
//! - session and reply-wait failures;
//! - server-reported `<rpc-error>`s, but only when a helper chooses to raise
//!   them. Plain RPC calls return the reply and leave inspection to the
//!   caller.
//!
//! [`ScopeError`] is returned by [`crate::LockContext::scope`].

use std::time::Duration;

use netconf::{MessageId, ReplyError, RpcError};
use session::SessionError;
use thiserror::Error;

/// Failure of a NETCONF operation.
#[derive(Debug, Error)]
pub enum OperationError {
    /// None of the mutually exclusive parameters was supplied.
    #[error("insufficient parameters")]
    InsufficientParameters,

    /// More than one of the mutually exclusive parameters was supplied.
    #[error("too many parameters")]
    TooManyParameters,

    /// A filter kind other than `subtree` or `xpath` was requested.
    #[error("invalid filter type '{kind}'")]
    InvalidFilterType {
        /// The rejected kind.
        kind: String,
    },

    /// The operation needs a capability the server did not advertise.
    #[error("server lacks required capability {capability}")]
    MissingCapability {
        /// Capability URI or shorthand that was required.
        capability: String,
    },

    /// The session could not carry the request.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The session ended before the reply arrived.
    #[error("session failed while awaiting reply: {reason}")]
    SessionFailure {
        /// The session error, rendered.
        reason: String,
    },

    /// No reply arrived in time.
    #[error("no reply to message {message_id} within {timeout:?}")]
    ReplyTimeout {
        /// Id of the unanswered request.
        message_id: MessageId,
        /// The bound that elapsed.
        timeout: Duration,
    },

    /// The reply could not be parsed.
    #[error(transparent)]
    Reply(#[from] ReplyError),

    /// The server reported an error.
    #[error("server reported an error: {0}")]
    Rpc(#[from] RpcError),

    /// The request document could not be serialized.
    #[error(transparent)]
    Xml(#[from] netconf::XmlError),
}

/// Failure of a scoped, paired acquire/release sequence.
///
/// When both the protected body and the release fail, the body's error is
/// returned and the release failure is logged.
#[derive(Debug, Error)]
pub enum ScopeError<E> {
    /// Acquisition failed; the body did not run.
    #[error("failed to acquire: {0}")]
    Acquire(#[source] OperationError),

    /// The body failed. Release was attempted.
    #[error("protected block failed")]
    Body(#[source] E),

    /// The body succeeded but release failed.
    #[error("failed to release: {0}")]
    Release(#[source] OperationError),
}
