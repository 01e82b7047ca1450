//! Error types for the NETCONF protocol domain.
//!
//! These cover conditions detected while reading or writing protocol
//! documents. Server-reported `<rpc-error>` records are not errors of this
//! crate; they are data, modelled by [`crate::RpcError`] and surfaced through
//! [`crate::RpcReply`].
//!
//! Session and operation level errors live in the `session` and `operations`
//! crates respectively.

use thiserror::Error;

// ---------------------------------------------------------------------------
// XML errors
// ---------------------------------------------------------------------------

/// Failure to parse or serialize an XML document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum XmlError {
    /// The input is not a well-formed XML document.
    #[error("malformed XML: {message}")]
    Parse {
        /// Description reported by the XML reader.
        message: String,
    },

    /// The input contains no root element.
    #[error("document has no root element")]
    Empty,

    /// The element tree could not be serialized.
    #[error("failed to serialize XML: {message}")]
    Write {
        /// Description reported by the XML writer.
        message: String,
    },
}

impl XmlError {
    pub(crate) fn parse(err: impl std::fmt::Display) -> Self {
        Self::Parse {
            message: err.to_string(),
        }
    }

    pub(crate) fn write(err: impl std::fmt::Display) -> Self {
        Self::Write {
            message: err.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Greeting errors
// ---------------------------------------------------------------------------

/// Failure to interpret a `<hello>` greeting.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HelloError {
    /// The document parsed, but its root element is not `<hello>`.
    #[error("expected <hello>, found <{found}>")]
    NotHello {
        /// Local name of the root element actually found.
        found: String,
    },

    /// The document could not be parsed at all.
    #[error(transparent)]
    Xml(#[from] XmlError),
}

// ---------------------------------------------------------------------------
// Reply errors
// ---------------------------------------------------------------------------

/// Failure to interpret an `<rpc-reply>` document.
///
/// Clonable because a reply caches the outcome of its single parse and hands
/// the same failure to every later caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplyError {
    /// The reply text is not a well-formed XML document.
    #[error("malformed rpc-reply: {0}")]
    Malformed(#[from] XmlError),

    /// The operation-specific payload hook rejected the reply.
    #[error("invalid reply payload: {message}")]
    Payload {
        /// Description produced by the payload extractor.
        message: String,
    },
}

impl ReplyError {
    /// Creates a [`ReplyError::Payload`] from any displayable reason.
    pub fn payload(message: impl Into<String>) -> Self {
        Self::Payload {
            message: message.into(),
        }
    }
}
