//! NETCONF protocol domain.
//!
//! This crate contains every protocol concept the session engine and the
//! operation layer share: newtype identifiers, the XML element tree used to
//! build and read documents, capability sets, the `<hello>` greeting, and the
//! `<rpc-reply>` / `<rpc-error>` model.
//!
//! ## Architectural Layer
//!
//! **Domain.** This crate performs no I/O. Documents arrive and leave as
//! strings; transports and sessions live in the `session` crate.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | `SessionId`, `MessageId`, `Datastore` |
//! | [`xml`] | `Element` tree, serializer, parser, root descriptor |
//! | [`capabilities`] | `Capabilities` set with shorthand lookup |
//! | [`hello`] | greeting build/parse |
//! | [`reply`] | `RpcReply`, `RpcError`, `ReplyPayload` hook |
//! | [`errors`] | `XmlError`, `HelloError`, `ReplyError` |

pub mod capabilities;
pub mod errors;
pub mod hello;
pub mod identifiers;
pub mod reply;
pub mod xml;

/// Namespace of every element defined by the NETCONF base protocol.
pub const NETCONF_NS: &str = "urn:ietf:params:xml:ns:netconf:base:1.0";

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use capabilities::Capabilities;
pub use errors::{HelloError, ReplyError, XmlError};
pub use hello::Hello;
pub use identifiers::{Datastore, MessageId, SessionId};
pub use reply::{ReplyPayload, RpcError, RpcReply};
pub use xml::{parse_root, Element, RootElement};
