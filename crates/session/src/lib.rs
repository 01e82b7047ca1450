//! NETCONF session engine.
//!
//! A [`Session`] owns one protocol session: it runs exactly one background
//! worker (the [`Transport`]'s `run`), queues outbound documents, dispatches
//! inbound documents to registered [`SessionListener`]s, and performs the
//! `<hello>` handshake when connected.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Everything here is about moving whole XML documents
//! between tasks. Document content is interpreted by the [`netconf`] crate;
//! request/reply correlation lives in the `operations` crate, riding on
//! [`Session::send`] and the listener contract.
//!
//! ## Transports
//!
//! | Transport | Notes |
//! |-----------|-------|
//! | [`loopback::LoopbackTransport`] | In-process pair; tests and embedded servers |
//! | SSH / TLS | Supplied by the embedder by implementing [`Transport`] |
//!
//! ## Example
//!
//! ```no_run
//! # async fn demo(transport: impl session::Transport) -> Result<(), session::SessionError> {
//! use netconf::Capabilities;
//! use session::{Session, SessionConfig};
//!
//! let session = Session::new(Capabilities::client_default(), SessionConfig::default());
//! session.connect(transport).await?;
//! println!("session {} ready", session.id().unwrap());
//! session.close().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod errors;
pub mod listener;
pub mod loopback;
pub mod session;
pub mod transport;

pub use config::SessionConfig;
pub use errors::{ListenerError, SessionError, TransportError};
pub use listener::SessionListener;
pub use session::{Session, SessionState};
pub use transport::{Outbound, Transport};
