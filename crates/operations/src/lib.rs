//! NETCONF operations.
//!
//! This crate turns a [`session::Session`] into something that can answer
//! questions: [`Rpc`] correlates requests with replies by `message-id`,
//! [`Lock`] / [`Unlock`] wrap the datastore locking operations, and
//! [`LockContext`] holds a lock for the duration of a block.
//!
//! ## Architectural Layer
//!
//! **Orchestration.** Operations build request trees with the [`netconf`]
//! crate and move them through the session. They never touch a transport.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`rpc`] | `Rpc` executor and the per-session `ReplyRouter` listener |
//! | [`lock`] | `Lock`, `Unlock`, `LockContext` |
//! | [`util`] | `one_of`, `store_or_url`, `Filter` / `build_filter` |
//! | [`errors`] | `OperationError`, `ScopeError` |

pub mod errors;
pub mod lock;
pub mod rpc;
pub mod util;

pub use errors::{OperationError, ScopeError};
pub use lock::{Lock, LockContext, Unlock};
pub use rpc::{ReplyRouter, Rpc};
pub use util::{build_filter, one_of, store_or_url, Filter};
