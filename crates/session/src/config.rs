//! Session tuning knobs.
//!
//! [`SessionConfig`] is deserializable so embedders can load it from whatever
//! configuration source they use. Every field has a default; a partial
//! document only overrides what it names.

use std::time::Duration;

use serde::{Deserialize, Serialize};

const DEFAULT_HANDSHAKE_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_REPLY_TIMEOUT_MS: u64 = 30_000;

/// Timeouts applied by a session and the operations riding on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// How long `connect` waits for the server's `<hello>`.
    pub handshake_timeout_ms: u64,
    /// How long an RPC waits for its `<rpc-reply>`.
    pub reply_timeout_ms: u64,
}

impl SessionConfig {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            handshake_timeout_ms: DEFAULT_HANDSHAKE_TIMEOUT_MS,
            reply_timeout_ms: DEFAULT_REPLY_TIMEOUT_MS,
        }
    }
}
