//! Listeners notified of inbound documents and session errors.

use std::any::Any;

use netconf::{hello, Hello, RootElement};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::debug;

use crate::{ListenerError, SessionError};

/// Receives every document dispatched by a [`crate::Session`], and every
/// error the session reports.
///
/// Callbacks run on the session's worker task. Keep them short; hand heavy
/// work off to another task.
///
/// Listeners are identified by handle: registering the same `Arc` twice is a
/// no-op, and removal needs that same `Arc`.
pub trait SessionListener: Any + Send + Sync {
    /// Called with each inbound document.
    ///
    /// `root` describes the document's root element so the listener can
    /// decide whether to parse `raw` at all.
    fn callback(&self, root: &RootElement, raw: &str) -> Result<(), ListenerError>;

    /// Called when the session reports an error.
    fn errback(&self, error: &SessionError) -> Result<(), ListenerError>;
}

// ---------------------------------------------------------------------------
// Greeting listener
// ---------------------------------------------------------------------------

type HelloOutcome = Result<Hello, SessionError>;

/// Transient listener installed for the duration of the handshake.
///
/// Fires its one-shot signal on the first `<hello>` or the first error,
/// whichever comes first; later events are ignored.
pub(crate) struct HelloHandler {
    signal: Mutex<Option<oneshot::Sender<HelloOutcome>>>,
}

impl HelloHandler {
    pub(crate) fn new() -> (Self, oneshot::Receiver<HelloOutcome>) {
        let (tx, rx) = oneshot::channel();
        let handler = Self {
            signal: Mutex::new(Some(tx)),
        };
        (handler, rx)
    }

    fn fire(&self, outcome: HelloOutcome) {
        if let Some(tx) = self.signal.lock().take() {
            let _ = tx.send(outcome);
        }
    }
}

impl SessionListener for HelloHandler {
    fn callback(&self, root: &RootElement, raw: &str) -> Result<(), ListenerError> {
        if !root.is("hello") {
            return Ok(());
        }
        debug!("received server hello");
        match hello::parse(raw) {
            Ok(hello) => self.fire(Ok(hello)),
            Err(e) => self.fire(Err(SessionError::handshake(e))),
        }
        Ok(())
    }

    fn errback(&self, error: &SessionError) -> Result<(), ListenerError> {
        self.fire(Err(SessionError::handshake(error)));
        Ok(())
    }
}
