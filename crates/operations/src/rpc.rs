//! Request/reply correlation on top of [`Session::send`] and the listener
//! contract.
//!
//! Every request is wrapped in `<rpc message-id="…">` and registered with the
//! session's [`ReplyRouter`] before it is queued. The router is an ordinary
//! [`SessionListener`]: it picks `<rpc-reply>` documents out of the inbound
//! stream and completes the matching waiter. One router is kept per session
//! through [`Session::get_or_add_listener`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use netconf::{Element, MessageId, ReplyPayload, RootElement, RpcReply, NETCONF_NS};
use parking_lot::Mutex;
use session::{ListenerError, Session, SessionError, SessionListener};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::OperationError;

type Waiter = oneshot::Sender<Result<String, String>>;

// ---------------------------------------------------------------------------
// Reply router
// ---------------------------------------------------------------------------

/// Routes `<rpc-reply>` documents to the request that is waiting for them.
#[derive(Default)]
pub struct ReplyRouter {
    pending: Mutex<HashMap<MessageId, Waiter>>,
}

impl ReplyRouter {
    /// The session's router, installing one if none is registered yet.
    pub fn for_session(session: &Session) -> Arc<Self> {
        session.get_or_add_listener(|| Arc::new(ReplyRouter::default()))
    }

    /// Number of requests still waiting for a reply.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    fn register(&self, message_id: MessageId) -> oneshot::Receiver<Result<String, String>> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(message_id, tx);
        rx
    }

    fn forget(&self, message_id: &MessageId) {
        self.pending.lock().remove(message_id);
    }
}

impl SessionListener for ReplyRouter {
    fn callback(&self, root: &RootElement, raw: &str) -> Result<(), ListenerError> {
        if !root.is("rpc-reply") {
            return Ok(());
        }
        let Some(message_id) = root.attribute("message-id").and_then(MessageId::new) else {
            return Err(ListenerError::new("rpc-reply without message-id"));
        };
        let waiter = self.pending.lock().remove(&message_id);
        match waiter {
            Some(tx) => {
                debug!(message_id = %message_id, "delivering reply");
                if tx.send(Ok(raw.to_owned())).is_err() {
                    debug!(message_id = %message_id, "requester stopped waiting");
                }
            }
            None => warn!(message_id = %message_id, "reply to unknown request"),
        }
        Ok(())
    }

    fn errback(&self, error: &SessionError) -> Result<(), ListenerError> {
        let waiters: Vec<(MessageId, Waiter)> = self.pending.lock().drain().collect();
        for (message_id, tx) in waiters {
            debug!(message_id = %message_id, error = %error, "failing pending request");
            let _ = tx.send(Err(error.to_string()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Request executor
// ---------------------------------------------------------------------------

/// Sends operations over a session and waits for their replies.
#[derive(Debug, Clone)]
pub struct Rpc {
    session: Session,
    timeout: Duration,
}

impl Rpc {
    /// Uses the session's configured reply timeout.
    pub fn new(session: Session) -> Self {
        let timeout = session.config().reply_timeout();
        Self { session, timeout }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Sends `operation` and returns the reply, parsed lazily.
    ///
    /// Server-reported errors are not raised; inspect the reply.
    pub async fn request(&self, operation: Element) -> Result<RpcReply, OperationError> {
        self.request_with(operation).await
    }

    /// Like [`request`](Self::request) with an operation-specific payload
    /// type.
    pub async fn request_with<P: ReplyPayload>(
        &self,
        operation: Element,
    ) -> Result<RpcReply<P>, OperationError> {
        let message_id = MessageId::random();
        let document = Element::new("rpc")
            .with_namespace(NETCONF_NS)
            .with_attribute("message-id", message_id.as_str())
            .with_child(operation)
            .to_document()?;

        let router = ReplyRouter::for_session(&self.session);
        let reply = router.register(message_id.clone());
        if let Err(e) = self.session.send(document) {
            router.forget(&message_id);
            return Err(e.into());
        }
        debug!(message_id = %message_id, "rpc sent");

        match tokio::time::timeout(self.timeout, reply).await {
            Ok(Ok(Ok(raw))) => Ok(RpcReply::new(raw)),
            Ok(Ok(Err(reason))) => Err(OperationError::SessionFailure { reason }),
            Ok(Err(_)) => Err(OperationError::Session(SessionError::Closed)),
            Err(_) => {
                router.forget(&message_id);
                Err(OperationError::ReplyTimeout {
                    message_id,
                    timeout: self.timeout,
                })
            }
        }
    }

    /// Fails unless the server advertised `capability` (URI or shorthand).
    pub fn assert_capability(&self, capability: &str) -> Result<(), OperationError> {
        match self.session.server_capabilities() {
            Some(caps) if caps.contains(capability) => Ok(()),
            _ => Err(OperationError::MissingCapability {
                capability: capability.to_owned(),
            }),
        }
    }
}
