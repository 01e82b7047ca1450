//! `<lock>` / `<unlock>` and scoped locking.
//!
//! [`LockContext::scope`] pairs the two: the datastore is locked, the body
//! runs, and the datastore is unlocked exactly once however the body ends.
//! If the scope future itself is dropped while holding the lock, the unlock
//! is sent from a spawned task instead.

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};

use futures::FutureExt;
use netconf::{Datastore, Element, RpcReply};
use session::Session;
use tracing::{debug, warn};

use crate::rpc::Rpc;
use crate::{OperationError, ScopeError};

/// Builds `<{name}><target><{datastore}/></target></{name}>`.
///
/// Each call returns a fresh tree.
fn datastore_operation(name: &str, target: &Datastore) -> Element {
    Element::new(name).with_child(Element::new("target").with_child(Element::new(target.as_str())))
}

/// Raises the reply's first `<rpc-error>` as an [`OperationError::Rpc`].
fn raise_for_error(reply: &RpcReply) -> Result<(), OperationError> {
    if reply.ok()? {
        return Ok(());
    }
    let error = reply.error()?.cloned().unwrap_or_default();
    Err(OperationError::Rpc(error))
}

/// The `<lock>` operation.
#[derive(Debug, Clone)]
pub struct Lock {
    rpc: Rpc,
}

impl Lock {
    pub fn new(session: Session) -> Self {
        Self {
            rpc: Rpc::new(session),
        }
    }

    /// Requests a lock on `target`. Server errors are left in the reply.
    pub async fn request(&self, target: &Datastore) -> Result<RpcReply, OperationError> {
        debug!(datastore = %target, "requesting lock");
        self.rpc.request(datastore_operation("lock", target)).await
    }
}

/// The `<unlock>` operation.
#[derive(Debug, Clone)]
pub struct Unlock {
    rpc: Rpc,
}

impl Unlock {
    pub fn new(session: Session) -> Self {
        Self {
            rpc: Rpc::new(session),
        }
    }

    /// Releases the lock on `target`. Server errors are left in the reply.
    pub async fn request(&self, target: &Datastore) -> Result<RpcReply, OperationError> {
        debug!(datastore = %target, "requesting unlock");
        self.rpc.request(datastore_operation("unlock", target)).await
    }
}

/// Sends Unlock from a background task if dropped while still armed.
struct ReleaseOnDrop {
    context: Option<LockContext>,
}

impl ReleaseOnDrop {
    fn disarm(&mut self) {
        self.context = None;
    }
}

impl Drop for ReleaseOnDrop {
    fn drop(&mut self) {
        let Some(context) = self.context.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                warn!(datastore = %context.target, "lock scope cancelled, unlocking in background");
                runtime.spawn(async move {
                    if let Err(e) = context.release().await {
                        warn!(datastore = %context.target, error = %e, "background unlock failed");
                    }
                });
            }
            Err(_) => {
                warn!(datastore = %context.target, "lock scope dropped outside a runtime, lock left held");
            }
        }
    }
}

/// Holds a datastore lock for the duration of a block.
///
/// ```no_run
/// # async fn demo(session: session::Session) -> Result<(), Box<dyn std::error::Error>> {
/// use netconf::Datastore;
/// use operations::{LockContext, OperationError};
///
/// let context = LockContext::new(session, Datastore::running());
/// context
///     .scope(|| async {
///         // edit the locked datastore here
///         Ok::<_, OperationError>(())
///     })
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct LockContext {
    session: Session,
    target: Datastore,
}

impl LockContext {
    pub fn new(session: Session, target: Datastore) -> Self {
        Self { session, target }
    }

    pub fn target(&self) -> &Datastore {
        &self.target
    }

    /// Locks the target, failing if the server refused.
    pub async fn acquire(&self) -> Result<(), OperationError> {
        let reply = Lock::new(self.session.clone()).request(&self.target).await?;
        raise_for_error(&reply)
    }

    /// Unlocks the target, failing if the server refused.
    pub async fn release(&self) -> Result<(), OperationError> {
        let reply = Unlock::new(self.session.clone())
            .request(&self.target)
            .await?;
        raise_for_error(&reply)
    }

    /// Runs `body` while holding the lock.
    ///
    /// If acquisition fails the body does not run. Otherwise the lock is
    /// released exactly once, whether the body returns `Ok`, returns `Err`,
    /// or panics. A panic resumes after the release attempt. When both the
    /// body and the release fail the body's error wins and the release
    /// failure is logged.
    ///
    /// Dropping the returned future after the lock was taken (for example
    /// under `tokio::time::timeout`) releases it from a spawned task.
    pub async fn scope<F, Fut, T, E>(&self, body: F) -> Result<T, ScopeError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.acquire().await.map_err(ScopeError::Acquire)?;
        debug!(datastore = %self.target, "lock held");

        let mut guard = ReleaseOnDrop {
            context: Some(self.clone()),
        };
        let outcome = AssertUnwindSafe(async move { body().await })
            .catch_unwind()
            .await;
        guard.disarm();
        let released = self.release().await;

        match outcome {
            Err(payload) => {
                if let Err(e) = released {
                    warn!(datastore = %self.target, error = %e, "unlock failed after panic");
                }
                panic::resume_unwind(payload)
            }
            Ok(Err(e)) => {
                if let Err(release_error) = released {
                    warn!(
                        datastore = %self.target,
                        error = %release_error,
                        "unlock failed after the protected block failed"
                    );
                }
                Err(ScopeError::Body(e))
            }
            Ok(Ok(value)) => released.map(|()| value).map_err(ScopeError::Release),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_trees_are_fresh_and_well_formed() {
        let lock = datastore_operation("lock", &Datastore::candidate());
        let unlock = datastore_operation("unlock", &Datastore::running());
        assert_eq!(
            lock.to_xml().unwrap(),
            "<lock><target><candidate/></target></lock>"
        );
        assert_eq!(
            unlock.to_xml().unwrap(),
            "<unlock><target><running/></target></unlock>"
        );
        // Building one does not leak into the next.
        assert_eq!(
            datastore_operation("lock", &Datastore::running())
                .to_xml()
                .unwrap(),
            "<lock><target><running/></target></lock>"
        );
    }

    #[test]
    fn ok_reply_does_not_raise() {
        let reply = RpcReply::new(r#"<rpc-reply message-id="1"><ok/></rpc-reply>"#);
        assert!(raise_for_error(&reply).is_ok());
    }

    #[test]
    fn first_error_is_raised() {
        let reply = RpcReply::new(
            r#"<rpc-reply message-id="1">
                 <rpc-error><error-tag>lock-denied</error-tag><error-message>held by 9</error-message></rpc-error>
                 <rpc-error><error-tag>other</error-tag></rpc-error>
               </rpc-reply>"#,
        );
        match raise_for_error(&reply) {
            Err(OperationError::Rpc(e)) => {
                assert_eq!(e.tag.as_deref(), Some("lock-denied"));
                assert_eq!(e.to_string(), "lock-denied: held by 9");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn malformed_reply_is_a_reply_error() {
        let reply = RpcReply::new("<rpc-reply>");
        assert!(matches!(
            raise_for_error(&reply),
            Err(OperationError::Reply(_))
        ));
    }
}
