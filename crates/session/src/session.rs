//! The session engine.
//!
//! A [`Session`] is a cheap, clonable handle onto one NETCONF session. It
//! owns:
//!
//! - the client capability set, fixed at construction;
//! - the server capability set and session id, set together exactly once
//!   when the handshake completes;
//! - the listener registry, guarded by a single mutex;
//! - the unbounded outbound queue drained by the background worker.
//!
//! ## Lifecycle
//!
//! ```text
//! Unconnected ──connect──▶ Connected ──post_connect──▶ Handshaking ──▶ Ready
//!                                                              └──────▶ Failed
//! any state except Failed ──close / worker exit──▶ Closed
//! ```
//!
//! ## Dispatch
//!
//! Dispatch takes a snapshot of the registry and releases the lock before
//! invoking any callback, so callbacks may add or remove listeners
//! (themselves included). A failing or panicking callback is logged and the
//! remaining listeners still run.
//!
//! The outbound queue is unbounded: `send` never blocks and a stalled worker
//! accumulates memory.

use std::any::{type_name, Any};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};

use netconf::{hello, parse_root, Capabilities, SessionId};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, debug_span, error, info, warn, Instrument};

use crate::listener::HelloHandler;
use crate::{ListenerError, Outbound, SessionConfig, SessionError, SessionListener, Transport};

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Constructed; no channel yet.
    Unconnected,
    /// The transport's channel is open; the worker has not started.
    Connected,
    /// Greetings are being exchanged; the worker is running.
    Handshaking,
    /// Handshake complete; RPC traffic may flow.
    Ready,
    /// The handshake failed. Terminal.
    Failed,
    /// Closed by the caller or by the worker exiting. Terminal.
    Closed,
}

struct Registered {
    listener: Arc<dyn SessionListener>,
    handle: Arc<dyn Any + Send + Sync>,
}

struct Negotiated {
    id: SessionId,
    capabilities: Capabilities,
}

struct Inner {
    config: SessionConfig,
    client_capabilities: Capabilities,
    negotiated: OnceLock<Negotiated>,
    state: Mutex<SessionState>,
    listeners: Mutex<Vec<Registered>>,
    outbound: mpsc::UnboundedSender<String>,
    pending_outbound: Mutex<Option<mpsc::UnboundedReceiver<String>>>,
    shutdown: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

/// Handle onto one NETCONF session. Clones share the same session.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl Session {
    /// Creates an unconnected session advertising `client_capabilities`.
    pub fn new(client_capabilities: Capabilities, config: SessionConfig) -> Self {
        let (outbound, pending) = mpsc::unbounded_channel();
        debug!(client_capabilities = %client_capabilities, "session created");
        Self {
            inner: Arc::new(Inner {
                config,
                client_capabilities,
                negotiated: OnceLock::new(),
                state: Mutex::new(SessionState::Unconnected),
                listeners: Mutex::new(Vec::new()),
                outbound,
                pending_outbound: Mutex::new(Some(pending)),
                shutdown: CancellationToken::new(),
                worker: Mutex::new(None),
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn state(&self) -> SessionState {
        *self.inner.state.lock()
    }

    /// `true` while the channel is open: connected, handshaking, or ready.
    pub fn connected(&self) -> bool {
        matches!(
            self.state(),
            SessionState::Connected | SessionState::Handshaking | SessionState::Ready
        )
    }

    pub fn client_capabilities(&self) -> &Capabilities {
        &self.inner.client_capabilities
    }

    /// Capabilities the server advertised; `None` until the handshake completes.
    pub fn server_capabilities(&self) -> Option<&Capabilities> {
        self.inner.negotiated.get().map(|n| &n.capabilities)
    }

    /// Server-assigned session id; `None` until the handshake completes.
    pub fn id(&self) -> Option<&SessionId> {
        self.inner.negotiated.get().map(|n| &n.id)
    }

    // -----------------------------------------------------------------------
    // Listener registry
    // -----------------------------------------------------------------------

    /// Registers `listener`. Registering the same handle again is a no-op.
    pub fn add_listener<L: SessionListener>(&self, listener: Arc<L>) {
        let mut listeners = self.inner.listeners.lock();
        if listeners.iter().any(|r| is_same(&r.handle, &listener)) {
            return;
        }
        debug!(listener = type_name::<L>(), "installing listener");
        let handle: Arc<dyn Any + Send + Sync> = listener.clone();
        listeners.push(Registered { listener, handle });
    }

    /// Unregisters `listener`. Returns `false` if it was not registered.
    pub fn remove_listener<L: SessionListener>(&self, listener: &Arc<L>) -> bool {
        let mut listeners = self.inner.listeners.lock();
        let before = listeners.len();
        listeners.retain(|r| !is_same(&r.handle, listener));
        let removed = listeners.len() != before;
        if removed {
            debug!(listener = type_name::<L>(), "discarded listener");
        }
        removed
    }

    /// The first registered listener of type `L`, registering `make()` if
    /// there is none.
    ///
    /// Lookup and registration happen under one lock, so concurrent callers
    /// all receive the same instance.
    pub fn get_or_add_listener<L, F>(&self, make: F) -> Arc<L>
    where
        L: SessionListener,
        F: FnOnce() -> Arc<L>,
    {
        let mut listeners = self.inner.listeners.lock();
        if let Some(existing) = listeners
            .iter()
            .find_map(|r| Arc::clone(&r.handle).downcast::<L>().ok())
        {
            return existing;
        }
        let listener = make();
        debug!(listener = type_name::<L>(), "installing listener");
        let handle: Arc<dyn Any + Send + Sync> = listener.clone();
        listeners.push(Registered {
            listener: Arc::clone(&listener) as Arc<dyn SessionListener>,
            handle,
        });
        listener
    }

    /// First registered listener of type `L`, if any.
    ///
    /// Lets callers keep a single instance of a listener type per session.
    /// The registry does not enforce that; it is a convention between
    /// callers.
    pub fn get_listener_instance<L: SessionListener>(&self) -> Option<Arc<L>> {
        self.inner
            .listeners
            .lock()
            .iter()
            .find_map(|r| Arc::clone(&r.handle).downcast::<L>().ok())
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }

    fn snapshot(&self) -> Vec<Arc<dyn SessionListener>> {
        self.inner
            .listeners
            .lock()
            .iter()
            .map(|r| Arc::clone(&r.listener))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Sending and dispatch
    // -----------------------------------------------------------------------

    /// Queues a serialized document for the worker to write.
    ///
    /// Never blocks and gives no delivery confirmation. Fails with
    /// [`SessionError::Closed`] once the session is closed.
    pub fn send(&self, document: impl Into<String>) -> Result<(), SessionError> {
        if self.inner.shutdown.is_cancelled() {
            return Err(SessionError::Closed);
        }
        let document = document.into();
        debug!(bytes = document.len(), "queueing document");
        self.inner
            .outbound
            .send(document)
            .map_err(|_| SessionError::Closed)
    }

    /// Hands an inbound document to every registered listener.
    ///
    /// Only the root element is parsed here. A document whose root cannot be
    /// read is logged and dropped.
    pub fn dispatch_message(&self, raw: &str) {
        let root = match parse_root(raw) {
            Ok(root) => root,
            Err(e) => {
                error!(error = %e, "dropping malformed inbound document");
                return;
            }
        };
        for listener in self.snapshot() {
            debug!(root = %root.qualified_name(), "dispatching message");
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| listener.callback(&root, raw)));
            report(outcome, "callback");
        }
    }

    /// Hands `error` to every registered listener.
    pub fn dispatch_error(&self, error: &SessionError) {
        for listener in self.snapshot() {
            debug!(error = %error, "dispatching error");
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| listener.errback(error)));
            report(outcome, "errback");
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Opens `transport`, then performs the handshake via
    /// [`post_connect`](Self::post_connect).
    pub async fn connect<T: Transport>(&self, mut transport: T) -> Result<(), SessionError> {
        if self.inner.shutdown.is_cancelled() {
            return Err(SessionError::Closed);
        }
        if self.state() != SessionState::Unconnected {
            return Err(SessionError::AlreadyStarted);
        }
        transport.connect().await?;
        self.set_state(SessionState::Connected);
        debug!("transport connected");
        self.post_connect(Box::new(transport)).await
    }

    /// Exchanges greetings over an already connected transport and starts
    /// the worker.
    ///
    /// Only valid in [`SessionState::Connected`]; any other state fails with
    /// [`SessionError::AlreadyStarted`] (or [`SessionError::Closed`] after
    /// shutdown) and leaves the session untouched.
    ///
    /// Returns once the server's `<hello>` has been processed, an error was
    /// reported, or the handshake timeout elapsed. On failure the worker is
    /// shut down and the session is [`SessionState::Failed`].
    pub async fn post_connect(&self, transport: Box<dyn Transport>) -> Result<(), SessionError> {
        self.begin_handshake()?;
        let (handler, signal) = HelloHandler::new();
        let handler = Arc::new(handler);
        self.add_listener(Arc::clone(&handler));
        let outcome = self.exchange_greetings(transport, signal).await;
        self.remove_listener(&handler);

        match outcome {
            Ok(negotiated) => {
                info!(
                    session_id = %negotiated.id,
                    server_capabilities = %negotiated.capabilities,
                    "session ready"
                );
                if self.inner.negotiated.set(negotiated).is_err() {
                    return Err(SessionError::AlreadyStarted);
                }
                self.set_state(SessionState::Ready);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "handshake failed");
                self.set_state(SessionState::Failed);
                self.inner.shutdown.cancel();
                Err(e)
            }
        }
    }

    async fn exchange_greetings(
        &self,
        transport: Box<dyn Transport>,
        signal: oneshot::Receiver<Result<netconf::Hello, SessionError>>,
    ) -> Result<Negotiated, SessionError> {
        self.send(hello::build(&self.inner.client_capabilities)?)?;
        self.start(transport)?;

        let timeout = self.inner.config.handshake_timeout();
        let hello = match tokio::time::timeout(timeout, signal).await {
            Ok(Ok(outcome)) => outcome?,
            Ok(Err(_)) => return Err(SessionError::handshake("greeting listener dropped")),
            Err(_) => return Err(SessionError::HandshakeTimeout { timeout }),
        };
        let id = hello
            .session_id
            .ok_or_else(|| SessionError::handshake("server greeting carried no session-id"))?;
        Ok(Negotiated {
            id,
            capabilities: hello.capabilities,
        })
    }

    /// Moves `Connected` to `Handshaking` atomically.
    fn begin_handshake(&self) -> Result<(), SessionError> {
        if self.inner.shutdown.is_cancelled() {
            return Err(SessionError::Closed);
        }
        let mut state = self.inner.state.lock();
        if *state != SessionState::Connected {
            return Err(SessionError::AlreadyStarted);
        }
        debug!(from = ?*state, to = ?SessionState::Handshaking, "session state change");
        *state = SessionState::Handshaking;
        Ok(())
    }

    fn start(&self, transport: Box<dyn Transport>) -> Result<(), SessionError> {
        let queue = self
            .inner
            .pending_outbound
            .lock()
            .take()
            .ok_or(SessionError::AlreadyStarted)?;
        let outbound = Outbound::new(queue, self.inner.shutdown.clone());
        let session = self.clone();
        debug!("starting session worker");
        let handle = tokio::spawn(
            async move {
                let result = transport.run(outbound, session.clone()).await;
                session.worker_exited(result);
            }
            .instrument(debug_span!("netconf_session_worker")),
        );
        *self.inner.worker.lock() = Some(handle);
        Ok(())
    }

    fn worker_exited(&self, result: Result<(), crate::TransportError>) {
        let error = match result {
            Ok(()) => {
                debug!("session worker finished");
                SessionError::Closed
            }
            Err(e) => {
                warn!(error = %e, "session worker failed");
                SessionError::Transport(e)
            }
        };
        {
            let mut state = self.inner.state.lock();
            if *state != SessionState::Failed {
                *state = SessionState::Closed;
            }
        }
        self.inner.shutdown.cancel();
        self.dispatch_error(&error);
    }

    /// Shuts the worker down and waits for it to exit.
    ///
    /// Documents still queued are discarded. Listeners receive
    /// [`SessionError::Closed`] through their error callback.
    pub async fn close(&self) {
        self.inner.shutdown.cancel();
        let worker = self.inner.worker.lock().take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                warn!(error = %e, "session worker did not exit cleanly");
            }
        }
        let mut state = self.inner.state.lock();
        if *state != SessionState::Failed {
            *state = SessionState::Closed;
        }
    }

    fn set_state(&self, state: SessionState) {
        let mut current = self.inner.state.lock();
        debug!(from = ?*current, to = ?state, "session state change");
        *current = state;
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state())
            .field("id", &self.id())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

fn is_same<L>(handle: &Arc<dyn Any + Send + Sync>, listener: &Arc<L>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(handle) as *const (),
        Arc::as_ptr(listener) as *const (),
    )
}

fn report(outcome: std::thread::Result<Result<(), ListenerError>>, kind: &'static str) {
    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, kind, "listener failed"),
        Err(_) => warn!(kind, "listener panicked"),
    }
}
