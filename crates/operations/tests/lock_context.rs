//! Operations against a scripted server over the loopback transport.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use netconf::{Capabilities, Datastore, Element, NETCONF_NS};
use operations::{Lock, LockContext, OperationError, ReplyRouter, Rpc, ScopeError};
use session::loopback::{self, Peer};
use session::{Session, SessionConfig};
use tokio::sync::mpsc;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// How the scripted server answers one operation.
#[derive(Clone, Copy)]
enum Answer {
    Ok,
    Error(&'static str),
    Silent,
    HangUp,
}

fn server_hello() -> String {
    format!(
        "<hello xmlns=\"{NETCONF_NS}\"><capabilities>\
         <capability>urn:ietf:params:netconf:base:1.0</capability>\
         <capability>urn:ietf:params:netconf:capability:candidate:1.0</capability>\
         </capabilities><session-id>42</session-id></hello>"
    )
}

fn reply(message_id: &str, answer: Answer) -> Option<String> {
    let body = match answer {
        Answer::Ok => "<ok/>".to_owned(),
        Answer::Error(tag) => format!(
            "<rpc-error><error-type>protocol</error-type><error-tag>{tag}</error-tag>\
             <error-severity>error</error-severity><error-message>refused</error-message></rpc-error>"
        ),
        Answer::Silent | Answer::HangUp => return None,
    };
    Some(format!(
        "<rpc-reply xmlns=\"{NETCONF_NS}\" message-id=\"{message_id}\">{body}</rpc-reply>"
    ))
}

/// Greets, then answers each `<rpc>` according to `policy`. Every operation
/// name received is reported on the returned channel.
fn spawn_server(
    mut peer: Peer,
    policy: impl Fn(&str) -> Answer + Send + 'static,
) -> mpsc::UnboundedReceiver<String> {
    let (seen_tx, seen_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let _client_hello = peer.recv().await;
        peer.send(server_hello()).unwrap();
        while let Some(document) = peer.recv().await {
            let rpc = Element::parse(&document).unwrap();
            assert_eq!(rpc.name(), "rpc");
            assert_eq!(rpc.namespace(), Some(NETCONF_NS));
            let message_id = rpc.attribute("message-id").unwrap().to_owned();
            let operation = rpc.children()[0].name().to_owned();
            let answer = policy(&operation);
            let _ = seen_tx.send(operation);
            if matches!(answer, Answer::HangUp) {
                break;
            }
            if let Some(reply) = reply(&message_id, answer) {
                let _ = peer.send(reply);
            }
        }
    });
    seen_rx
}

async fn ready_session(
    policy: impl Fn(&str) -> Answer + Send + 'static,
) -> (Session, mpsc::UnboundedReceiver<String>) {
    init_tracing();
    let (transport, peer) = loopback::pair();
    let seen = spawn_server(peer, policy);
    let session = Session::new(Capabilities::client_default(), SessionConfig::default());
    session.connect(transport).await.unwrap();
    (session, seen)
}

fn drain(seen: &mut mpsc::UnboundedReceiver<String>) -> Vec<String> {
    let mut operations = Vec::new();
    while let Ok(operation) = seen.try_recv() {
        operations.push(operation);
    }
    operations
}

#[tokio::test]
async fn lock_reply_is_returned_for_inspection() {
    let (session, _seen) = ready_session(|op| match op {
        "lock" => Answer::Error("lock-denied"),
        _ => Answer::Ok,
    })
    .await;

    let reply = Lock::new(session.clone())
        .request(&Datastore::running())
        .await
        .unwrap();
    assert!(!reply.ok().unwrap());
    let error = reply.error().unwrap().unwrap();
    assert_eq!(error.tag.as_deref(), Some("lock-denied"));
    assert_eq!(error.get("error-type"), Some("protocol"));
    session.close().await;
}

#[tokio::test]
async fn scope_locks_runs_and_unlocks() {
    let (session, mut seen) = ready_session(|_| Answer::Ok).await;
    let context = LockContext::new(session.clone(), Datastore::candidate());

    let value = context
        .scope(|| async { Ok::<_, OperationError>(7) })
        .await
        .unwrap();
    assert_eq!(value, 7);
    assert_eq!(drain(&mut seen), ["lock", "unlock"]);
    session.close().await;
}

#[tokio::test]
async fn refused_lock_skips_the_body() {
    let (session, mut seen) = ready_session(|op| match op {
        "lock" => Answer::Error("lock-denied"),
        _ => Answer::Ok,
    })
    .await;
    let context = LockContext::new(session.clone(), Datastore::running());

    let ran = &AtomicBool::new(false);
    let err = context
        .scope(move || async move {
            ran.store(true, Ordering::SeqCst);
            Ok::<_, OperationError>(())
        })
        .await
        .unwrap_err();
    assert!(!ran.load(Ordering::SeqCst));
    match err {
        ScopeError::Acquire(OperationError::Rpc(e)) => {
            assert_eq!(e.tag.as_deref(), Some("lock-denied"))
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(drain(&mut seen), ["lock"]);
    session.close().await;
}

#[tokio::test]
async fn failing_body_still_unlocks_once() {
    let (session, mut seen) = ready_session(|_| Answer::Ok).await;
    let context = LockContext::new(session.clone(), Datastore::running());

    let err = context
        .scope(|| async { Err::<(), _>("edit rejected") })
        .await
        .unwrap_err();
    assert!(matches!(err, ScopeError::Body("edit rejected")));
    assert_eq!(drain(&mut seen), ["lock", "unlock"]);
    session.close().await;
}

#[tokio::test]
async fn body_error_wins_over_release_error() {
    let (session, mut seen) = ready_session(|op| match op {
        "unlock" => Answer::Error("operation-failed"),
        _ => Answer::Ok,
    })
    .await;
    let context = LockContext::new(session.clone(), Datastore::running());

    let err = context
        .scope(|| async { Err::<(), _>("edit rejected") })
        .await
        .unwrap_err();
    assert!(matches!(err, ScopeError::Body("edit rejected")));
    assert_eq!(drain(&mut seen), ["lock", "unlock"]);
    session.close().await;
}

#[tokio::test]
async fn release_error_surfaces_after_successful_body() {
    let (session, _seen) = ready_session(|op| match op {
        "unlock" => Answer::Error("operation-failed"),
        _ => Answer::Ok,
    })
    .await;
    let context = LockContext::new(session.clone(), Datastore::running());

    let err = context
        .scope(|| async { Ok::<_, OperationError>(()) })
        .await
        .unwrap_err();
    assert!(matches!(err, ScopeError::Release(OperationError::Rpc(_))));
    session.close().await;
}

#[tokio::test]
async fn panicking_body_unlocks_before_unwinding() {
    let (session, mut seen) = ready_session(|_| Answer::Ok).await;
    let context = LockContext::new(session.clone(), Datastore::running());

    let task = tokio::spawn(async move {
        context
            .scope(|| async {
                if true {
                    panic!("body exploded");
                }
                Ok::<_, OperationError>(())
            })
            .await
    });
    let joined = task.await.unwrap_err();
    assert!(joined.is_panic());
    assert_eq!(drain(&mut seen), ["lock", "unlock"]);
    session.close().await;
}

#[tokio::test]
async fn cancelled_scope_still_unlocks() {
    let (session, mut seen) = ready_session(|_| Answer::Ok).await;
    let context = LockContext::new(session.clone(), Datastore::running());

    let outcome = tokio::time::timeout(
        Duration::from_millis(200),
        context.scope(|| async {
            std::future::pending::<()>().await;
            Ok::<_, OperationError>(())
        }),
    )
    .await;
    assert!(outcome.is_err(), "body never finishes");
    assert_eq!(seen.recv().await.as_deref(), Some("lock"));
    assert_eq!(seen.recv().await.as_deref(), Some("unlock"));
    session.close().await;
}

#[tokio::test]
async fn concurrent_requests_get_their_own_replies() {
    init_tracing();
    let (transport, mut peer) = loopback::pair();
    let server = tokio::spawn(async move {
        let _ = peer.recv().await;
        peer.send(server_hello()).unwrap();
        let mut requests = Vec::new();
        for _ in 0..2 {
            let rpc = Element::parse(&peer.recv().await.unwrap()).unwrap();
            let id = rpc.attribute("message-id").unwrap().to_owned();
            let which = rpc.children()[0].name().to_owned();
            requests.push((id, which));
        }
        // Answer in reverse order, echoing the operation name.
        for (id, which) in requests.into_iter().rev() {
            peer.send(format!(
                "<rpc-reply xmlns=\"{NETCONF_NS}\" message-id=\"{id}\"><data><{which}/></data></rpc-reply>"
            ))
            .unwrap();
        }
        peer
    });

    let session = Session::new(Capabilities::client_default(), SessionConfig::default());
    session.connect(transport).await.unwrap();
    let rpc = Rpc::new(session.clone());

    let (first, second) = tokio::join!(
        rpc.request(Element::new("get-first")),
        rpc.request(Element::new("get-second")),
    );
    assert!(first.unwrap().xml().contains("<get-first/>"));
    assert!(second.unwrap().xml().contains("<get-second/>"));
    assert_eq!(ReplyRouter::for_session(&session).pending_count(), 0);

    let _peer = server.await.unwrap();
    session.close().await;
}

#[tokio::test]
async fn silent_server_times_out() {
    let (session, _seen) = ready_session(|_| Answer::Silent).await;
    let rpc = Rpc::new(session.clone()).with_timeout(Duration::from_millis(50));

    let err = rpc.request(Element::new("get")).await.unwrap_err();
    assert!(matches!(err, OperationError::ReplyTimeout { .. }), "{err}");
    assert_eq!(ReplyRouter::for_session(&session).pending_count(), 0);
    session.close().await;
}

#[tokio::test]
async fn disconnect_fails_pending_requests() {
    let (session, _seen) = ready_session(|_| Answer::HangUp).await;
    let rpc = Rpc::new(session.clone());

    let err = rpc.request(Element::new("get")).await.unwrap_err();
    assert!(matches!(err, OperationError::SessionFailure { .. }), "{err}");
    assert!(!session.connected());
}

#[tokio::test]
async fn capability_checks_use_the_negotiated_set() {
    let (session, _seen) = ready_session(|_| Answer::Ok).await;
    let rpc = Rpc::new(session.clone());
    assert!(rpc.assert_capability(":candidate").is_ok());
    assert!(matches!(
        rpc.assert_capability(":xpath"),
        Err(OperationError::MissingCapability { .. })
    ));
    session.close().await;
}
