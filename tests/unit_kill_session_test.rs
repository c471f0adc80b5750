// tests/unit_kill_session_test.rs

mod common;

use common::test_datastores;
use ofcd::server::comm::dispatch_rpc;
use ofcd::server::sessions::SessionTable;
use parking_lot::Mutex;
use std::sync::Arc;

const NC: &str = "xmlns=\"urn:ietf:params:xml:ns:netconf:base:1.0\"";

fn setup() -> (
    Arc<tokio::sync::Mutex<ofcd::core::datastore::Datastores>>,
    Arc<Mutex<SessionTable>>,
    tempfile::TempDir,
) {
    let (ds, _db, _of, dir) = test_datastores();
    let datastores = Arc::new(tokio::sync::Mutex::new(ds));
    let sessions = Arc::new(Mutex::new(SessionTable::default()));
    (datastores, sessions, dir)
}

/// S6: a session asking to kill itself is refused and stays registered.
#[tokio::test]
async fn test_kill_own_session_is_refused() {
    let (datastores, sessions, _dir) = setup();
    sessions
        .lock()
        .register(1, "s1".into(), "admin".into(), 100, vec![]);

    let rpc = format!(
        "<rpc message-id=\"10\" {NC}><kill-session><session-id>s1</session-id></kill-session></rpc>"
    );
    let reply = dispatch_rpc(&rpc, 1, &datastores, &sessions).await;

    assert!(reply.contains("<error-tag>operation-failed</error-tag>"));
    assert!(reply.contains("killing own session requested"));
    assert!(sessions.lock().by_ncsid("s1").is_some());
}

#[tokio::test]
async fn test_kill_unknown_session_is_an_error() {
    let (datastores, sessions, _dir) = setup();
    sessions
        .lock()
        .register(1, "s1".into(), "admin".into(), 100, vec![]);

    let rpc = format!(
        "<rpc message-id=\"11\" {NC}><kill-session><session-id>nope</session-id></kill-session></rpc>"
    );
    let reply = dispatch_rpc(&rpc, 1, &datastores, &sessions).await;
    assert!(reply.contains("<error-tag>operation-failed</error-tag>"));
    assert!(reply.contains("does not exist"));
}

/// An RPC from an agent that never registered its session is turned away.
#[tokio::test]
async fn test_unknown_agent_is_refused() {
    let (datastores, sessions, _dir) = setup();
    let rpc = format!("<rpc message-id=\"12\" {NC}><get-config><source><running/></source></get-config></rpc>");
    let reply = dispatch_rpc(&rpc, 42, &datastores, &sessions).await;
    assert!(reply.contains("request from unknown agent"));
}

/// A second create-subscription on one session fails; without the
/// capability it is not supported at all.
#[tokio::test]
async fn test_subscription_rules() {
    let (datastores, sessions, _dir) = setup();
    sessions.lock().register(
        1,
        "s1".into(),
        "admin".into(),
        100,
        vec!["urn:ietf:params:netconf:capability:notification:1.0".into()],
    );
    sessions
        .lock()
        .register(2, "s2".into(), "admin".into(), 101, vec![]);

    let rpc = format!("<rpc message-id=\"13\" {NC}><create-subscription/></rpc>");
    let ok = dispatch_rpc(&rpc, 1, &datastores, &sessions).await;
    assert!(ok.contains("<ok/>"));

    let again = dispatch_rpc(&rpc, 1, &datastores, &sessions).await;
    assert!(again.contains("<error-tag>operation-failed</error-tag>"));

    let unsupported = dispatch_rpc(&rpc, 2, &datastores, &sessions).await;
    assert!(unsupported.contains("<error-tag>operation-not-supported</error-tag>"));
}
