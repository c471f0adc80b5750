// tests/integration_test.rs

//! End-to-end runs through the server dispatch path: serialized RPCs in,
//! serialized rpc-replies out, with the datastores, the edit engine, and
//! the lock table underneath.

mod common;

use common::test_datastores;
use ofcd::server::comm::dispatch_rpc;
use ofcd::server::sessions::SessionTable;
use parking_lot::Mutex;
use std::sync::Arc;

const NC: &str = "xmlns=\"urn:ietf:params:xml:ns:netconf:base:1.0\"";

struct Harness {
    datastores: Arc<tokio::sync::Mutex<ofcd::core::datastore::Datastores>>,
    sessions: Arc<Mutex<SessionTable>>,
    _dir: tempfile::TempDir,
}

impl Harness {
    fn new() -> Self {
        let (ds, _db, _of, dir) = test_datastores();
        let harness = Self {
            datastores: Arc::new(tokio::sync::Mutex::new(ds)),
            sessions: Arc::new(Mutex::new(SessionTable::default())),
            _dir: dir,
        };
        harness
            .sessions
            .lock()
            .register(1, "s1".into(), "alice".into(), 100, vec![]);
        harness
            .sessions
            .lock()
            .register(2, "s2".into(), "bob".into(), 101, vec![]);
        harness
    }

    async fn rpc(&self, agent: u64, body: &str) -> String {
        let rpc = format!("<rpc message-id=\"1\" {NC}>{body}</rpc>");
        dispatch_rpc(&rpc, agent, &self.datastores, &self.sessions).await
    }
}

/// S1 through the wire format: lock, denied edit, denied unlock, release.
#[tokio::test]
async fn test_lock_lifecycle() {
    let h = Harness::new();

    let reply = h.rpc(1, "<lock><target><running/></target></lock>").await;
    assert!(reply.contains("<ok/>"));

    let edit = "<edit-config><target><running/></target><config>\
                <capable-switch xmlns=\"urn:onf:config:yang\"><id>x</id></capable-switch>\
                </config></edit-config>";
    let denied = h.rpc(2, edit).await;
    assert!(denied.contains("<error-tag>lock-denied</error-tag>"));
    assert!(denied.contains("<session-id>s1</session-id>"));

    let denied = h.rpc(2, "<unlock><target><running/></target></unlock>").await;
    assert!(denied.contains("<error-tag>lock-denied</error-tag>"));

    let ok = h.rpc(1, "<unlock><target><running/></target></unlock>").await;
    assert!(ok.contains("<ok/>"));

    let ok = h.rpc(2, edit).await;
    assert!(ok.contains("<ok/>"));
}

/// Configuration flows in through edit-config and back out through
/// get-config on a different session.
#[tokio::test]
async fn test_edit_then_read_back() {
    let h = Harness::new();

    let edit = "<edit-config><target><running/></target><config>\
                <capable-switch xmlns=\"urn:onf:config:yang\" \
                 xmlns:nc=\"urn:ietf:params:xml:ns:netconf:base:1.0\" nc:operation=\"create\">\
                <id>sw1</id>\
                <resources><port><name>eth0</name></port></resources>\
                </capable-switch></config></edit-config>";
    let reply = h.rpc(1, edit).await;
    assert!(reply.contains("<ok/>"), "unexpected reply: {reply}");

    let read = h
        .rpc(2, "<get-config><source><running/></source></get-config>")
        .await;
    assert!(read.contains("<data>"));
    assert!(read.contains("<id>sw1</id>"));
    assert!(read.contains("<name>eth0</name>"));

    let state = h.rpc(2, "<get/>").await;
    assert!(state.contains("<config-version>1.2</config-version>"));
}

/// copy-config and delete-config drive the same pipeline as edit-config.
#[tokio::test]
async fn test_copy_and_delete_config() {
    let h = Harness::new();

    let copy = "<copy-config><target><candidate/></target><source><config>\
                <capable-switch xmlns=\"urn:onf:config:yang\"><id>cand</id>\
                <resources/><logical-switches/></capable-switch>\
                </config></source></copy-config>";
    assert!(h.rpc(1, copy).await.contains("<ok/>"));

    let promote = "<copy-config><target><running/></target>\
                   <source><candidate/></source></copy-config>";
    assert!(h.rpc(1, promote).await.contains("<ok/>"));

    let read = h
        .rpc(2, "<get-config><source><running/></source></get-config>")
        .await;
    assert!(read.contains("<id>cand</id>"));

    assert!(
        h.rpc(1, "<delete-config><target><running/></target></delete-config>")
            .await
            .contains("<ok/>")
    );
    let read = h
        .rpc(2, "<get-config><source><running/></source></get-config>")
        .await;
    assert!(read.contains("<data></data>") || read.contains("<data/>"));
}
