// tests/common/mod.rs

//! Shared fixtures for the test suite.

// not every test binary uses every fixture
#![allow(dead_code)]

use ofcd::core::datastore::Datastores;
use ofcd::core::edit::WithDefaults;
use ofcd::core::errors::OfcError;
use ofcd::core::openflow::{PortBit, PortMutator};
use ofcd::core::ovsdb::OvsdbClient;
use std::sync::Arc;
use std::sync::Mutex;
use tempfile::TempDir;

/// A port mutator that records every dispatch instead of opening a
/// management channel.
#[derive(Debug, Default)]
pub struct RecordingMutator {
    pub calls: Mutex<Vec<(Option<String>, String, PortBit, Option<String>)>>,
}

impl PortMutator for RecordingMutator {
    fn set_port_bit(
        &self,
        bridge: Option<&str>,
        port: &str,
        bit: PortBit,
        value: Option<&str>,
    ) -> Result<(), OfcError> {
        self.calls.lock().unwrap().push((
            bridge.map(str::to_string),
            port.to_string(),
            bit,
            value.map(str::to_string),
        ));
        Ok(())
    }
}

/// Datastores over a fresh in-process replica and a recording port
/// mutator, with a throwaway data directory.
pub fn test_datastores() -> (Datastores, Arc<OvsdbClient>, Arc<RecordingMutator>, TempDir) {
    let dir = TempDir::new().expect("tempdir");
    let db = OvsdbClient::connect("unix:/tmp/test-ovsdb.sock").expect("replica");
    let of = Arc::new(RecordingMutator::default());
    let ds = Datastores::init(db.clone(), of.clone(), dir.path(), WithDefaults::ReportAll)
        .expect("datastores");
    (ds, db, of, dir)
}

/// The namespace declarations every edit payload carries.
pub const EDIT_NS: &str =
    "xmlns=\"urn:onf:config:yang\" xmlns:nc=\"urn:ietf:params:xml:ns:netconf:base:1.0\"";
