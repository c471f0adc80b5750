// tests/unit_datastore_test.rs

mod common;

use common::{EDIT_NS, test_datastores};
use ofcd::core::datastore::{CopySource, Datastores, locks::Datastore};
use ofcd::core::edit::{DefaultOperation, WithDefaults};
use ofcd::core::openflow::PortMutator;
use std::sync::Arc;

fn populate(ds: &mut Datastores) {
    let edit = format!(
        "<capable-switch {EDIT_NS} nc:operation=\"create\"><id>sw1</id>\
         <resources>\
         <port><name>eth0</name><requested-number>2</requested-number></port>\
         </resources>\
         <logical-switches><switch><id>br0</id>\
         <datapath-id>00:01:02:03:04:05:06:07</datapath-id>\
         <controllers><controller><id>c1</id><ip-address>192.0.2.1</ip-address>\
         <port>6633</port><protocol>tcp</protocol></controller></controllers>\
         <resources><port>eth0</port></resources>\
         </switch></logical-switches></capable-switch>"
    );
    ds.edit_config(
        Datastore::Running,
        &edit,
        DefaultOperation::Merge,
        Default::default(),
        "s1",
    )
    .unwrap();
}

/// Invariant: get-config, copied through candidate and back into running,
/// reproduces itself.
#[test]
fn test_get_apply_round_trip() {
    let (mut ds, _db, _of, _dir) = test_datastores();
    populate(&mut ds);

    let cfg = ds.get_config(Datastore::Running).unwrap();
    assert!(cfg.contains("<id>sw1</id>"));

    ds.copy_config(Datastore::Candidate, CopySource::Config(cfg.clone()), "s1")
        .unwrap();
    ds.copy_config(
        Datastore::Running,
        CopySource::Datastore(Datastore::Candidate),
        "s1",
    )
    .unwrap();

    assert_eq!(ds.get_config(Datastore::Running).unwrap(), cfg);
}

#[test]
fn test_delete_config_running_clears_everything() {
    let (mut ds, db, _of, _dir) = test_datastores();
    populate(&mut ds);
    assert!(!db.snapshot().is_empty());

    ds.delete_config(Datastore::Running, "s1").unwrap();
    assert!(db.snapshot().is_empty());
    assert!(ds.get_config(Datastore::Running).unwrap().is_empty());
    assert!(ds.switch_id().is_none());
}

#[test]
fn test_copy_config_same_source_and_target_is_refused() {
    let (mut ds, _db, _of, _dir) = test_datastores();
    let err = ds
        .copy_config(
            Datastore::Candidate,
            CopySource::Datastore(Datastore::Candidate),
            "s1",
        )
        .unwrap_err();
    assert!(matches!(err, ofcd::core::errors::OfcError::BadElement(_)));
}

/// The startup datastore survives a restart through its persistent file.
#[test]
fn test_startup_persists_across_free_and_init() {
    let (mut ds, db, _of, dir) = test_datastores();
    let doc = format!(
        "<capable-switch {EDIT_NS}><id>persisted</id>\
         <resources/><logical-switches/></capable-switch>"
    );
    ds.copy_config(Datastore::Startup, CopySource::Config(doc), "s1")
        .unwrap();
    ds.free();

    let of: Arc<dyn PortMutator> = Arc::new(common::RecordingMutator::default());
    let ds2 = Datastores::init(db, of, dir.path(), WithDefaults::ReportAll).unwrap();
    let startup = ds2.get_config(Datastore::Startup).unwrap();
    assert!(startup.contains("<id>persisted</id>"));
}

#[test]
fn test_delete_config_startup_forgets_the_document() {
    let (mut ds, _db, _of, _dir) = test_datastores();
    let doc = format!("<capable-switch {EDIT_NS}><id>x</id></capable-switch>");
    ds.copy_config(Datastore::Startup, CopySource::Config(doc), "s1")
        .unwrap();
    ds.delete_config(Datastore::Startup, "s1").unwrap();
    assert!(ds.get_config(Datastore::Startup).unwrap().is_empty());
}

/// `<get>` merges operational state into the configuration: the state-only
/// leaves appear alongside config, under one document.
#[test]
fn test_get_merges_state_and_config() {
    let (mut ds, _db, _of, _dir) = test_datastores();
    populate(&mut ds);

    let data = ds.get().unwrap();
    assert_eq!(data.matches("<capable-switch").count(), 1);
    assert!(data.contains("<config-version>1.2</config-version>"));
    // state constants of the bridge
    assert!(data.contains("<max-buffered-packets>256</max-buffered-packets>"));
    assert!(data.contains("<max-ports>255</max-ports>"));
    // configuration of the same bridge, merged under the same switch entry
    assert_eq!(data.matches("<id>br0</id>").count(), 1);
    assert!(data.contains("<datapath-id>00:01:02:03:04:05:06:07</datapath-id>"));
}
