// tests/unit_portbit_test.rs

mod common;

use common::{EDIT_NS, test_datastores};
use ofcd::core::datastore::locks::Datastore;
use ofcd::core::edit::DefaultOperation;
use ofcd::core::openflow::PortBit;

/// S5: a port configuration bit travels over the OpenFlow management
/// channel exactly once, and the database is left alone.
#[test]
fn test_port_bit_dispatches_to_the_mutator() {
    let (mut ds, db, of, _dir) = test_datastores();

    // a bridge owning eth1, so the mutator can be pointed at it
    let seed = format!(
        "<capable-switch {EDIT_NS} nc:operation=\"create\">\
         <resources><port><name>eth1</name></port></resources>\
         <logical-switches><switch><id>br0</id>\
         <resources><port>eth1</port></resources>\
         </switch></logical-switches></capable-switch>"
    );
    ds.edit_config(
        Datastore::Running,
        &seed,
        DefaultOperation::Merge,
        Default::default(),
        "s1",
    )
    .unwrap();
    of.calls.lock().unwrap().clear();
    let before_cfg = ds.get_config(Datastore::Running).unwrap();

    let edit = format!(
        "<capable-switch {EDIT_NS}><resources><port><name>eth1</name>\
         <configuration nc:operation=\"create\">\
         <no-forward>true</no-forward></configuration>\
         </port></resources></capable-switch>"
    );
    ds.edit_config(
        Datastore::Running,
        &edit,
        DefaultOperation::Merge,
        Default::default(),
        "s1",
    )
    .unwrap();

    let calls = of.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    let (bridge, port, bit, value) = &calls[0];
    assert_eq!(bridge.as_deref(), Some("br0"));
    assert_eq!(port, "eth1");
    assert_eq!(*bit, PortBit::NoForward);
    assert_eq!(value.as_deref(), Some("true"));

    // the bit never touched the database
    drop(calls);
    assert_eq!(ds.get_config(Datastore::Running).unwrap(), before_cfg);
    assert!(db.snapshot().interface_by_name("eth1").is_some());
}

/// Deleting a bit leaf resets it: the mutator is called with no value.
#[test]
fn test_port_bit_delete_resets_to_default() {
    let (mut ds, _db, of, _dir) = test_datastores();
    let seed = format!(
        "<capable-switch {EDIT_NS} nc:operation=\"create\">\
         <resources><port><name>eth1</name></port></resources>\
         <logical-switches><switch><id>br0</id>\
         <resources><port>eth1</port></resources>\
         </switch></logical-switches></capable-switch>"
    );
    ds.edit_config(
        Datastore::Running,
        &seed,
        DefaultOperation::Merge,
        Default::default(),
        "s1",
    )
    .unwrap();
    of.calls.lock().unwrap().clear();

    // admin-state up is the schema default, so the delete is relieved by
    // the pre-check unless the leaf value differs
    let edit = format!(
        "<capable-switch {EDIT_NS}><resources><port><name>eth1</name>\
         <configuration><admin-state nc:operation=\"delete\">up</admin-state></configuration>\
         </port></resources></capable-switch>"
    );
    ds.edit_config(
        Datastore::Running,
        &edit,
        DefaultOperation::Merge,
        Default::default(),
        "s1",
    )
    .unwrap();
    // relieved: nothing reached the mutator
    assert!(of.calls.lock().unwrap().is_empty());
}

#[test]
fn test_bit_value_parsing() {
    assert!(!PortBit::NoReceive.raised(None).unwrap());
    assert!(PortBit::NoReceive.raised(Some("true")).unwrap());
    assert!(!PortBit::AdminState.raised(Some("up")).unwrap());
    assert!(PortBit::AdminState.raised(Some("down")).unwrap());
    assert!(PortBit::AdminState.raised(None).is_ok());
    assert!(PortBit::NoForward.raised(Some("maybe")).is_err());
}
