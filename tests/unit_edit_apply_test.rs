// tests/unit_edit_apply_test.rs

mod common;

use common::{EDIT_NS, test_datastores};
use ofcd::core::datastore::locks::Datastore;
use ofcd::core::edit::DefaultOperation;
use ofcd::core::errors::OfcError;

fn edit_running(
    ds: &mut ofcd::core::datastore::Datastores,
    body: &str,
) -> Result<(), OfcError> {
    ds.edit_config(
        Datastore::Running,
        body,
        DefaultOperation::Merge,
        Default::default(),
        "s1",
    )
}

/// S2: creating a port with a requested number issues the add and the
/// modifier inside one transaction; deleting it by name removes the row.
#[test]
fn test_create_port_then_delete_by_name() {
    let (mut ds, db, _of, _dir) = test_datastores();

    let create = format!(
        "<capable-switch {EDIT_NS} nc:operation=\"create\"><resources>\
         <port><name>eth0</name><requested-number>5</requested-number></port>\
         </resources></capable-switch>"
    );
    edit_running(&mut ds, &create).unwrap();

    let snapshot = db.snapshot();
    let iface = snapshot.interface_by_name("eth0").expect("row created");
    assert_eq!(iface.ofport_request, Some(5));
    let config = ds.get_config(Datastore::Running).unwrap();
    assert!(config.contains("<name>eth0</name>"));
    assert!(config.contains("<requested-number>5</requested-number>"));

    let delete = format!(
        "<capable-switch {EDIT_NS}><resources>\
         <port nc:operation=\"delete\"><name>eth0</name></port>\
         </resources></capable-switch>"
    );
    edit_running(&mut ds, &delete).unwrap();
    assert!(db.snapshot().interface_by_name("eth0").is_none());
}

#[test]
fn test_delete_of_absent_data_is_data_missing() {
    let (mut ds, _db, _of, _dir) = test_datastores();
    let delete = format!(
        "<capable-switch {EDIT_NS}><resources>\
         <port nc:operation=\"delete\"><name>ghost</name></port>\
         </resources></capable-switch>"
    );
    let err = edit_running(&mut ds, &delete).unwrap_err();
    assert_eq!(err, OfcError::DataMissing);
}

/// Deleting a leaf that only carries its schema default is valid even when
/// the data is absent; the server would immediately reinstate the default
/// anyway.
#[test]
fn test_delete_of_default_value_is_relieved() {
    let (mut ds, _db, _of, _dir) = test_datastores();
    let create = format!(
        "<capable-switch {EDIT_NS} nc:operation=\"create\"><logical-switches>\
         <switch><id>br0</id></switch></logical-switches></capable-switch>"
    );
    edit_running(&mut ds, &create).unwrap();

    let delete = format!(
        "<capable-switch {EDIT_NS}><logical-switches><switch><id>br0</id>\
         <lost-connection-behavior nc:operation=\"delete\">failSecureMode</lost-connection-behavior>\
         </switch></logical-switches></capable-switch>"
    );
    edit_running(&mut ds, &delete).unwrap();

    // a non-default value still reports missing data
    let delete_wrong = format!(
        "<capable-switch {EDIT_NS}><logical-switches><switch><id>br0</id>\
         <lost-connection-behavior nc:operation=\"delete\">failStandaloneMode</lost-connection-behavior>\
         </switch></logical-switches></capable-switch>"
    );
    let err = edit_running(&mut ds, &delete_wrong).unwrap_err();
    assert_eq!(err, OfcError::DataMissing);
}

#[test]
fn test_create_of_existing_data_is_data_exists() {
    let (mut ds, _db, _of, _dir) = test_datastores();
    let create = format!(
        "<capable-switch {EDIT_NS}><resources>\
         <port nc:operation=\"create\"><name>eth0</name></port>\
         </resources></capable-switch>"
    );
    edit_running(&mut ds, &create).unwrap();
    let err = edit_running(&mut ds, &create).unwrap_err();
    assert_eq!(err, OfcError::DataExists);
}

/// A failing mutation aborts the transaction: the database is unchanged by
/// an edit that errors half-way.
#[test]
fn test_failed_edit_leaves_database_untouched() {
    let (mut ds, db, _of, _dir) = test_datastores();
    let seed = format!(
        "<capable-switch {EDIT_NS} nc:operation=\"create\"><resources>\
         <port><name>eth0</name></port></resources></capable-switch>"
    );
    edit_running(&mut ds, &seed).unwrap();
    let before_cfg = ds.get_config(Datastore::Running).unwrap();
    let before_seqno = db.seqno();

    // the queue references a port row that does not exist, failing after
    // the first port was already staged
    let edit = format!(
        "<capable-switch {EDIT_NS}><resources>\
         <port nc:operation=\"create\"><name>eth1</name></port>\
         <queue nc:operation=\"create\"><resource-id>q1</resource-id>\
         <port>nope</port></queue></resources></capable-switch>"
    );
    let err = edit_running(&mut ds, &edit).unwrap_err();
    assert_eq!(err, OfcError::DataMissing);

    assert_eq!(db.seqno(), before_seqno);
    assert_eq!(ds.get_config(Datastore::Running).unwrap(), before_cfg);
    assert!(db.snapshot().interface_by_name("eth1").is_none());
}

/// Merge degenerates to create for absent data and to replace for leaves.
#[test]
fn test_merge_semantics_on_mirror() {
    let (mut ds, _db, _of, _dir) = test_datastores();

    let first = format!(
        "<capable-switch {EDIT_NS}><resources>\
         <port><name>eth0</name><requested-number>1</requested-number></port>\
         </resources></capable-switch>"
    );
    ds.edit_config(
        Datastore::Candidate,
        &first,
        DefaultOperation::Merge,
        Default::default(),
        "s1",
    )
    .unwrap();
    let cand = ds.get_config(Datastore::Candidate).unwrap();
    assert!(cand.contains("<requested-number>1</requested-number>"));

    // merging a new value for the leaf replaces it without duplicating the
    // port entry
    let second = format!(
        "<capable-switch {EDIT_NS}><resources>\
         <port><name>eth0</name><requested-number>7</requested-number></port>\
         </resources></capable-switch>"
    );
    ds.edit_config(
        Datastore::Candidate,
        &second,
        DefaultOperation::Merge,
        Default::default(),
        "s1",
    )
    .unwrap();
    let cand = ds.get_config(Datastore::Candidate).unwrap();
    assert!(cand.contains("<requested-number>7</requested-number>"));
    assert!(!cand.contains("<requested-number>1</requested-number>"));
    assert_eq!(cand.matches("<name>eth0</name>").count(), 1);
}
