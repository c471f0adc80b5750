// tests/unit_edit_hierarchy_test.rs

mod common;

use common::{EDIT_NS, test_datastores};
use ofcd::core::datastore::locks::Datastore;
use ofcd::core::edit::{DefaultOperation, compact_operations};
use ofcd::core::errors::OfcError;
use ofcd::core::xml::XmlDoc;

/// A delete nested under an explicit create is refused before any mutation
/// is attempted.
#[test]
fn test_delete_under_create_is_rejected() {
    let (mut ds, db, _of, _dir) = test_datastores();
    let before = db.seqno();

    let edit = format!(
        "<capable-switch {EDIT_NS}><logical-switches>\
         <switch nc:operation=\"create\"><id>br0</id>\
         <lost-connection-behavior nc:operation=\"delete\">failSecureMode</lost-connection-behavior>\
         </switch></logical-switches></capable-switch>"
    );
    let err = ds
        .edit_config(
            Datastore::Running,
            &edit,
            DefaultOperation::Merge,
            Default::default(),
            "s1",
        )
        .unwrap_err();
    assert!(matches!(err, OfcError::OperationFailed(_)));
    // nothing was committed
    assert_eq!(db.seqno(), before);
    assert!(ds.get_config(Datastore::Running).unwrap().is_empty());
}

#[test]
fn test_create_under_delete_is_rejected() {
    let (mut ds, _db, _of, _dir) = test_datastores();
    let edit = format!(
        "<capable-switch {EDIT_NS}><resources>\
         <port nc:operation=\"delete\"><name>eth0</name>\
         <requested-number nc:operation=\"create\">3</requested-number>\
         </port></resources></capable-switch>"
    );
    let err = ds
        .edit_config(
            Datastore::Candidate,
            &edit,
            DefaultOperation::Merge,
            Default::default(),
            "s1",
        )
        .unwrap_err();
    assert!(matches!(err, OfcError::OperationFailed(_)));
}

/// With a replace default operation, explicit removal operations anywhere
/// in the payload are invalid.
#[test]
fn test_remove_under_default_replace_is_rejected() {
    let (mut ds, _db, _of, _dir) = test_datastores();
    let edit = format!(
        "<capable-switch {EDIT_NS}><resources>\
         <port nc:operation=\"remove\"><name>eth0</name></port>\
         </resources></capable-switch>"
    );
    let err = ds
        .edit_config(
            Datastore::Candidate,
            &edit,
            DefaultOperation::Replace,
            Default::default(),
            "s1",
        )
        .unwrap_err();
    assert!(matches!(err, OfcError::OperationFailed(_)));
}

#[test]
fn test_unknown_operation_attribute() {
    let (mut ds, _db, _of, _dir) = test_datastores();
    let edit = format!(
        "<capable-switch {EDIT_NS}><resources>\
         <port nc:operation=\"upsert\"><name>eth0</name></port>\
         </resources></capable-switch>"
    );
    let err = ds
        .edit_config(
            Datastore::Candidate,
            &edit,
            DefaultOperation::Merge,
            Default::default(),
            "s1",
        )
        .unwrap_err();
    assert_eq!(err, OfcError::BadAttribute("operation".into()));
}

/// Compaction removes operation attributes that repeat the effective
/// operation, and is a fixpoint: running it twice changes nothing more.
#[test]
fn test_compaction_fixpoint() {
    let text = format!(
        "<capable-switch {EDIT_NS}><resources>\
         <port nc:operation=\"create\"><name>eth0</name>\
         <requested-number nc:operation=\"create\">3</requested-number></port>\
         <port nc:operation=\"merge\"><name>eth1</name></port>\
         </resources></capable-switch>"
    );
    let mut once = XmlDoc::parse(&text).unwrap();
    compact_operations(&mut once, DefaultOperation::Merge).unwrap();
    let once_dump = once.dump().unwrap();

    // the nested duplicate create is elided, the merge under a merge
    // default is elided, the outer create stays
    assert!(once_dump.contains("create"));
    assert_eq!(once_dump.matches("operation").count(), 1);

    let mut twice = XmlDoc::parse(&once_dump).unwrap();
    compact_operations(&mut twice, DefaultOperation::Merge).unwrap();
    assert_eq!(twice.dump().unwrap(), once_dump);
}
