// tests/unit_locks_test.rs

mod common;

use common::{EDIT_NS, test_datastores};
use ofcd::core::datastore::locks::{Datastore, LockTable};
use ofcd::core::errors::OfcError;

#[test]
fn test_lock_exclusivity() {
    let mut locks = LockTable::default();
    locks.lock(Datastore::Running, "s1").unwrap();

    let err = locks.lock(Datastore::Running, "s2").unwrap_err();
    assert_eq!(err, OfcError::LockDenied("s1".into()));

    // an independent datastore is unaffected
    locks.lock(Datastore::Candidate, "s2").unwrap();
}

#[test]
fn test_unlock_by_non_holder_is_denied() {
    let mut locks = LockTable::default();
    locks.lock(Datastore::Running, "s1").unwrap();

    let err = locks.unlock(Datastore::Running, "s2").unwrap_err();
    assert_eq!(err, OfcError::LockDenied("s1".into()));

    locks.unlock(Datastore::Running, "s1").unwrap();
    // a second unlock finds nothing to release
    let err = locks.unlock(Datastore::Running, "s1").unwrap_err();
    assert!(matches!(err, OfcError::OperationFailed(_)));
}

#[test]
fn test_release_session_drops_all_holdings() {
    let mut locks = LockTable::default();
    locks.lock(Datastore::Running, "s1").unwrap();
    locks.lock(Datastore::Startup, "s1").unwrap();
    locks.release_session("s1");
    assert!(locks.holder(Datastore::Running).is_none());
    assert!(locks.holder(Datastore::Startup).is_none());
}

/// The S1 lifecycle: a lock by one session denies edits and unlocks by any
/// other until the holder releases it.
#[test]
fn test_lock_lifecycle_through_datastores() {
    let (mut ds, _db, _of, _dir) = test_datastores();

    ds.lock(Datastore::Running, "s1").unwrap();

    let edit = format!(
        "<capable-switch {EDIT_NS} nc:operation=\"create\">\
         <resources><port><name>eth0</name></port></resources></capable-switch>"
    );
    let err = ds
        .edit_config(
            Datastore::Running,
            &edit,
            Default::default(),
            Default::default(),
            "s2",
        )
        .unwrap_err();
    assert_eq!(err, OfcError::LockDenied("s1".into()));

    let err = ds.unlock(Datastore::Running, "s2").unwrap_err();
    assert_eq!(err, OfcError::LockDenied("s1".into()));

    ds.unlock(Datastore::Running, "s1").unwrap();

    // with the lock gone, the edit goes through
    ds.edit_config(
        Datastore::Running,
        &edit,
        Default::default(),
        Default::default(),
        "s2",
    )
    .unwrap();
    assert!(ds.get_config(Datastore::Running).unwrap().contains("eth0"));
}
