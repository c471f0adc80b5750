// tests/unit_resmap_test.rs

use ofcd::core::errors::OfcError;
use ofcd::core::resmap::{PendingRow, ResourceMap};
use std::sync::Arc;
use std::sync::OnceLock;
use uuid::Uuid;

#[test]
fn test_insert_and_lookup_both_ways() {
    let mut map = ResourceMap::new(0);
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    map.insert("port-eth0", a, None).unwrap();
    map.insert("queue-q1", b, None).unwrap();

    let rec = map.find_by_rid("port-eth0").expect("found by rid");
    assert_eq!(rec.uuid, a);
    let rec = map.find_by_uuid(&b).expect("found by uuid");
    assert_eq!(rec.resource_id, "queue-q1");
    assert_eq!(map.len(), 2);
}

#[test]
fn test_duplicate_keys_are_refused() {
    let mut map = ResourceMap::new(0);
    let a = Uuid::new_v4();
    map.insert("dup", a, None).unwrap();

    let err = map.insert("dup", Uuid::new_v4(), None).unwrap_err();
    assert_eq!(err, OfcError::DataExists);
    let err = map.insert("other", a, None).unwrap_err();
    assert_eq!(err, OfcError::DataExists);
    assert_eq!(map.len(), 1);
}

#[test]
fn test_remove_clears_both_indices() {
    let mut map = ResourceMap::new(0);
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    map.insert("one", a, None).unwrap();
    map.insert("two", b, None).unwrap();

    assert!(map.remove_by_rid("one"));
    assert!(map.find_by_rid("one").is_none());
    assert!(map.find_by_uuid(&a).is_none());

    assert!(map.remove_by_uuid(&b));
    assert!(map.find_by_rid("two").is_none());
    assert!(map.is_empty());

    // removing again reports absence
    assert!(!map.remove_by_rid("one"));
    assert!(!map.remove_by_uuid(&b));
}

#[test]
fn test_refresh_uuids_materializes_pending_rows() {
    let mut map = ResourceMap::new(0);
    let provisional = Uuid::new_v4();
    let committed = Uuid::new_v4();
    let handle: PendingRow = Arc::new(OnceLock::new());
    map.insert("pending-row", provisional, Some(handle.clone()))
        .unwrap();

    // before commit the provisional UUID answers lookups
    assert!(map.find_by_uuid(&provisional).is_some());
    map.refresh_uuids();
    assert!(map.find_by_uuid(&provisional).is_some());

    handle.set(committed).unwrap();
    map.refresh_uuids();

    assert!(map.find_by_uuid(&provisional).is_none());
    let rec = map.find_by_uuid(&committed).expect("rematerialized");
    assert_eq!(rec.resource_id, "pending-row");
    assert!(rec.pending.is_none());
}

#[test]
fn test_drop_pending_discards_uncommitted_rows() {
    let mut map = ResourceMap::new(0);
    let stable = Uuid::new_v4();
    map.insert("stable", stable, None).unwrap();
    map.insert("doomed", Uuid::new_v4(), Some(Arc::new(OnceLock::new())))
        .unwrap();

    map.drop_pending();
    assert_eq!(map.len(), 1);
    assert!(map.find_by_rid("stable").is_some());
    assert!(map.find_by_rid("doomed").is_none());
}

#[test]
fn test_clear_empties_the_map() {
    let mut map = ResourceMap::new(0);
    for i in 0..10 {
        map.insert(&format!("rid-{i}"), Uuid::new_v4(), None).unwrap();
    }
    map.clear();
    assert!(map.is_empty());
    assert!(map.find_by_rid("rid-3").is_none());
}
