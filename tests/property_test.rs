// tests/property_test.rs

//! Property-based checks of the resource map: after any sequence of
//! inserts and removals, both indices answer consistently for exactly the
//! surviving records.

use ofcd::core::resmap::ResourceMap;
use proptest::prelude::*;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone)]
enum Op {
    Insert(u16),
    RemoveByRid(u16),
    RemoveByUuid(u16),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u16..64).prop_map(Op::Insert),
        (0u16..64).prop_map(Op::RemoveByRid),
        (0u16..64).prop_map(Op::RemoveByUuid),
    ]
}

proptest! {
    #[test]
    fn resource_map_duality(ops in proptest::collection::vec(op_strategy(), 1..200)) {
        let mut map = ResourceMap::new(0);
        // deterministic uuid per slot so removal ops can address them
        let uuids: Vec<Uuid> = (0u128..64).map(|i| Uuid::from_u128(i + 1)).collect();
        let mut model: HashMap<u16, Uuid> = HashMap::new();

        for op in ops {
            match op {
                Op::Insert(slot) => {
                    let rid = format!("rid-{slot}");
                    let result = map.insert(&rid, uuids[slot as usize], None);
                    if model.contains_key(&slot) {
                        prop_assert!(result.is_err());
                    } else {
                        prop_assert!(result.is_ok());
                        model.insert(slot, uuids[slot as usize]);
                    }
                }
                Op::RemoveByRid(slot) => {
                    let removed = map.remove_by_rid(&format!("rid-{slot}"));
                    prop_assert_eq!(removed, model.remove(&slot).is_some());
                }
                Op::RemoveByUuid(slot) => {
                    let removed = map.remove_by_uuid(&uuids[slot as usize]);
                    prop_assert_eq!(removed, model.remove(&slot).is_some());
                }
            }
        }

        prop_assert_eq!(map.len(), model.len());
        for (slot, uuid) in &model {
            let rid = format!("rid-{slot}");
            let by_rid = map.find_by_rid(&rid).expect("present by rid");
            prop_assert_eq!(&by_rid.uuid, uuid);
            let by_uuid = map.find_by_uuid(uuid).expect("present by uuid");
            prop_assert_eq!(by_uuid.resource_id.as_str(), rid.as_str());
        }
    }
}
