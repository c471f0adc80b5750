// src/core/resmap.rs

//! Bidirectional index between OF-CONFIG resource-id strings and OVSDB row
//! UUIDs.
//!
//! One record arena carries `{resource-id, uuid, pending-row}` triples; two
//! sorted index vectors over the arena give O(log n) lookup in either
//! direction. Rows created inside a not-yet-committed transaction enter the
//! map with a provisional UUID and a pending handle; once the transaction
//! commits, [`ResourceMap::refresh_uuids`] reads the real UUIDs and
//! reindexes.

use crate::core::errors::OfcError;
use std::sync::Arc;
use std::sync::OnceLock;
use uuid::Uuid;

/// Handle to a row whose definitive UUID becomes known at commit time.
pub type PendingRow = Arc<OnceLock<Uuid>>;

/// One resource-id ↔ UUID mapping.
#[derive(Debug, Clone)]
pub struct ResRecord {
    pub resource_id: String,
    pub uuid: Uuid,
    /// Set while the backing row only exists in an open transaction.
    pub pending: Option<PendingRow>,
}

#[derive(Debug, Default)]
pub struct ResourceMap {
    records: Vec<ResRecord>,
    /// Indices into `records`, sorted by resource-id (byte-wise).
    index_r: Vec<usize>,
    /// Indices into `records`, sorted by UUID (part-wise over 4x32 bits).
    index_u: Vec<usize>,
}

/// The UUID total order: the four 32-bit parts, most significant first.
fn uuid_parts(u: &Uuid) -> [u32; 4] {
    let b = u.as_bytes();
    [
        u32::from_be_bytes([b[0], b[1], b[2], b[3]]),
        u32::from_be_bytes([b[4], b[5], b[6], b[7]]),
        u32::from_be_bytes([b[8], b[9], b[10], b[11]]),
        u32::from_be_bytes([b[12], b[13], b[14], b[15]]),
    ]
}

impl ResourceMap {
    pub fn new(init_size: usize) -> Self {
        let cap = init_size.max(256);
        Self {
            records: Vec::with_capacity(cap),
            index_r: Vec::with_capacity(cap),
            index_u: Vec::with_capacity(cap),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Inserts a new triple. Fails with `DataExists` when either key is
    /// already present.
    pub fn insert(
        &mut self,
        resource_id: &str,
        uuid: Uuid,
        pending: Option<PendingRow>,
    ) -> Result<(), OfcError> {
        if self.find_by_rid(resource_id).is_some() || self.find_by_uuid(&uuid).is_some() {
            return Err(OfcError::DataExists);
        }
        if self.records.len() == self.records.capacity() {
            // grow by half, as the index arrays are rebuilt in place anyway
            let extra = (self.records.capacity() / 2).max(1);
            self.records.reserve(extra);
            self.index_r.reserve(extra);
            self.index_u.reserve(extra);
        }
        self.records.push(ResRecord {
            resource_id: resource_id.to_string(),
            uuid,
            pending,
        });
        self.index_r.push(self.records.len() - 1);
        self.index_u.push(self.records.len() - 1);
        self.reindex();
        Ok(())
    }

    /// Re-sorts both index arrays over the current arena.
    fn reindex(&mut self) {
        let records = &self.records;
        self.index_r
            .sort_unstable_by(|&a, &b| records[a].resource_id.cmp(&records[b].resource_id));
        self.index_u
            .sort_unstable_by(|&a, &b| uuid_parts(&records[a].uuid).cmp(&uuid_parts(&records[b].uuid)));
    }

    pub fn find_by_rid(&self, resource_id: &str) -> Option<&ResRecord> {
        let records = &self.records;
        self.index_r
            .binary_search_by(|&i| records[i].resource_id.as_str().cmp(resource_id))
            .ok()
            .map(|pos| &records[self.index_r[pos]])
    }

    pub fn find_by_uuid(&self, uuid: &Uuid) -> Option<&ResRecord> {
        let records = &self.records;
        let key = uuid_parts(uuid);
        self.index_u
            .binary_search_by(|&i| uuid_parts(&records[i].uuid).cmp(&key))
            .ok()
            .map(|pos| &records[self.index_u[pos]])
    }

    pub fn remove_by_rid(&mut self, resource_id: &str) -> bool {
        match self.records.iter().position(|r| r.resource_id == resource_id) {
            Some(i) => {
                self.remove_at(i);
                true
            }
            None => false,
        }
    }

    pub fn remove_by_uuid(&mut self, uuid: &Uuid) -> bool {
        match self.records.iter().position(|r| r.uuid == *uuid) {
            Some(i) => {
                self.remove_at(i);
                true
            }
            None => false,
        }
    }

    fn remove_at(&mut self, i: usize) {
        // the tail record fills the hole; both index views are rebuilt
        self.records.swap_remove(i);
        self.index_r = (0..self.records.len()).collect();
        self.index_u = (0..self.records.len()).collect();
        self.reindex();
    }

    /// Materializes records whose row was provisional: reads the committed
    /// UUID from the pending handle, clears the handle, and reindexes when
    /// anything changed.
    pub fn refresh_uuids(&mut self) {
        let mut changed = false;
        for rec in self.records.iter_mut() {
            let Some(pending) = rec.pending.take() else {
                continue;
            };
            match pending.get() {
                Some(committed) => {
                    if rec.uuid != *committed {
                        tracing::debug!(
                            "updated UUID {} for resource-id {}",
                            committed,
                            rec.resource_id
                        );
                        rec.uuid = *committed;
                        changed = true;
                    }
                }
                // not committed yet, keep waiting
                None => rec.pending = Some(pending),
            }
        }
        if changed {
            self.reindex();
        }
    }

    /// Drops every record, e.g. after the whole database content is removed.
    pub fn clear(&mut self) {
        self.records.clear();
        self.index_r.clear();
        self.index_u.clear();
    }

    /// Drops any record still marked provisional, used when a transaction is
    /// aborted before commit.
    pub fn drop_pending(&mut self) {
        let before = self.records.len();
        self.records.retain(|r| r.pending.is_none());
        if self.records.len() != before {
            self.index_r = (0..self.records.len()).collect();
            self.index_u = (0..self.records.len()).collect();
            self.reindex();
        }
    }
}
