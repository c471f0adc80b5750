// src/core/datastore/locks.rs

//! The per-datastore lock table. One session at a time may hold a
//! datastore; the holder alone may unlock it, and any mutating operation by
//! another session is refused while the lock stands.

use crate::core::errors::OfcError;
use strum_macros::{Display, EnumString};

/// The three NETCONF datastores this server exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Datastore {
    Running,
    Startup,
    Candidate,
}

#[derive(Debug, Default)]
pub struct LockTable {
    running: Option<String>,
    startup: Option<String>,
    candidate: Option<String>,
}

impl LockTable {
    fn slot(&mut self, target: Datastore) -> &mut Option<String> {
        match target {
            Datastore::Running => &mut self.running,
            Datastore::Startup => &mut self.startup,
            Datastore::Candidate => &mut self.candidate,
        }
    }

    pub fn holder(&self, target: Datastore) -> Option<&str> {
        match target {
            Datastore::Running => self.running.as_deref(),
            Datastore::Startup => self.startup.as_deref(),
            Datastore::Candidate => self.candidate.as_deref(),
        }
    }

    pub fn lock(&mut self, target: Datastore, session_id: &str) -> Result<(), OfcError> {
        let slot = self.slot(target);
        match slot {
            Some(holder) => Err(OfcError::LockDenied(holder.clone())),
            None => {
                *slot = Some(session_id.to_string());
                tracing::debug!("datastore {target} locked by session {session_id}");
                Ok(())
            }
        }
    }

    pub fn unlock(&mut self, target: Datastore, session_id: &str) -> Result<(), OfcError> {
        let slot = self.slot(target);
        match slot {
            Some(holder) if holder == session_id => {
                *slot = None;
                tracing::debug!("datastore {target} unlocked by session {session_id}");
                Ok(())
            }
            Some(holder) => Err(OfcError::LockDenied(holder.clone())),
            None => Err(OfcError::OperationFailed(
                "target datastore is not locked".into(),
            )),
        }
    }

    /// Fails with `lock-denied` when another session holds the target.
    pub fn check_writable(&self, target: Datastore, session_id: &str) -> Result<(), OfcError> {
        match self.holder(target) {
            Some(holder) if holder != session_id => Err(OfcError::LockDenied(holder.to_string())),
            _ => Ok(()),
        }
    }

    /// Releases every lock a vanished session may still hold.
    pub fn release_session(&mut self, session_id: &str) {
        for slot in [&mut self.running, &mut self.startup, &mut self.candidate] {
            if slot.as_deref() == Some(session_id) {
                *slot = None;
            }
        }
    }
}
