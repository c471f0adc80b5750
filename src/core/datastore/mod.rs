// src/core/datastore/mod.rs

//! The datastore manager: running/startup/candidate lifecycle, the lock
//! discipline, and the get/copy/delete/edit pipeline.
//!
//! Running is never persisted on its own: reads are synthesized from the
//! database replica, writes go through the transaction layer and the
//! OpenFlow port mutator. Startup lives in `<datadir>/startup.xml` and is
//! rewritten at shutdown; candidate is purely in-memory.

pub mod locks;

use crate::core::edit::{ApplyTarget, DefaultOperation, WithDefaults, apply_edit};
use crate::core::errors::OfcError;
use crate::core::openflow::PortMutator;
use crate::core::ovsdb::{OvsdbClient, Txn, render};
use crate::core::resmap::ResourceMap;
use crate::core::xml::{XmlDoc, child, element_children, text_of};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use xmltree::{Element, XMLNode};

pub use locks::{Datastore, LockTable};

/// The file name of the persisted startup datastore under the data
/// directory.
const STARTUP_FILE: &str = "startup.xml";

/// The source of a copy-config operation.
pub enum CopySource {
    Datastore(Datastore),
    /// An inline `<config>` body.
    Config(String),
}

/// The edit-config error-option. With a single transaction per edit the
/// effect is always rollback; the variants are kept to validate the RPC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorOption {
    #[default]
    StopOnError,
    ContinueOnError,
    RollbackOnError,
}

pub struct Datastores {
    db: Arc<OvsdbClient>,
    of: Arc<dyn PortMutator>,
    resmap: ResourceMap,
    pub locks: LockTable,
    startup: XmlDoc,
    candidate: XmlDoc,
    /// The locally stored /capable-switch/id; not a database column.
    switch_id: Option<String>,
    startup_path: PathBuf,
    defaults: WithDefaults,
}

impl Datastores {
    /// Connects the replica and loads the startup datastore. A missing or
    /// rootless startup file yields an empty startup store.
    pub fn init(
        db: Arc<OvsdbClient>,
        of: Arc<dyn PortMutator>,
        datadir: impl Into<PathBuf>,
        defaults: WithDefaults,
    ) -> Result<Self, OfcError> {
        let startup_path = datadir.into().join(STARTUP_FILE);
        let startup = match std::fs::read_to_string(&startup_path) {
            Ok(text) => XmlDoc::parse(&text).unwrap_or_else(|e| {
                warn!("startup datastore is not well-formed ({e}), starting empty");
                XmlDoc::default()
            }),
            Err(_) => XmlDoc::default(),
        };
        info!("OF-CONFIG datastore initialized");
        Ok(Self {
            db,
            of,
            resmap: ResourceMap::new(0),
            locks: LockTable::default(),
            startup,
            candidate: XmlDoc::default(),
            switch_id: None,
            startup_path,
            defaults,
        })
    }

    /// Writes the startup datastore back to its persistent file.
    pub fn free(&mut self) {
        match self.startup.dump_formatted() {
            Ok(text) => {
                if let Err(e) = std::fs::write(&self.startup_path, text) {
                    warn!("failed to persist startup datastore: {e}");
                }
            }
            Err(e) => warn!("failed to serialize startup datastore: {e}"),
        }
    }

    pub fn lock(&mut self, target: Datastore, session_id: &str) -> Result<(), OfcError> {
        self.locks.lock(target, session_id)
    }

    pub fn unlock(&mut self, target: Datastore, session_id: &str) -> Result<(), OfcError> {
        self.locks.unlock(target, session_id)
    }

    /// The configuration of the given datastore as XML text; empty stores
    /// dump to an empty string.
    pub fn get_config(&self, target: Datastore) -> Result<String, OfcError> {
        match target {
            Datastore::Running => {
                self.db.sync();
                let snapshot = self.db.snapshot();
                Ok(render::render_config(
                    &snapshot,
                    &self.resmap,
                    self.switch_id.as_deref(),
                ))
            }
            Datastore::Startup => self.startup.dump(),
            Datastore::Candidate => self.candidate.dump(),
        }
    }

    /// The running configuration merged with the operational state, for the
    /// `<get>` operation.
    pub fn get(&self) -> Result<String, OfcError> {
        self.db.sync();
        let snapshot = self.db.snapshot();
        let config = render::render_config(&snapshot, &self.resmap, self.switch_id.as_deref());
        let state = render::render_state(&snapshot, &self.resmap);
        let mut merged = XmlDoc::parse(&state)?;
        let config = XmlDoc::parse(&config)?;
        if let (Some(into), Some(from)) = (merged.root.as_mut(), config.root.as_ref()) {
            merge_into(into, from, None);
        } else if merged.is_empty() {
            merged = config;
        }
        merged.dump()
    }

    pub fn copy_config(
        &mut self,
        target: Datastore,
        source: CopySource,
        session_id: &str,
    ) -> Result<(), OfcError> {
        self.locks.check_writable(target, session_id)?;
        let src_doc = match source {
            CopySource::Datastore(ds) if ds == target => {
                return Err(OfcError::BadElement("source".into()));
            }
            CopySource::Datastore(Datastore::Running) => {
                XmlDoc::parse(&self.get_config(Datastore::Running)?)?
            }
            CopySource::Datastore(Datastore::Startup) => self.startup.clone(),
            CopySource::Datastore(Datastore::Candidate) => self.candidate.clone(),
            CopySource::Config(text) => {
                XmlDoc::parse(&text).map_err(|_| OfcError::BadElement("config".into()))?
            }
        };
        match target {
            Datastore::Running => self.apply_full(&src_doc),
            Datastore::Startup => {
                self.startup = src_doc;
                Ok(())
            }
            Datastore::Candidate => {
                self.candidate = src_doc;
                Ok(())
            }
        }
    }

    pub fn delete_config(
        &mut self,
        target: Datastore,
        session_id: &str,
    ) -> Result<(), OfcError> {
        self.locks.check_writable(target, session_id)?;
        match target {
            Datastore::Running => {
                let mut txn = Txn::begin(self.db.clone())?;
                txn.del_all()?;
                self.switch_id = None;
                txn.commit(&mut self.resmap)
            }
            Datastore::Startup => {
                self.startup = XmlDoc::default();
                Ok(())
            }
            Datastore::Candidate => {
                self.candidate = XmlDoc::default();
                Ok(())
            }
        }
    }

    pub fn edit_config(
        &mut self,
        target: Datastore,
        config: &str,
        defop: DefaultOperation,
        _errop: ErrorOption,
        session_id: &str,
    ) -> Result<(), OfcError> {
        self.locks.check_writable(target, session_id)?;
        let edit = XmlDoc::parse(config).map_err(|_| OfcError::BadElement("config".into()))?;

        match target {
            Datastore::Running => {
                let mut orig = XmlDoc::parse(&self.get_config(Datastore::Running)?)?;
                let saved_id = self.switch_id.clone();
                let mut txn = Txn::begin(self.db.clone())?;
                let result = {
                    let mut apply_target = ApplyTarget::Running {
                        txn: &mut txn,
                        of: self.of.as_ref(),
                        switch_id: &mut self.switch_id,
                    };
                    apply_edit(&mut orig, edit, defop, self.defaults, &mut apply_target)
                };
                match result {
                    Ok(()) => txn.commit(&mut self.resmap),
                    Err(e) => {
                        txn.abort();
                        self.switch_id = saved_id;
                        Err(e)
                    }
                }
            }
            Datastore::Startup => {
                let mut doc = std::mem::take(&mut self.startup);
                let result =
                    apply_edit(&mut doc, edit, defop, self.defaults, &mut ApplyTarget::Mirror);
                self.startup = doc;
                result
            }
            Datastore::Candidate => {
                let mut doc = std::mem::take(&mut self.candidate);
                let result =
                    apply_edit(&mut doc, edit, defop, self.defaults, &mut ApplyTarget::Mirror);
                self.candidate = doc;
                result
            }
        }
    }

    /// Replaces the whole running configuration with the given document:
    /// everything is removed, then the document's children are applied in a
    /// fixed order (id, then resources, then logical-switches) inside one
    /// transaction.
    fn apply_full(&mut self, doc: &XmlDoc) -> Result<(), OfcError> {
        let mut txn = Txn::begin(self.db.clone())?;
        txn.del_all()?;
        let saved_id = self.switch_id.take();

        let result = self.apply_full_inner(&mut txn, doc);
        match result {
            Ok(()) => txn.commit(&mut self.resmap),
            Err(e) => {
                txn.abort();
                self.switch_id = saved_id;
                Err(e)
            }
        }
    }

    fn apply_full_inner(&mut self, txn: &mut Txn, doc: &XmlDoc) -> Result<(), OfcError> {
        let Some(root) = &doc.root else {
            // no data: the content was deleted and we are done
            return Ok(());
        };
        if let Some(id) = child(root, "id") {
            self.switch_id = text_of(id);
        }
        // ports and certificates first, then the switches that reference
        // them, then flow tables and queues, which link into existing
        // bridges and bridge ports
        if let Some(resources) = child(root, "resources") {
            for (_, r) in element_children(resources) {
                match r.name.as_str() {
                    "port" => txn.add_port(r)?,
                    "owned-certificate" => txn.add_owned_certificate(r)?,
                    "external-certificate" => txn.add_external_certificate(r)?,
                    "queue" | "flow-table" => {}
                    other => warn!("copy-config: unknown resource {other}"),
                }
            }
        }
        if let Some(switches) = child(root, "logical-switches") {
            for (_, s) in element_children(switches) {
                if s.name == "switch" {
                    txn.add_bridge(s)?;
                }
            }
        }
        if let Some(resources) = child(root, "resources") {
            for (_, r) in element_children(resources) {
                match r.name.as_str() {
                    "flow-table" => txn.add_flow_table(r)?,
                    "queue" => txn.add_queue(r)?,
                    _ => {}
                }
            }
        }
        Ok(())
    }

    /// Read access for the server's dispatch layer (state rendering, port
    /// lookups).
    pub fn db(&self) -> &Arc<OvsdbClient> {
        &self.db
    }

    pub fn switch_id(&self) -> Option<&str> {
        self.switch_id.as_deref()
    }
}

/// List keys used when merging state into config for `<get>`; mirrors the
/// edit engine's key table.
fn merge_key(name: &str, grandparent: Option<&str>) -> Option<&'static str> {
    match name {
        "switch" | "controller" => Some("id"),
        "port" if grandparent == Some("capable-switch") => Some("name"),
        "flow-table" if grandparent == Some("capable-switch") => Some("table-id"),
        "queue" | "owned-certificate" | "external-certificate"
            if grandparent == Some("capable-switch") =>
        {
            Some("resource-id")
        }
        _ => None,
    }
}

/// Structurally merges `from` into `into`: matching children recurse,
/// missing ones are appended. `into_parent` is the local name of `into`'s
/// own parent, needed by the key table.
fn merge_into(into: &mut Element, from: &Element, into_parent: Option<&str>) {
    let from_children: Vec<Element> = element_children(from).map(|(_, e)| e.clone()).collect();
    for from_child in from_children {
        let matched = into.children.iter().position(|c| match c {
            XMLNode::Element(e) if e.name == from_child.name => {
                match merge_key(&e.name, into_parent) {
                    Some(key) => {
                        let k1 = child(e, key).and_then(text_of);
                        let k2 = child(&from_child, key).and_then(text_of);
                        k1.is_some() && k1 == k2
                    }
                    // containers merge; a leaf keeps the value already
                    // present
                    None => true,
                }
            }
            _ => false,
        });
        match matched {
            Some(idx) => {
                let parent_name = into.name.clone();
                if let XMLNode::Element(e) = &mut into.children[idx] {
                    merge_into(e, &from_child, Some(parent_name.as_str()));
                }
            }
            None => into.children.push(XMLNode::Element(from_child)),
        }
    }
}
