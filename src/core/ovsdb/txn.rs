// src/core/ovsdb/txn.rs

//! The database transaction layer: a batch of typed mutations staged against
//! a working copy of the replica, committed atomically or dropped.
//!
//! Only one transaction may be open per database client. Mutations validate eagerly
//! against the working copy, so the edit engine observes `data-exists` /
//! `data-missing` at dispatch time; `commit` swaps the working copy into the
//! replica and materializes resource-map entries minted inside the
//! transaction.

use crate::core::errors::OfcError;
use crate::core::ovsdb::client::OvsdbClient;
use crate::core::ovsdb::schema::{
    BridgeRow, CONTROLLER_ID_KEY, ControllerRow, DbState, EXTERNAL_CERT_KEY, FlowTableRow,
    InterfaceRow, OWNED_CERT_KEY, PortRow, QUEUE_ID_KEY, QosRow, QueueRow, RESOURCE_ID_KEY,
    SslRow, TABLE_ID_KEY,
};
use crate::core::resmap::{PendingRow, ResourceMap};
use crate::core::xml::{child, element_children, key_of, text_of};
use std::sync::Arc;
use std::sync::OnceLock;
use tracing::{debug, warn};
use uuid::Uuid;
use xmltree::Element;

/// Staged changes to the resource map, applied only on commit.
enum ResMapOp {
    Insert(String, Uuid, Option<PendingRow>),
    RemoveRid(String),
    RemoveUuid(Uuid),
    Clear,
}

pub struct Txn {
    client: Arc<OvsdbClient>,
    work: DbState,
    resmap_ops: Vec<ResMapOp>,
    /// Rows minted in this transaction; handles are resolved at commit.
    minted: Vec<(PendingRow, Uuid)>,
    /// The last mutation applied, for commit diagnostics.
    last_op: String,
    done: bool,
}

impl Txn {
    /// Opens a new transaction over the current replica contents.
    pub fn begin(client: Arc<OvsdbClient>) -> Result<Self, OfcError> {
        if !client.claim_txn() {
            return Err(OfcError::OperationFailed(
                "another transaction is already active".into(),
            ));
        }
        let work = client.snapshot();
        Ok(Self {
            client,
            work,
            resmap_ops: Vec::new(),
            minted: Vec::new(),
            last_op: String::new(),
            done: false,
        })
    }

    /// Commits the staged batch: the working copy replaces the replica and
    /// the resource map picks up rows minted here.
    pub fn commit(mut self, resmap: &mut ResourceMap) -> Result<(), OfcError> {
        self.done = true;
        for (handle, uuid) in self.minted.drain(..) {
            let _ = handle.set(uuid);
        }
        for op in self.resmap_ops.drain(..) {
            match op {
                ResMapOp::Insert(rid, uuid, pending) => {
                    resmap.insert(&rid, uuid, pending).map_err(|_| {
                        OfcError::OperationFailed(format!(
                            "commit failed at '{}': duplicate resource-id {rid}",
                            self.last_op
                        ))
                    })?;
                }
                ResMapOp::RemoveRid(rid) => {
                    resmap.remove_by_rid(&rid);
                }
                ResMapOp::RemoveUuid(uuid) => {
                    resmap.remove_by_uuid(&uuid);
                }
                ResMapOp::Clear => resmap.clear(),
            }
        }
        resmap.refresh_uuids();
        self.client.commit_state(std::mem::take(&mut self.work));
        debug!("transaction committed");
        Ok(())
    }

    /// Drops the staged batch.
    pub fn abort(mut self) {
        self.done = true;
        debug!("transaction aborted");
    }

    fn mint_row(&mut self) -> (Uuid, PendingRow) {
        let uuid = Uuid::new_v4();
        let handle: PendingRow = Arc::new(OnceLock::new());
        self.minted.push((handle.clone(), uuid));
        (uuid, handle)
    }

    fn note(&mut self, op: impl Into<String>) {
        self.last_op = op.into();
    }

    /// Read access to the working copy, for dispatch decisions that need the
    /// in-transaction view (e.g. which bridge owns a port).
    pub fn state(&self) -> &DbState {
        &self.work
    }

    // --- whole-database ---

    /// Removes every top-level row the model owns from all governed tables.
    pub fn del_all(&mut self) -> Result<(), OfcError> {
        self.note("del-all");
        self.work = DbState::default();
        self.resmap_ops.push(ResMapOp::Clear);
        Ok(())
    }

    // --- bridges ---

    /// Creates a bridge from a `<switch>` subtree, including its nested
    /// datapath, fail mode, controllers, and resource references.
    pub fn add_bridge(&mut self, node: &Element) -> Result<(), OfcError> {
        let name = key_of(node, "id")?;
        self.note(format!("add-bridge {name}"));
        if self.work.bridge_by_name(&name).is_some() {
            return Err(OfcError::DataExists);
        }
        let (uuid, _handle) = self.mint_row();
        self.work.bridges.push(BridgeRow {
            uuid,
            name: name.clone(),
            ..Default::default()
        });

        for (_, c) in element_children(node) {
            match c.name.as_str() {
                "id" => {}
                "datapath-id" => self.mod_bridge_datapath(&name, text_of(c).as_deref())?,
                "lost-connection-behavior" => {
                    self.mod_bridge_failmode(&name, text_of(c).as_deref())?
                }
                "controllers" => {
                    for (_, contr) in element_children(c) {
                        if contr.name == "controller" {
                            self.add_controller(contr, &name)?;
                        }
                    }
                }
                "resources" => {
                    for (_, r) in element_children(c) {
                        match (r.name.as_str(), text_of(r)) {
                            ("port", Some(port)) => self.add_bridge_port(&name, &port)?,
                            // flow-table links are established when the
                            // table itself is created; certificate refs are
                            // implicit, queue refs hang off their port
                            ("flow-table" | "certificate" | "queue", _) => {}
                            _ => {
                                return Err(OfcError::BadElement(format!(
                                    "invalid resources leafref '{}'",
                                    r.name
                                )));
                            }
                        }
                    }
                }
                "enabled" => {}
                other => warn!("add-bridge: unknown element {other}"),
            }
        }
        Ok(())
    }

    pub fn del_bridge(&mut self, name: &str) -> Result<(), OfcError> {
        self.note(format!("del-bridge {name}"));
        let Some(pos) = self.work.bridges.iter().position(|b| b.name == name) else {
            return Err(OfcError::DataMissing);
        };
        let bridge = self.work.bridges.remove(pos);
        // rows owned by the bridge go with it; standalone interfaces stay
        self.work
            .controllers
            .retain(|c| !bridge.controllers.contains(&c.uuid));
        self.work.ports.retain(|p| !bridge.ports.contains(&p.uuid));
        Ok(())
    }

    /// `value = None` unsets the datapath id.
    pub fn mod_bridge_datapath(
        &mut self,
        name: &str,
        value: Option<&str>,
    ) -> Result<(), OfcError> {
        self.note(format!("mod-bridge-datapath {name}"));
        let bridge = self
            .work
            .bridge_by_name_mut(name)
            .ok_or(OfcError::DataMissing)?;
        match value {
            Some(v) => {
                bridge
                    .other_config
                    .insert("datapath-id".into(), v.to_string());
            }
            None => {
                bridge.other_config.shift_remove("datapath-id");
            }
        }
        Ok(())
    }

    /// `value = None` resets the fail mode to its default.
    pub fn mod_bridge_failmode(
        &mut self,
        name: &str,
        value: Option<&str>,
    ) -> Result<(), OfcError> {
        self.note(format!("mod-bridge-failmode {name}"));
        let bridge = self
            .work
            .bridge_by_name_mut(name)
            .ok_or(OfcError::DataMissing)?;
        bridge.fail_mode = value.map(str::to_string);
        Ok(())
    }

    /// `port_ref` is the resources leaf-ref value: a resource-id, or the
    /// interface name for ports that never carried one.
    pub fn add_bridge_port(&mut self, br_name: &str, port_ref: &str) -> Result<(), OfcError> {
        self.note(format!("add-bridge-port {br_name}/{port_ref}"));
        let iface = self
            .work
            .interface_by_ref(port_ref)
            .ok_or(OfcError::DataMissing)?;
        let iface_uuid = iface.uuid;
        let port_name = iface.name.clone();
        if self.work.bridge_by_name(br_name).is_none() {
            return Err(OfcError::DataMissing);
        }
        if self
            .work
            .bridge_with_port(&port_name)
            .is_some_and(|b| b.name == br_name)
        {
            return Err(OfcError::DataExists);
        }
        let (uuid, _handle) = self.mint_row();
        self.work.ports.push(PortRow {
            uuid,
            name: port_name,
            interfaces: vec![iface_uuid],
            qos: None,
        });
        let bridge = self
            .work
            .bridge_by_name_mut(br_name)
            .ok_or(OfcError::DataMissing)?;
        bridge.ports.push(uuid);
        Ok(())
    }

    pub fn del_bridge_port(&mut self, br_name: &str, port_ref: &str) -> Result<(), OfcError> {
        self.note(format!("del-bridge-port {br_name}/{port_ref}"));
        let port_name = self
            .work
            .interface_by_ref(port_ref)
            .ok_or(OfcError::DataMissing)?
            .name
            .clone();
        let port_uuid = self
            .work
            .port_row_by_name(&port_name)
            .ok_or(OfcError::DataMissing)?
            .uuid;
        let bridge = self
            .work
            .bridge_by_name_mut(br_name)
            .ok_or(OfcError::DataMissing)?;
        let before = bridge.ports.len();
        bridge.ports.retain(|u| *u != port_uuid);
        if bridge.ports.len() == before {
            return Err(OfcError::DataMissing);
        }
        self.work.ports.retain(|p| p.uuid != port_uuid);
        Ok(())
    }

    // --- controllers ---

    /// Creates a controller under a bridge from a `<controller>` subtree.
    pub fn add_controller(&mut self, node: &Element, br_name: &str) -> Result<(), OfcError> {
        let id = key_of(node, "id")?;
        self.note(format!("add-controller {id}"));
        if self.work.bridge_by_name(br_name).is_none() {
            return Err(OfcError::DataMissing);
        }
        if self.work.controller_by_id(&id).is_some() {
            return Err(OfcError::DataExists);
        }

        let ip = child(node, "ip-address").and_then(text_of).unwrap_or_default();
        let port = child(node, "port")
            .and_then(text_of)
            .unwrap_or_else(|| "6633".into());
        let protocol = child(node, "protocol")
            .and_then(text_of)
            .unwrap_or_else(|| "tls".into());
        let local_ip = child(node, "local-ip-address").and_then(text_of);

        let (uuid, _handle) = self.mint_row();
        let mut row = ControllerRow {
            uuid,
            target: build_target(&protocol, &ip, &port),
            connection_mode: local_ip.as_ref().map(|_| "in-band".to_string()),
            local_ip,
            is_connected: false,
            external_ids: Default::default(),
        };
        row.external_ids.insert(CONTROLLER_ID_KEY.into(), id);
        self.work.controllers.push(row);
        let bridge = self
            .work
            .bridge_by_name_mut(br_name)
            .ok_or(OfcError::DataMissing)?;
        bridge.controllers.push(uuid);
        Ok(())
    }

    pub fn del_controller(&mut self, id: &str, br_name: &str) -> Result<(), OfcError> {
        self.note(format!("del-controller {id}"));
        let uuid = self
            .work
            .controller_by_id(id)
            .ok_or(OfcError::DataMissing)?
            .uuid;
        let bridge = self
            .work
            .bridge_by_name_mut(br_name)
            .ok_or(OfcError::DataMissing)?;
        bridge.controllers.retain(|u| *u != uuid);
        self.work.controllers.retain(|c| c.uuid != uuid);
        Ok(())
    }

    /// `value = None` unsets the local ip (and leaves in-band mode).
    pub fn mod_controller_lip(&mut self, id: &str, value: Option<&str>) -> Result<(), OfcError> {
        self.note(format!("mod-controller-lip {id}"));
        let row = self
            .work
            .controller_by_id_mut(id)
            .ok_or(OfcError::DataMissing)?;
        row.local_ip = value.map(str::to_string);
        row.connection_mode = value.map(|_| "in-band".to_string());
        Ok(())
    }

    /// Rewrites one part of the controller target. `field` is one of
    /// `ip-address`, `port`, `protocol`; `value = None` resets that part to
    /// its default.
    pub fn mod_controller_target(
        &mut self,
        id: &str,
        field: &str,
        value: Option<&str>,
    ) -> Result<(), OfcError> {
        self.note(format!("mod-controller-target {id} {field}"));
        let row = self
            .work
            .controller_by_id_mut(id)
            .ok_or(OfcError::DataMissing)?;
        let (proto, addr, port) = crate::core::ovsdb::render::parse_target(&row.target);
        let mut proto = proto.unwrap_or_else(|| "tls".into());
        let mut addr = addr.unwrap_or_default();
        let mut port = port.unwrap_or_else(|| "6633".into());
        match field {
            "ip-address" => addr = value.unwrap_or("").to_string(),
            "port" => port = value.unwrap_or("6633").to_string(),
            "protocol" => proto = value.unwrap_or("tls").to_string(),
            other => {
                return Err(OfcError::BadElement(format!(
                    "unknown controller target part '{other}'"
                )));
            }
        }
        row.target = build_target(&proto, &addr, &port);
        Ok(())
    }

    // --- ports (interfaces) ---

    /// Creates a port from a `<port>` subtree; nested leaves dispatch to the
    /// corresponding modifiers inside the same transaction.
    pub fn add_port(&mut self, node: &Element) -> Result<(), OfcError> {
        let name = key_of(node, "name")?;
        self.note(format!("add-port {name}"));
        if self.work.interface_by_name(&name).is_some() {
            return Err(OfcError::DataExists);
        }
        let rid = child(node, "resource-id")
            .and_then(text_of)
            .unwrap_or_else(|| name.clone());
        let (uuid, handle) = self.mint_row();
        let mut row = InterfaceRow {
            uuid,
            name: name.clone(),
            ..Default::default()
        };
        row.external_ids.insert(RESOURCE_ID_KEY.into(), rid.clone());
        self.work.interfaces.push(row);
        self.resmap_ops
            .push(ResMapOp::Insert(rid, uuid, Some(handle)));

        for (_, c) in element_children(node) {
            match c.name.as_str() {
                "name" | "resource-id" => {}
                "requested-number" => self.mod_port_reqnumber(&name, text_of(c).as_deref())?,
                "ipgre-tunnel" | "vxlan-tunnel" | "tunnel" => {
                    self.mod_port_add_tunnel(&name, c)?
                }
                "features" => {
                    if let Some(adv) = child(c, "advertised") {
                        for (_, leaf) in element_children(adv) {
                            self.add_port_advert(&name, leaf)?;
                        }
                    }
                }
                // configuration bits travel over the OpenFlow management
                // channel, not through the database
                "configuration" => {}
                other => warn!("add-port: unknown element {other}"),
            }
        }
        Ok(())
    }

    pub fn del_port(&mut self, name: &str) -> Result<(), OfcError> {
        self.note(format!("del-port {name}"));
        let Some(pos) = self.work.interfaces.iter().position(|i| i.name == name) else {
            return Err(OfcError::DataMissing);
        };
        let iface = self.work.interfaces.remove(pos);
        // detach from any bridge that references it through a Port row
        let dead_ports: Vec<Uuid> = self
            .work
            .ports
            .iter()
            .filter(|p| p.interfaces.contains(&iface.uuid))
            .map(|p| p.uuid)
            .collect();
        for b in self.work.bridges.iter_mut() {
            b.ports.retain(|u| !dead_ports.contains(u));
        }
        self.work.ports.retain(|p| !dead_ports.contains(&p.uuid));
        self.resmap_ops.push(ResMapOp::RemoveUuid(iface.uuid));
        Ok(())
    }

    pub fn mod_port_reqnumber(&mut self, name: &str, value: Option<&str>) -> Result<(), OfcError> {
        self.note(format!("mod-port-reqnumber {name}"));
        let parsed = match value {
            Some(v) => Some(v.parse::<i64>().map_err(|_| {
                OfcError::BadElement(format!("invalid requested-number '{v}'"))
            })?),
            None => None,
        };
        let iface = self
            .work
            .interface_by_name_mut(name)
            .ok_or(OfcError::DataMissing)?;
        iface.ofport_request = parsed;
        Ok(())
    }

    /// Turns a port into a tunnel port according to the tunnel subtree
    /// element (`ipgre-tunnel`, `vxlan-tunnel`, or the generic `tunnel`).
    pub fn mod_port_add_tunnel(&mut self, name: &str, tunnel: &Element) -> Result<(), OfcError> {
        self.note(format!("mod-port-add-tunnel {name}"));
        let kind = match tunnel.name.as_str() {
            "ipgre-tunnel" => "gre",
            "vxlan-tunnel" => "vxlan",
            "tunnel" => "gre64",
            other => {
                return Err(OfcError::BadElement(format!("unknown tunnel type '{other}'")));
            }
        };
        let iface = self
            .work
            .interface_by_name_mut(name)
            .ok_or(OfcError::DataMissing)?;
        iface.kind = kind.to_string();
        for (_, leaf) in element_children(tunnel) {
            let Some(value) = text_of(leaf) else { continue };
            match leaf.name.as_str() {
                "local-endpoint-ipv4-adress" => {
                    iface.options.insert("local_ip".into(), value);
                }
                "remote-endpoint-ipv4-adress" => {
                    iface.options.insert("remote_ip".into(), value);
                }
                "checksum-present" => {
                    iface.options.insert("csum".into(), value);
                }
                "key" | "vni" => {
                    iface.options.insert("key".into(), value);
                }
                "key-present" => {}
                other => warn!("tunnel: unknown element {other}"),
            }
        }
        Ok(())
    }

    /// Reverts a tunnel port back to a system port.
    pub fn del_port_tunnel(&mut self, name: &str, _tunnel: &Element) -> Result<(), OfcError> {
        self.note(format!("del-port-tunnel {name}"));
        let iface = self
            .work
            .interface_by_name_mut(name)
            .ok_or(OfcError::DataMissing)?;
        if iface.kind.is_empty() {
            return Err(OfcError::DataMissing);
        }
        iface.kind = String::new();
        for key in ["local_ip", "remote_ip", "csum", "key"] {
            iface.options.shift_remove(key);
        }
        Ok(())
    }

    /// Sets or clears a single tunnel option leaf.
    pub fn mod_port_tunnel_opt(
        &mut self,
        name: &str,
        leaf: &Element,
        value: Option<&str>,
    ) -> Result<(), OfcError> {
        self.note(format!("mod-port-tunnel-opt {name} {}", leaf.name));
        let key = match leaf.name.as_str() {
            "local-endpoint-ipv4-adress" => "local_ip",
            "remote-endpoint-ipv4-adress" => "remote_ip",
            "checksum-present" => "csum",
            "key" | "vni" => "key",
            other => {
                return Err(OfcError::BadElement(format!(
                    "unknown tunnel option '{other}'"
                )));
            }
        };
        let iface = self
            .work
            .interface_by_name_mut(name)
            .ok_or(OfcError::DataMissing)?;
        match value {
            Some(v) => {
                iface.options.insert(key.into(), v.to_string());
            }
            None => {
                iface.options.shift_remove(key);
            }
        }
        Ok(())
    }

    pub fn add_port_advert(&mut self, name: &str, leaf: &Element) -> Result<(), OfcError> {
        self.note(format!("add-port-advert {name} {}", leaf.name));
        let value = text_of(leaf).ok_or_else(|| {
            OfcError::BadElement(format!("empty advertised leaf '{}'", leaf.name))
        })?;
        let iface = self
            .work
            .interface_by_name_mut(name)
            .ok_or(OfcError::DataMissing)?;
        let entry = (leaf.name.clone(), value);
        if iface.advertised.contains(&entry) {
            return Err(OfcError::DataExists);
        }
        iface.advertised.push(entry);
        Ok(())
    }

    pub fn del_port_advert(&mut self, name: &str, leaf: &Element) -> Result<(), OfcError> {
        self.note(format!("del-port-advert {name} {}", leaf.name));
        let value = text_of(leaf).ok_or_else(|| {
            OfcError::BadElement(format!("empty advertised leaf '{}'", leaf.name))
        })?;
        let iface = self
            .work
            .interface_by_name_mut(name)
            .ok_or(OfcError::DataMissing)?;
        let entry = (leaf.name.clone(), value);
        let before = iface.advertised.len();
        iface.advertised.retain(|e| *e != entry);
        if iface.advertised.len() == before {
            return Err(OfcError::DataMissing);
        }
        Ok(())
    }

    // --- queues ---

    /// Creates a queue from a `<queue>` subtree.
    pub fn add_queue(&mut self, node: &Element) -> Result<(), OfcError> {
        let rid = key_of(node, "resource-id")?;
        self.note(format!("add-queue {rid}"));
        if self.work.queue_by_rid(&rid).is_some() {
            return Err(OfcError::DataExists);
        }
        let (uuid, handle) = self.mint_row();
        let mut row = QueueRow {
            uuid,
            ..Default::default()
        };
        row.external_ids.insert(RESOURCE_ID_KEY.into(), rid.clone());
        self.work.queues.push(row);
        self.resmap_ops
            .push(ResMapOp::Insert(rid.clone(), uuid, Some(handle)));

        for (_, c) in element_children(node) {
            match c.name.as_str() {
                "resource-id" => {}
                "id" => self.add_queue_id(&rid, c)?,
                "port" => self.add_queue_port(&rid, c)?,
                "properties" => {
                    for (_, prop) in element_children(c) {
                        self.mod_queue_options(&rid, &prop.name, Some(prop))?;
                    }
                }
                other => warn!("add-queue: unknown element {other}"),
            }
        }
        Ok(())
    }

    pub fn del_queue(&mut self, node: &Element) -> Result<(), OfcError> {
        let rid = key_of(node, "resource-id")?;
        self.note(format!("del-queue {rid}"));
        let uuid = self.work.queue_by_rid(&rid).ok_or(OfcError::DataMissing)?.uuid;
        for qos in self.work.qos.iter_mut() {
            qos.queues.retain(|(_, u)| *u != uuid);
        }
        self.work.queues.retain(|q| q.uuid != uuid);
        self.resmap_ops.push(ResMapOp::RemoveRid(rid));
        Ok(())
    }

    /// Sets the OpenFlow queue id of a queue.
    pub fn add_queue_id(&mut self, rid: &str, leaf: &Element) -> Result<(), OfcError> {
        self.note(format!("add-queue-id {rid}"));
        let id_text = text_of(leaf)
            .ok_or_else(|| OfcError::BadElement("empty queue id".into()))?;
        let id: i64 = id_text
            .parse()
            .map_err(|_| OfcError::BadElement(format!("invalid queue id '{id_text}'")))?;
        let uuid = {
            let queue = self
                .work
                .queue_by_rid_mut(rid)
                .ok_or(OfcError::DataMissing)?;
            queue.external_ids.insert(QUEUE_ID_KEY.into(), id_text);
            queue.uuid
        };
        for qos in self.work.qos.iter_mut() {
            for entry in qos.queues.iter_mut() {
                if entry.1 == uuid {
                    entry.0 = id;
                }
            }
        }
        Ok(())
    }

    pub fn del_queue_id(&mut self, rid: &str, _leaf: &Element) -> Result<(), OfcError> {
        self.note(format!("del-queue-id {rid}"));
        let queue = self
            .work
            .queue_by_rid_mut(rid)
            .ok_or(OfcError::DataMissing)?;
        if queue.external_ids.shift_remove(QUEUE_ID_KEY).is_none() {
            return Err(OfcError::DataMissing);
        }
        Ok(())
    }

    /// Attaches a queue to the named port's QoS map.
    pub fn add_queue_port(&mut self, rid: &str, leaf: &Element) -> Result<(), OfcError> {
        self.note(format!("add-queue-port {rid}"));
        let port_name =
            text_of(leaf).ok_or_else(|| OfcError::BadElement("empty queue port".into()))?;
        let queue = self.work.queue_by_rid(rid).ok_or(OfcError::DataMissing)?;
        let queue_uuid = queue.uuid;
        let queue_id: i64 = queue
            .external_ids
            .get(QUEUE_ID_KEY)
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        let port_uuid = self
            .work
            .port_row_by_name(&port_name)
            .ok_or(OfcError::DataMissing)?
            .uuid;
        let qos_uuid = match self
            .work
            .ports
            .iter()
            .find(|p| p.uuid == port_uuid)
            .and_then(|p| p.qos)
        {
            Some(q) => q,
            None => {
                let (uuid, _handle) = self.mint_row();
                self.work.qos.push(QosRow {
                    uuid,
                    queues: Vec::new(),
                });
                if let Some(p) = self.work.ports.iter_mut().find(|p| p.uuid == port_uuid) {
                    p.qos = Some(uuid);
                }
                uuid
            }
        };
        let qos = self
            .work
            .qos
            .iter_mut()
            .find(|q| q.uuid == qos_uuid)
            .ok_or(OfcError::DataMissing)?;
        if qos.queues.iter().any(|(_, u)| *u == queue_uuid) {
            return Err(OfcError::DataExists);
        }
        qos.queues.push((queue_id, queue_uuid));
        Ok(())
    }

    pub fn del_queue_port(&mut self, rid: &str, leaf: &Element) -> Result<(), OfcError> {
        self.note(format!("del-queue-port {rid}"));
        let port_name =
            text_of(leaf).ok_or_else(|| OfcError::BadElement("empty queue port".into()))?;
        let queue_uuid = self.work.queue_by_rid(rid).ok_or(OfcError::DataMissing)?.uuid;
        let qos_uuid = self
            .work
            .port_row_by_name(&port_name)
            .and_then(|p| p.qos)
            .ok_or(OfcError::DataMissing)?;
        let qos = self
            .work
            .qos
            .iter_mut()
            .find(|q| q.uuid == qos_uuid)
            .ok_or(OfcError::DataMissing)?;
        let before = qos.queues.len();
        qos.queues.retain(|(_, u)| *u != queue_uuid);
        if qos.queues.len() == before {
            return Err(OfcError::DataMissing);
        }
        Ok(())
    }

    /// Sets (`leaf = Some`) or clears (`leaf = None`) one queue property:
    /// `min-rate`, `max-rate`, `experimenter-id`, `experimenter-data`.
    pub fn mod_queue_options(
        &mut self,
        rid: &str,
        option: &str,
        leaf: Option<&Element>,
    ) -> Result<(), OfcError> {
        self.note(format!("mod-queue-options {rid} {option}"));
        if !matches!(
            option,
            "min-rate" | "max-rate" | "experimenter-id" | "experimenter-data"
        ) {
            return Err(OfcError::BadElement(format!(
                "unknown queue property '{option}'"
            )));
        }
        let queue = self
            .work
            .queue_by_rid_mut(rid)
            .ok_or(OfcError::DataMissing)?;
        match leaf.and_then(text_of) {
            Some(v) => {
                queue.other_config.insert(option.into(), v);
            }
            None => {
                queue.other_config.shift_remove(option);
            }
        }
        Ok(())
    }

    // --- flow tables ---

    /// Creates a flow table from a `<flow-table>` subtree; links it into
    /// every bridge under its table id.
    pub fn add_flow_table(&mut self, node: &Element) -> Result<(), OfcError> {
        let table_id = key_of(node, "table-id")?;
        self.note(format!("add-flow-table {table_id}"));
        let id: i64 = table_id
            .parse()
            .map_err(|_| OfcError::BadElement(format!("invalid table-id '{table_id}'")))?;
        if self.work.flow_table_by_id(&table_id).is_some() {
            return Err(OfcError::DataExists);
        }
        let (uuid, handle) = self.mint_row();
        let mut row = FlowTableRow {
            uuid,
            name: child(node, "name").and_then(text_of),
            flow_limit: child(node, "max-entries")
                .and_then(text_of)
                .and_then(|v| v.parse().ok()),
            ..Default::default()
        };
        row.external_ids.insert(TABLE_ID_KEY.into(), table_id);
        if let Some(rid) = child(node, "resource-id").and_then(text_of) {
            row.external_ids.insert(RESOURCE_ID_KEY.into(), rid.clone());
            self.resmap_ops
                .push(ResMapOp::Insert(rid, uuid, Some(handle)));
        }
        self.work.flow_tables.push(row);
        for b in self.work.bridges.iter_mut() {
            b.flow_tables.push((id, uuid));
        }
        Ok(())
    }

    pub fn del_flow_table(&mut self, node: &Element) -> Result<(), OfcError> {
        let table_id = key_of(node, "table-id")?;
        self.note(format!("del-flow-table {table_id}"));
        let uuid = self
            .work
            .flow_table_by_id(&table_id)
            .ok_or(OfcError::DataMissing)?
            .uuid;
        for b in self.work.bridges.iter_mut() {
            b.flow_tables.retain(|(_, u)| *u != uuid);
        }
        self.work.flow_tables.retain(|t| t.uuid != uuid);
        self.resmap_ops.push(ResMapOp::RemoveUuid(uuid));
        Ok(())
    }

    pub fn mod_flowtable_name(
        &mut self,
        table_id: &str,
        value: Option<&str>,
    ) -> Result<(), OfcError> {
        self.note(format!("mod-flowtable-name {table_id}"));
        let table = self
            .work
            .flow_table_by_id_mut(table_id)
            .ok_or(OfcError::DataMissing)?;
        table.name = value.map(str::to_string);
        Ok(())
    }

    pub fn mod_flowtable_resid(
        &mut self,
        table_id: &str,
        value: Option<&str>,
    ) -> Result<(), OfcError> {
        self.note(format!("mod-flowtable-resid {table_id}"));
        let table = self
            .work
            .flow_table_by_id_mut(table_id)
            .ok_or(OfcError::DataMissing)?;
        let uuid = table.uuid;
        let old = match value {
            Some(v) => table
                .external_ids
                .insert(RESOURCE_ID_KEY.into(), v.to_string()),
            None => table.external_ids.shift_remove(RESOURCE_ID_KEY),
        };
        if let Some(old_rid) = old {
            self.resmap_ops.push(ResMapOp::RemoveRid(old_rid));
        }
        if let Some(v) = value {
            self.resmap_ops
                .push(ResMapOp::Insert(v.to_string(), uuid, None));
        }
        Ok(())
    }

    // --- certificates ---

    /// Stores an owned certificate (certificate + private key) on the shared
    /// SSL row, creating the row when absent. Both certificate kinds share
    /// one row and therefore one UUID, so neither enters the resource map.
    pub fn add_owned_certificate(&mut self, node: &Element) -> Result<(), OfcError> {
        let rid = key_of(node, "resource-id")?;
        self.note(format!("add-owned-certificate {rid}"));
        let certificate = child(node, "certificate").and_then(text_of);
        let private_key = child(node, "private-key").map(flatten_text);
        let ssl = self.ssl_row();
        if ssl.external_ids.contains_key(OWNED_CERT_KEY) {
            return Err(OfcError::DataExists);
        }
        ssl.certificate = certificate;
        ssl.private_key = private_key;
        ssl.external_ids.insert(OWNED_CERT_KEY.into(), rid);
        Ok(())
    }

    pub fn del_owned_certificate(&mut self, node: &Element) -> Result<(), OfcError> {
        let rid = key_of(node, "resource-id")?;
        self.note(format!("del-owned-certificate {rid}"));
        let ssl = self.work.ssl.as_mut().ok_or(OfcError::DataMissing)?;
        if ssl.external_ids.get(OWNED_CERT_KEY) != Some(&rid) {
            return Err(OfcError::DataMissing);
        }
        ssl.certificate = None;
        ssl.private_key = None;
        ssl.external_ids.shift_remove(OWNED_CERT_KEY);
        self.drop_ssl_if_unused();
        Ok(())
    }

    /// Stores an external (CA) certificate on the shared SSL row.
    pub fn add_external_certificate(&mut self, node: &Element) -> Result<(), OfcError> {
        let rid = key_of(node, "resource-id")?;
        self.note(format!("add-external-certificate {rid}"));
        let certificate = child(node, "certificate").and_then(text_of);
        let ssl = self.ssl_row();
        if ssl.external_ids.contains_key(EXTERNAL_CERT_KEY) {
            return Err(OfcError::DataExists);
        }
        ssl.ca_cert = certificate;
        ssl.external_ids.insert(EXTERNAL_CERT_KEY.into(), rid);
        Ok(())
    }

    pub fn del_external_certificate(&mut self, node: &Element) -> Result<(), OfcError> {
        let rid = key_of(node, "resource-id")?;
        self.note(format!("del-external-certificate {rid}"));
        let ssl = self.work.ssl.as_mut().ok_or(OfcError::DataMissing)?;
        if ssl.external_ids.get(EXTERNAL_CERT_KEY) != Some(&rid) {
            return Err(OfcError::DataMissing);
        }
        ssl.ca_cert = None;
        ssl.external_ids.shift_remove(EXTERNAL_CERT_KEY);
        self.drop_ssl_if_unused();
        Ok(())
    }

    fn ssl_row(&mut self) -> &mut SslRow {
        if self.work.ssl.is_none() {
            let (uuid, _handle) = self.mint_row();
            self.work.ssl = Some(SslRow {
                uuid,
                ..Default::default()
            });
        }
        self.work.ssl.as_mut().expect("ssl row just ensured")
    }

    fn drop_ssl_if_unused(&mut self) {
        if self
            .work
            .ssl
            .as_ref()
            .is_some_and(|s| s.external_ids.is_empty())
        {
            self.work.ssl = None;
        }
    }
}

impl Drop for Txn {
    fn drop(&mut self) {
        self.client.release_txn();
        if !self.done {
            debug!("open transaction dropped without commit");
        }
    }
}

/// Builds an OVSDB controller target, bracketing IPv6 addresses.
fn build_target(protocol: &str, addr: &str, port: &str) -> String {
    if addr.contains(':') {
        format!("{protocol}:[{addr}]:{port}")
    } else {
        format!("{protocol}:{addr}:{port}")
    }
}

/// Concatenated text of an element subtree, for opaque values such as a
/// private key carried under a key-type wrapper.
fn flatten_text(el: &Element) -> String {
    fn walk(el: &Element, out: &mut String) {
        for c in &el.children {
            match c {
                xmltree::XMLNode::Text(t) => {
                    let t = t.trim();
                    if !t.is_empty() {
                        if !out.is_empty() {
                            out.push(' ');
                        }
                        out.push_str(t);
                    }
                }
                xmltree::XMLNode::Element(e) => walk(e, out),
                _ => {}
            }
        }
    }
    let mut out = String::new();
    walk(el, &mut out);
    out
}
