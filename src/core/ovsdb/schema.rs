// src/core/ovsdb/schema.rs

//! Typed rows for the OVSDB tables the OF-CONFIG model governs.
//!
//! Only the columns the management agent reads or writes are carried.
//! String maps keep insertion order so rendered documents are stable.

use indexmap::IndexMap;
use uuid::Uuid;

/// An OVSDB string map column (`external_ids`, `other_config`, `options`).
pub type Smap = IndexMap<String, String>;

/// `external_ids` key under which the OF-CONFIG resource-id is stored for
/// every row that is mapped to the model.
pub const RESOURCE_ID_KEY: &str = "ofc_resource_id";

/// `external_ids` key for the OpenFlow queue id of a Queue row.
pub const QUEUE_ID_KEY: &str = "ofc_queue_id";

/// `external_ids` key for the table id of a FlowTable row.
pub const TABLE_ID_KEY: &str = "ofc_table_id";

/// `external_ids` key for the client-chosen controller id.
pub const CONTROLLER_ID_KEY: &str = "ofc_controller_id";

/// `external_ids` keys for the two certificate resource-ids sharing the SSL
/// row.
pub const OWNED_CERT_KEY: &str = "ofc_owned_resid";
pub const EXTERNAL_CERT_KEY: &str = "ofc_external_resid";

/// An Interface row; this is what an OF-CONFIG `port` maps to.
#[derive(Debug, Clone, Default)]
pub struct InterfaceRow {
    pub uuid: Uuid,
    pub name: String,
    /// Interface type: empty/`system`, or a tunnel type (`gre`, `vxlan`,
    /// `gre64`, `geneve`, `lisp`).
    pub kind: String,
    pub ofport: Option<i64>,
    pub ofport_request: Option<i64>,
    /// Hardware address as `aa:bb:cc:dd:ee:ff`, when known.
    pub mac: Option<String>,
    pub link_state: Option<String>,
    pub options: Smap,
    pub other_config: Smap,
    pub external_ids: Smap,
    /// Advertised features as (leaf name, value) pairs from
    /// `features/advertised`.
    pub advertised: Vec<(String, String)>,
}

/// A Port row: groups interfaces under a bridge.
#[derive(Debug, Clone, Default)]
pub struct PortRow {
    pub uuid: Uuid,
    pub name: String,
    pub interfaces: Vec<Uuid>,
    pub qos: Option<Uuid>,
}

/// A QoS row: carries the queue map of a port.
#[derive(Debug, Clone, Default)]
pub struct QosRow {
    pub uuid: Uuid,
    /// OpenFlow queue id -> Queue row.
    pub queues: Vec<(i64, Uuid)>,
}

#[derive(Debug, Clone, Default)]
pub struct QueueRow {
    pub uuid: Uuid,
    pub other_config: Smap,
    pub external_ids: Smap,
}

#[derive(Debug, Clone, Default)]
pub struct ControllerRow {
    pub uuid: Uuid,
    /// `protocol:address[:port]`, brackets for IPv6 addresses.
    pub target: String,
    pub local_ip: Option<String>,
    pub connection_mode: Option<String>,
    pub is_connected: bool,
    pub external_ids: Smap,
}

#[derive(Debug, Clone, Default)]
pub struct BridgeRow {
    pub uuid: Uuid,
    pub name: String,
    pub fail_mode: Option<String>,
    pub other_config: Smap,
    pub external_ids: Smap,
    pub controllers: Vec<Uuid>,
    pub ports: Vec<Uuid>,
    /// table id -> FlowTable row.
    pub flow_tables: Vec<(i64, Uuid)>,
}

#[derive(Debug, Clone, Default)]
pub struct FlowTableRow {
    pub uuid: Uuid,
    pub name: Option<String>,
    pub flow_limit: Option<i64>,
    pub external_ids: Smap,
}

/// The single SSL row. Owned certificates occupy `certificate` and
/// `private_key`; the external certificate occupies `ca_cert`. Both
/// resource-ids map to this one row's UUID.
#[derive(Debug, Clone, Default)]
pub struct SslRow {
    pub uuid: Uuid,
    pub certificate: Option<String>,
    pub private_key: Option<String>,
    pub ca_cert: Option<String>,
    pub external_ids: Smap,
}

/// The replicated contents of the governed tables.
#[derive(Debug, Clone, Default)]
pub struct DbState {
    pub bridges: Vec<BridgeRow>,
    pub ports: Vec<PortRow>,
    pub interfaces: Vec<InterfaceRow>,
    pub controllers: Vec<ControllerRow>,
    pub qos: Vec<QosRow>,
    pub queues: Vec<QueueRow>,
    pub flow_tables: Vec<FlowTableRow>,
    pub ssl: Option<SslRow>,
}

impl DbState {
    pub fn is_empty(&self) -> bool {
        self.bridges.is_empty()
            && self.ports.is_empty()
            && self.interfaces.is_empty()
            && self.controllers.is_empty()
            && self.qos.is_empty()
            && self.queues.is_empty()
            && self.flow_tables.is_empty()
            && self.ssl.is_none()
    }

    pub fn interface_by_name(&self, name: &str) -> Option<&InterfaceRow> {
        self.interfaces.iter().find(|i| i.name == name)
    }

    pub fn interface_by_name_mut(&mut self, name: &str) -> Option<&mut InterfaceRow> {
        self.interfaces.iter_mut().find(|i| i.name == name)
    }

    /// Resolves a port leaf-ref: the OF-CONFIG resource-id when recorded,
    /// falling back to the interface name.
    pub fn interface_by_ref(&self, leafref: &str) -> Option<&InterfaceRow> {
        self.interfaces
            .iter()
            .find(|i| i.external_ids.get(RESOURCE_ID_KEY).map(String::as_str) == Some(leafref))
            .or_else(|| self.interface_by_name(leafref))
    }

    pub fn bridge_by_name(&self, name: &str) -> Option<&BridgeRow> {
        self.bridges.iter().find(|b| b.name == name)
    }

    pub fn bridge_by_name_mut(&mut self, name: &str) -> Option<&mut BridgeRow> {
        self.bridges.iter_mut().find(|b| b.name == name)
    }

    pub fn queue_by_rid(&self, resource_id: &str) -> Option<&QueueRow> {
        self.queues
            .iter()
            .find(|q| q.external_ids.get(RESOURCE_ID_KEY).map(String::as_str) == Some(resource_id))
    }

    pub fn queue_by_rid_mut(&mut self, resource_id: &str) -> Option<&mut QueueRow> {
        self.queues
            .iter_mut()
            .find(|q| q.external_ids.get(RESOURCE_ID_KEY).map(String::as_str) == Some(resource_id))
    }

    pub fn flow_table_by_id(&self, table_id: &str) -> Option<&FlowTableRow> {
        self.flow_tables
            .iter()
            .find(|t| t.external_ids.get(TABLE_ID_KEY).map(String::as_str) == Some(table_id))
    }

    pub fn flow_table_by_id_mut(&mut self, table_id: &str) -> Option<&mut FlowTableRow> {
        self.flow_tables
            .iter_mut()
            .find(|t| t.external_ids.get(TABLE_ID_KEY).map(String::as_str) == Some(table_id))
    }

    /// A controller is addressed by its OF-CONFIG id: the client-chosen id
    /// when one was recorded, the printed row UUID otherwise.
    pub fn controller_by_id(&self, id: &str) -> Option<&ControllerRow> {
        self.controllers.iter().find(|c| {
            c.external_ids.get(CONTROLLER_ID_KEY).map(String::as_str) == Some(id)
                || c.uuid.to_string() == id
        })
    }

    pub fn controller_by_id_mut(&mut self, id: &str) -> Option<&mut ControllerRow> {
        self.controllers.iter_mut().find(|c| {
            c.external_ids.get(CONTROLLER_ID_KEY).map(String::as_str) == Some(id)
                || c.uuid.to_string() == id
        })
    }

    /// The bridge whose port set contains the interface with the given name.
    pub fn bridge_with_port(&self, port_name: &str) -> Option<&BridgeRow> {
        let iface = self.interface_by_name(port_name)?;
        self.bridges.iter().find(|b| {
            b.ports.iter().any(|pu| {
                self.ports
                    .iter()
                    .find(|p| p.uuid == *pu)
                    .is_some_and(|p| p.interfaces.contains(&iface.uuid))
            })
        })
    }

    pub fn port_row_by_name(&self, name: &str) -> Option<&PortRow> {
        self.ports.iter().find(|p| p.name == name)
    }
}
