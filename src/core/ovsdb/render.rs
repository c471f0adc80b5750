// src/core/ovsdb/render.rs

//! Read-only renderers over the replica: the capable-switch configuration
//! and state documents, built as markup strings the same way the rows are
//! laid out in the database.

use crate::core::ovsdb::schema::{
    CONTROLLER_ID_KEY, ControllerRow, DbState, EXTERNAL_CERT_KEY, OWNED_CERT_KEY, QUEUE_ID_KEY,
    RESOURCE_ID_KEY, TABLE_ID_KEY,
};
use crate::core::resmap::ResourceMap;
use crate::core::xml::{OFC_NS, xml_escape};
use std::fmt::Write;
use uuid::Uuid;

/// Fixed per-bridge capabilities, mirroring what the switch implementation
/// actually supports.
const MAX_BUFFERED_PACKETS: u32 = 256;
const MAX_PORTS: u32 = 255;

const RESERVED_PORT_TYPES: &[&str] =
    &["all", "controller", "table", "inport", "any", "normal", "flood"];
const GROUP_TYPES: &[&str] = &["all", "select", "indirect", "fast-failover"];
const GROUP_CAPABILITIES: &[&str] = &["select-weight", "select-liveness", "chaining-check"];
const ACTION_TYPES: &[&str] = &[
    "set-mpls-ttl",
    "dec-mpls-ttl",
    "push-vlan",
    "pop-vlan",
    "push-mpls",
    "pop-mpls",
    "set-queue",
    "group",
    "set-nw-ttl",
    "dec-nw-ttl",
    "set-field",
];
const INSTRUCTION_TYPES: &[&str] = &[
    "apply-actions",
    "clear-actions",
    "write-actions",
    "write-metadata",
    "goto-table",
];

/// Splits a controller target of the form `protocol:address[:port]`.
/// IPv6 addresses arrive bracketed (`protocol:[addr]:port`) and are
/// returned without the brackets.
pub fn parse_target(target: &str) -> (Option<String>, Option<String>, Option<String>) {
    let Some((proto, rest)) = target.split_once(':') else {
        return (Some(target.to_string()), None, None);
    };
    if let Some(rest) = rest.strip_prefix('[') {
        // bracketed IPv6 form
        match rest.split_once(']') {
            Some((addr, tail)) => {
                let port = tail.strip_prefix(':').map(str::to_string);
                (Some(proto.to_string()), Some(addr.to_string()), port)
            }
            None => (Some(proto.to_string()), Some(rest.to_string()), None),
        }
    } else {
        match rest.split_once(':') {
            Some((addr, port)) => (
                Some(proto.to_string()),
                Some(addr.to_string()),
                Some(port.to_string()),
            ),
            None => (Some(proto.to_string()), Some(rest.to_string()), None),
        }
    }
}

fn leaf(out: &mut String, name: &str, value: &str) {
    let _ = write!(out, "<{name}>{}</{name}>", xml_escape(value));
}

fn opt_leaf(out: &mut String, name: &str, value: Option<&str>) {
    if let Some(v) = value {
        leaf(out, name, v);
    }
}

/// The resource-id for a row UUID: the mapped id when known, the printed
/// UUID otherwise.
fn rid_for(resmap: &ResourceMap, uuid: &Uuid) -> String {
    resmap
        .find_by_uuid(uuid)
        .map(|r| r.resource_id.clone())
        .unwrap_or_else(|| uuid.to_string())
}

/// Renders the running configuration as one capable-switch document.
/// An empty database with no configured switch id renders as an empty
/// document.
pub fn render_config(db: &DbState, resmap: &ResourceMap, switch_id: Option<&str>) -> String {
    if db.is_empty() && switch_id.is_none() {
        return String::new();
    }
    let mut out = String::new();
    let _ = write!(out, "<capable-switch xmlns=\"{OFC_NS}\">");
    opt_leaf(&mut out, "id", switch_id);

    out.push_str("<resources>");
    for iface in &db.interfaces {
        out.push_str("<port>");
        let rid = iface
            .external_ids
            .get(RESOURCE_ID_KEY)
            .cloned()
            .unwrap_or_else(|| rid_for(resmap, &iface.uuid));
        leaf(&mut out, "resource-id", &rid);
        leaf(&mut out, "name", &iface.name);
        if let Some(req) = iface.ofport_request {
            leaf(&mut out, "requested-number", &req.to_string());
        }
        if !iface.advertised.is_empty() {
            out.push_str("<features><advertised>");
            for (name, value) in &iface.advertised {
                leaf(&mut out, name, value);
            }
            out.push_str("</advertised></features>");
        }
        render_tunnel(&mut out, iface.kind.as_str(), &iface.options);
        out.push_str("</port>");
    }
    for queue in &db.queues {
        out.push_str("<queue>");
        let rid = queue
            .external_ids
            .get(RESOURCE_ID_KEY)
            .cloned()
            .unwrap_or_else(|| rid_for(resmap, &queue.uuid));
        leaf(&mut out, "resource-id", &rid);
        opt_leaf(&mut out, "id", queue.external_ids.get(QUEUE_ID_KEY).map(String::as_str));
        if let Some(port) = db.ports.iter().find(|p| {
            p.qos.is_some_and(|q| {
                db.qos
                    .iter()
                    .find(|qos| qos.uuid == q)
                    .is_some_and(|qos| qos.queues.iter().any(|(_, u)| *u == queue.uuid))
            })
        }) {
            leaf(&mut out, "port", &port.name);
        }
        out.push_str("<properties>");
        for key in ["min-rate", "max-rate", "experimenter-id", "experimenter-data"] {
            opt_leaf(&mut out, key, queue.other_config.get(key).map(String::as_str));
        }
        out.push_str("</properties></queue>");
    }
    if let Some(ssl) = &db.ssl {
        if let Some(rid) = ssl.external_ids.get(OWNED_CERT_KEY) {
            out.push_str("<owned-certificate>");
            leaf(&mut out, "resource-id", rid);
            opt_leaf(&mut out, "certificate", ssl.certificate.as_deref());
            opt_leaf(&mut out, "private-key", ssl.private_key.as_deref());
            out.push_str("</owned-certificate>");
        }
        if let Some(rid) = ssl.external_ids.get(EXTERNAL_CERT_KEY) {
            out.push_str("<external-certificate>");
            leaf(&mut out, "resource-id", rid);
            opt_leaf(&mut out, "certificate", ssl.ca_cert.as_deref());
            out.push_str("</external-certificate>");
        }
    }
    for table in &db.flow_tables {
        out.push_str("<flow-table>");
        opt_leaf(
            &mut out,
            "resource-id",
            table.external_ids.get(RESOURCE_ID_KEY).map(String::as_str),
        );
        opt_leaf(
            &mut out,
            "table-id",
            table.external_ids.get(TABLE_ID_KEY).map(String::as_str),
        );
        opt_leaf(&mut out, "name", table.name.as_deref());
        if let Some(limit) = table.flow_limit {
            leaf(&mut out, "max-entries", &limit.to_string());
        }
        out.push_str("</flow-table>");
    }
    out.push_str("</resources>");

    out.push_str("<logical-switches>");
    for bridge in &db.bridges {
        out.push_str("<switch>");
        leaf(&mut out, "id", &bridge.name);
        opt_leaf(
            &mut out,
            "datapath-id",
            bridge.other_config.get("datapath-id").map(String::as_str),
        );
        opt_leaf(
            &mut out,
            "lost-connection-behavior",
            bridge.fail_mode.as_deref(),
        );
        if !bridge.controllers.is_empty() {
            out.push_str("<controllers>");
            for uuid in &bridge.controllers {
                if let Some(c) = db.controllers.iter().find(|c| c.uuid == *uuid) {
                    render_controller_config(&mut out, c);
                }
            }
            out.push_str("</controllers>");
        }
        out.push_str("<resources>");
        for port_uuid in &bridge.ports {
            if let Some(port) = db.ports.iter().find(|p| p.uuid == *port_uuid) {
                for iface_uuid in &port.interfaces {
                    leaf(&mut out, "port", &rid_for(resmap, iface_uuid));
                }
                if let Some(qos) = port.qos.and_then(|q| db.qos.iter().find(|x| x.uuid == q)) {
                    for (_, queue_uuid) in &qos.queues {
                        leaf(&mut out, "queue", &rid_for(resmap, queue_uuid));
                    }
                }
            }
        }
        for (_, table_uuid) in &bridge.flow_tables {
            leaf(&mut out, "flow-table", &rid_for(resmap, table_uuid));
        }
        out.push_str("</resources></switch>");
    }
    out.push_str("</logical-switches></capable-switch>");
    out
}

/// The tunnel sub-element of a port, discriminated by the interface type.
fn render_tunnel(out: &mut String, kind: &str, options: &crate::core::ovsdb::schema::Smap) {
    let (elem, keys): (&str, &[(&str, &str)]) = match kind {
        "gre" => (
            "ipgre-tunnel",
            &[
                ("local_ip", "local-endpoint-ipv4-adress"),
                ("remote_ip", "remote-endpoint-ipv4-adress"),
                ("csum", "checksum-present"),
                ("key", "key"),
            ],
        ),
        "vxlan" => (
            "vxlan-tunnel",
            &[
                ("local_ip", "local-endpoint-ipv4-adress"),
                ("remote_ip", "remote-endpoint-ipv4-adress"),
                ("key", "vni"),
            ],
        ),
        "gre64" | "geneve" | "lisp" => (
            "tunnel",
            &[
                ("local_ip", "local-endpoint-ipv4-adress"),
                ("remote_ip", "remote-endpoint-ipv4-adress"),
            ],
        ),
        _ => return,
    };
    let _ = write!(out, "<{elem}>");
    for (opt, leaf_name) in keys {
        opt_leaf(out, leaf_name, options.get(*opt).map(String::as_str));
    }
    let _ = write!(out, "</{elem}>");
}

fn render_controller_config(out: &mut String, c: &ControllerRow) {
    let (protocol, address, port) = parse_target(&c.target);
    out.push_str("<controller>");
    let id = c
        .external_ids
        .get(CONTROLLER_ID_KEY)
        .cloned()
        .unwrap_or_else(|| c.uuid.to_string());
    leaf(out, "id", &id);
    opt_leaf(out, "ip-address", address.as_deref());
    opt_leaf(out, "port", port.as_deref());
    opt_leaf(out, "protocol", protocol.as_deref());
    if c.connection_mode.as_deref() == Some("in-band") {
        opt_leaf(out, "local-ip-address", c.local_ip.as_deref());
    }
    out.push_str("</controller>");
}

/// Renders the operational state as one capable-switch document.
pub fn render_state(db: &DbState, resmap: &ResourceMap) -> String {
    let mut out = String::new();
    let _ = write!(out, "<capable-switch xmlns=\"{OFC_NS}\">");
    leaf(&mut out, "config-version", "1.2");

    out.push_str("<resources>");
    for iface in &db.interfaces {
        out.push_str("<port>");
        leaf(&mut out, "resource-id", &rid_for(resmap, &iface.uuid));
        leaf(&mut out, "number", &iface.ofport.unwrap_or(0).to_string());
        leaf(&mut out, "name", &iface.name);
        out.push_str("<state>");
        opt_leaf(&mut out, "oper-state", iface.link_state.as_deref());
        opt_leaf(
            &mut out,
            "blocked",
            iface.other_config.get("stp_state").map(String::as_str),
        );
        out.push_str("</state></port>");
    }
    for table in &db.flow_tables {
        out.push_str("<flow-table>");
        leaf(&mut out, "resource-id", &rid_for(resmap, &table.uuid));
        leaf(
            &mut out,
            "max-entries",
            &table.flow_limit.unwrap_or(0).to_string(),
        );
        out.push_str("</flow-table>");
    }
    out.push_str("</resources>");

    out.push_str("<logical-switches>");
    for bridge in &db.bridges {
        out.push_str("<switch>");
        leaf(&mut out, "id", &bridge.name);
        render_capabilities(&mut out);
        if !bridge.controllers.is_empty() {
            out.push_str("<controllers>");
            for uuid in &bridge.controllers {
                if let Some(c) = db.controllers.iter().find(|c| c.uuid == *uuid) {
                    out.push_str("<controller><state>");
                    leaf(
                        &mut out,
                        "connection-state",
                        if c.is_connected { "up" } else { "down" },
                    );
                    out.push_str("</state></controller>");
                }
            }
            out.push_str("</controllers>");
        }
        out.push_str("</switch>");
    }
    out.push_str("</logical-switches></capable-switch>");
    out
}

fn render_capabilities(out: &mut String) {
    out.push_str("<capabilities>");
    leaf(out, "max-buffered-packets", &MAX_BUFFERED_PACKETS.to_string());
    leaf(out, "max-ports", &MAX_PORTS.to_string());
    for stat in [
        "flow-statistics",
        "table-statistics",
        "port-statistics",
        "group-statistics",
        "queue-statistics",
        "reassemble-ip-fragments",
        "block-looping-ports",
    ] {
        leaf(out, stat, "true");
    }
    type_list(out, "reserved-port-types", "type", RESERVED_PORT_TYPES);
    type_list(out, "group-types", "type", GROUP_TYPES);
    type_list(out, "group-capabilities", "capability", GROUP_CAPABILITIES);
    type_list(out, "action-types", "type", ACTION_TYPES);
    type_list(out, "instruction-types", "type", INSTRUCTION_TYPES);
    out.push_str("</capabilities>");
}

fn type_list(out: &mut String, wrapper: &str, item: &str, values: &[&str]) {
    let _ = write!(out, "<{wrapper}>");
    for v in values {
        leaf(out, item, v);
    }
    let _ = write!(out, "</{wrapper}>");
}
