// src/core/edit/apply.rs

//! Application of the individual edit-config operations: the per-node
//! semantic dispatch into database mutations and OpenFlow port-mod calls
//! for the running datastore, and structural tree edits for the XML
//! mirrors.

use super::ApplyTarget;
use super::matching::{find_equiv, is_key};
use crate::core::errors::OfcError;
use crate::core::openflow::PortBit;
use crate::core::xml::{
    XmlDoc, child, key_of, node_at, node_at_mut, remove_at, remove_operation_attr, text_of,
};
use tracing::{debug, warn};
use xmltree::{Element, XMLNode};

const TUNNEL_NAMES: [&str; 3] = ["ipgre-tunnel", "vxlan-tunnel", "tunnel"];
const ENDPOINT_NAMES: [&str; 2] = [
    "local-endpoint-ipv4-adress",
    "remote-endpoint-ipv4-adress",
];

/// The node under edit together with clones of the ancestors the dispatch
/// tables key on. Clones keep the borrow of the document short.
struct Ctx {
    node: Element,
    parent: Option<Element>,
    grandparent: Option<Element>,
    great: Option<Element>,
}

impl Ctx {
    fn of(root: &Element, path: &[usize]) -> Option<Self> {
        let node = node_at(root, path)?.clone();
        let at = |depth_back: usize| {
            path.len()
                .checked_sub(depth_back)
                .and_then(|n| node_at(root, &path[..n]))
                .cloned()
        };
        Some(Self {
            node,
            parent: at(1),
            grandparent: at(2),
            great: at(3),
        })
    }

    fn parent_name(&self) -> Option<&str> {
        self.parent.as_ref().map(|e| e.name.as_str())
    }

    fn grandparent_name(&self) -> Option<&str> {
        self.grandparent.as_ref().map(|e| e.name.as_str())
    }
}

fn first_element_child(el: &Element) -> Option<usize> {
    el.children.iter().position(|c| matches!(c, XMLNode::Element(_)))
}

/// Unlinks the node at `path`; an empty path removes the document root.
fn unlink(doc: &mut XmlDoc, path: &[usize]) {
    if path.is_empty() {
        doc.root = None;
    } else if let Some(root) = doc.root.as_mut() {
        remove_at(root, path);
    }
}

/// Performs the "delete" semantics on the node at `path` inside `doc`.
///
/// When `apply` is true and the target is the running datastore, the change
/// dispatches into the open transaction (or the OpenFlow port mutator);
/// otherwise the node is only unlinked. Deletion is recursive for pure
/// container nodes, mirroring how the model hangs typed rows off them.
pub fn delete_node(
    doc: &mut XmlDoc,
    path: &[usize],
    target: &mut ApplyTarget,
    apply: bool,
) -> Result<(), OfcError> {
    let dispatch = apply && matches!(target, ApplyTarget::Running { .. });
    if !dispatch {
        unlink(doc, path);
        return Ok(());
    }

    let Some(root) = doc.root.as_ref() else {
        return Ok(());
    };
    if path.is_empty() {
        // removing the whole capable-switch maps to removing every governed
        // row
        if let ApplyTarget::Running { txn, .. } = target {
            txn.del_all()?;
        }
        doc.root = None;
        return Ok(());
    }
    let Some(ctx) = Ctx::of(root, path) else {
        return Ok(());
    };
    debug!("deleting node {}", ctx.node.name);

    // container nodes whose children map to rows of their own
    if is_delete_container(&ctx) {
        loop {
            let Some(ci) = doc
                .root
                .as_ref()
                .and_then(|r| node_at(r, path))
                .and_then(first_element_child)
            else {
                break;
            };
            let mut child_path = path.to_vec();
            child_path.push(ci);
            delete_node(doc, &child_path, target, apply)?;
        }
        unlink(doc, path);
        return Ok(());
    }

    if ctx.node.name == "features" {
        // delegate to the advertised child, then drop the wrapper
        if let Some(root) = doc.root.as_ref()
            && let Some(node) = node_at(root, path)
            && let Some(ai) = node.children.iter().position(
                |c| matches!(c, XMLNode::Element(e) if e.name == "advertised"),
            )
        {
            let mut child_path = path.to_vec();
            child_path.push(ai);
            delete_node(doc, &child_path, target, apply)?;
        }
        unlink(doc, path);
        return Ok(());
    }

    dispatch_delete(&ctx, target)?;
    unlink(doc, path);
    Ok(())
}

fn is_delete_container(ctx: &Ctx) -> bool {
    let name = ctx.node.name.as_str();
    match ctx.parent_name() {
        Some("capable-switch") => matches!(name, "resources" | "logical-switches"),
        Some("switch") => name == "controllers",
        Some("queue") => name == "properties",
        _ => false,
    }
}

fn dispatch_delete(ctx: &Ctx, target: &mut ApplyTarget) -> Result<(), OfcError> {
    let ApplyTarget::Running {
        txn,
        of,
        switch_id,
    } = target
    else {
        return Ok(());
    };
    let name = ctx.node.name.as_str();
    let parent = ctx.parent_name();
    let grandparent = ctx.grandparent_name();

    match (name, parent) {
        ("id", Some("capable-switch")) => {
            **switch_id = None;
            Ok(())
        }
        (_, Some("resources")) if grandparent == Some("capable-switch") => match name {
            "port" => txn.del_port(&key_of(&ctx.node, "name")?),
            "queue" => txn.del_queue(&ctx.node),
            "owned-certificate" => txn.del_owned_certificate(&ctx.node),
            "external-certificate" => txn.del_external_certificate(&ctx.node),
            "flow-table" => txn.del_flow_table(&ctx.node),
            other => {
                warn!("delete: unknown element {other} (parent: resources)");
                Ok(())
            }
        },
        (_, Some("resources")) => {
            // resources of a logical switch hold leaf-refs
            let bridge = key_of(
                ctx.grandparent.as_ref().ok_or(OfcError::DataMissing)?,
                "id",
            )?;
            let leafref = text_of(&ctx.node).ok_or_else(|| {
                OfcError::BadElement(format!("invalid resources leafref '{name}'"))
            })?;
            match name {
                "port" => txn.del_bridge_port(&bridge, &leafref),
                // queue and flow-table references resolve through their own
                // rows; a defined certificate is used by every bridge
                "queue" | "flow-table" | "certificate" => Ok(()),
                other => {
                    warn!("delete: unknown leafref {other}");
                    Ok(())
                }
            }
        }
        (_, Some("private-key")) => txn.del_owned_certificate(
            ctx.grandparent.as_ref().ok_or(OfcError::DataMissing)?,
        ),
        (_, Some("owned-certificate")) => {
            txn.del_owned_certificate(ctx.parent.as_ref().ok_or(OfcError::DataMissing)?)
        }
        (_, Some("external-certificate")) => {
            txn.del_external_certificate(ctx.parent.as_ref().ok_or(OfcError::DataMissing)?)
        }
        ("switch", _) => txn.del_bridge(&key_of(&ctx.node, "id")?),
        (_, Some("switch")) => {
            let bridge = key_of(ctx.parent.as_ref().ok_or(OfcError::DataMissing)?, "id")?;
            match name {
                "datapath-id" => txn.mod_bridge_datapath(&bridge, None),
                "lost-connection-behavior" => txn.mod_bridge_failmode(&bridge, None),
                // the key cannot be deleted; `enabled` is left alone
                _ => Ok(()),
            }
        }
        (_, Some("queue")) => {
            let rid = key_of(
                ctx.parent.as_ref().ok_or(OfcError::DataMissing)?,
                "resource-id",
            )?;
            match name {
                "id" => txn.del_queue_id(&rid, &ctx.node),
                "port" => txn.del_queue_port(&rid, &ctx.node),
                _ => Ok(()),
            }
        }
        (_, Some("properties")) => {
            let rid = key_of(
                ctx.grandparent.as_ref().ok_or(OfcError::DataMissing)?,
                "resource-id",
            )?;
            txn.mod_queue_options(&rid, name, None)
        }
        (_, Some("flow-table")) => {
            let table_id = key_of(ctx.parent.as_ref().ok_or(OfcError::DataMissing)?, "table-id")?;
            match name {
                "name" => txn.mod_flowtable_name(&table_id, None),
                "resource-id" => txn.mod_flowtable_resid(&table_id, None),
                _ => Ok(()),
            }
        }
        ("controller", _) => {
            let id = key_of(&ctx.node, "id")?;
            let bridge = key_of(
                ctx.grandparent.as_ref().ok_or(OfcError::DataMissing)?,
                "id",
            )?;
            txn.del_controller(&id, &bridge)
        }
        (_, Some("controller")) => {
            let id = key_of(ctx.parent.as_ref().ok_or(OfcError::DataMissing)?, "id")?;
            match name {
                "local-ip-address" => txn.mod_controller_lip(&id, None),
                "ip-address" | "port" | "protocol" => {
                    txn.mod_controller_target(&id, name, None)
                }
                _ => Ok(()),
            }
        }
        ("requested-number", _) => {
            let port = key_of(ctx.parent.as_ref().ok_or(OfcError::DataMissing)?, "name")?;
            txn.mod_port_reqnumber(&port, None)
        }
        (_, Some(p)) if TUNNEL_NAMES.contains(&p) => {
            let port = key_of(
                ctx.grandparent.as_ref().ok_or(OfcError::DataMissing)?,
                "name",
            )?;
            txn.mod_port_tunnel_opt(&port, &ctx.node, None)
        }
        (t, _) if TUNNEL_NAMES.contains(&t) => {
            let port = key_of(ctx.parent.as_ref().ok_or(OfcError::DataMissing)?, "name")?;
            txn.del_port_tunnel(&port, &ctx.node)
        }
        (bit_name, _) if PortBit::from_leaf(bit_name).is_some() => {
            let port = key_of(
                ctx.grandparent.as_ref().ok_or(OfcError::DataMissing)?,
                "name",
            )?;
            let bridge = txn.state().bridge_with_port(&port).map(|b| b.name.clone());
            // deleting the leaf resets the bit to its default
            of.set_port_bit(
                bridge.as_deref(),
                &port,
                PortBit::from_leaf(bit_name).expect("bit name just matched"),
                None,
            )
        }
        ("advertised", _) => {
            let port = key_of(
                ctx.grandparent.as_ref().ok_or(OfcError::DataMissing)?,
                "name",
            )?;
            for c in &ctx.node.children {
                if let XMLNode::Element(leaf) = c {
                    txn.del_port_advert(&port, leaf)?;
                }
            }
            Ok(())
        }
        (_, Some("advertised")) => {
            let port = key_of(ctx.great.as_ref().ok_or(OfcError::DataMissing)?, "name")?;
            txn.del_port_advert(&port, &ctx.node)
        }
        (e, _) if ENDPOINT_NAMES.contains(&e) => Ok(()),
        (other, p) => {
            warn!("delete: unknown element {other} (parent: {p:?})");
            Ok(())
        }
    }
}

/// Ensures the ancestors of an edit node exist in the mirror document and
/// returns the path of the created/found parent. Ancestors are created as
/// shallow copies.
fn create_parents(orig: &mut XmlDoc, edit_root: &Element, path: &[usize]) -> Result<Vec<usize>, OfcError> {
    let mut orig_path: Vec<usize> = Vec::new();
    if orig.root.is_none() {
        orig.root = Some(shallow_copy(edit_root));
    }
    for depth in 0..path.len() {
        let edit_node = node_at(edit_root, &path[..=depth])
            .ok_or_else(|| OfcError::OperationFailed("edit node vanished".into()))?;
        let found = find_equiv(orig, edit_root, &path[..=depth]);
        match found {
            Some(p) => orig_path = p,
            None => {
                let parent = node_at_mut(orig.root.as_mut().expect("root ensured"), &orig_path)
                    .ok_or_else(|| OfcError::OperationFailed("mirror parent vanished".into()))?;
                parent
                    .children
                    .push(XMLNode::Element(shallow_copy(edit_node)));
                orig_path.push(parent.children.len() - 1);
            }
        }
    }
    Ok(orig_path)
}

fn shallow_copy(el: &Element) -> Element {
    let mut copy = el.clone();
    copy.children.clear();
    remove_operation_attr(&mut copy);
    copy
}

fn deep_copy(el: &Element) -> Element {
    let mut copy = el.clone();
    remove_operation_attr(&mut copy);
    copy
}

/// Performs the "create" semantics on the edit node at `path`: typed
/// mutations for the running datastore, a subtree clone into the mirror
/// otherwise. The node is consumed from the edit document.
pub fn create_node(
    orig: &mut XmlDoc,
    edit: &mut XmlDoc,
    path: &[usize],
    target: &mut ApplyTarget,
) -> Result<(), OfcError> {
    if let Some(root) = edit.root.as_mut()
        && let Some(node) = node_at_mut(root, path)
    {
        remove_operation_attr(node);
    }
    let Some(root) = edit.root.as_ref() else {
        return Ok(());
    };
    let Some(ctx) = Ctx::of(root, path) else {
        return Ok(());
    };
    debug!("creating node {}", ctx.node.name);

    match target {
        ApplyTarget::Running { .. } => {
            if path.is_empty() || is_create_container(&ctx) {
                // nothing to do at this level, continue with the children
                loop {
                    let Some(ci) = edit
                        .root
                        .as_ref()
                        .and_then(|r| node_at(r, path))
                        .and_then(first_element_child)
                    else {
                        break;
                    };
                    let mut child_path = path.to_vec();
                    child_path.push(ci);
                    create_node(orig, edit, &child_path, target)?;
                }
            } else if ctx.node.name == "features" {
                if let Some(node) = edit.root.as_ref().and_then(|r| node_at(r, path))
                    && let Some(ai) = node.children.iter().position(
                        |c| matches!(c, XMLNode::Element(e) if e.name == "advertised"),
                    )
                {
                    let mut child_path = path.to_vec();
                    child_path.push(ai);
                    create_node(orig, edit, &child_path, target)?;
                }
            } else {
                dispatch_create(&ctx, target)?;
            }
        }
        ApplyTarget::Mirror => {
            if path.is_empty() {
                orig.root = Some(deep_copy(&ctx.node));
            } else {
                let parent_path = create_parents(orig, root, &path[..path.len() - 1])?;
                let parent = node_at_mut(
                    orig.root.as_mut().ok_or(OfcError::DataMissing)?,
                    &parent_path,
                )
                .ok_or_else(|| OfcError::OperationFailed("mirror parent vanished".into()))?;
                parent.children.push(XMLNode::Element(deep_copy(&ctx.node)));
            }
        }
    }

    unlink(edit, path);
    Ok(())
}

fn is_create_container(ctx: &Ctx) -> bool {
    let name = ctx.node.name.as_str();
    match ctx.parent_name() {
        Some("capable-switch") => matches!(name, "resources" | "logical-switches"),
        Some("switch") => name == "controllers",
        Some("queue") => name == "properties",
        _ => false,
    }
}

fn dispatch_create(ctx: &Ctx, target: &mut ApplyTarget) -> Result<(), OfcError> {
    let ApplyTarget::Running {
        txn,
        of,
        switch_id,
    } = target
    else {
        return Ok(());
    };
    let name = ctx.node.name.as_str();
    let parent = ctx.parent_name();
    let grandparent = ctx.grandparent_name();
    let value = text_of(&ctx.node);

    match (name, parent) {
        ("id", Some("capable-switch")) => {
            let id = value.ok_or_else(|| OfcError::BadElement("invalid id element".into()))?;
            **switch_id = Some(id);
            Ok(())
        }
        (_, Some("resources")) if grandparent == Some("capable-switch") => match name {
            "port" => {
                txn.add_port(&ctx.node)?;
                // configuration bits ride the management channel, not the
                // transaction
                if let Some(cfg) = child(&ctx.node, "configuration") {
                    let port = key_of(&ctx.node, "name")?;
                    let bridge = txn.state().bridge_with_port(&port).map(|b| b.name.clone());
                    for c in &cfg.children {
                        if let XMLNode::Element(leaf) = c
                            && let Some(bit) = PortBit::from_leaf(&leaf.name)
                        {
                            of.set_port_bit(
                                bridge.as_deref(),
                                &port,
                                bit,
                                text_of(leaf).as_deref(),
                            )?;
                        }
                    }
                }
                Ok(())
            }
            "queue" => txn.add_queue(&ctx.node),
            "owned-certificate" => txn.add_owned_certificate(&ctx.node),
            "external-certificate" => txn.add_external_certificate(&ctx.node),
            "flow-table" => txn.add_flow_table(&ctx.node),
            other => {
                warn!("create: unknown element {other} (parent: resources)");
                Ok(())
            }
        },
        (_, Some("resources")) => {
            let bridge = key_of(
                ctx.grandparent.as_ref().ok_or(OfcError::DataMissing)?,
                "id",
            )?;
            let leafref = value.ok_or_else(|| {
                OfcError::BadElement(format!("invalid resources leafref '{name}'"))
            })?;
            match name {
                "port" => txn.add_bridge_port(&bridge, &leafref),
                // a flow-table link is established when the table is
                // created; queues attach through their port; certificates
                // apply to every bridge
                "flow-table" | "queue" | "certificate" => Ok(()),
                other => {
                    warn!("create: unknown leafref {other}");
                    Ok(())
                }
            }
        }
        (_, Some("private-key")) => txn.add_owned_certificate(
            ctx.grandparent.as_ref().ok_or(OfcError::DataMissing)?,
        ),
        (_, Some("owned-certificate")) => {
            txn.add_owned_certificate(ctx.parent.as_ref().ok_or(OfcError::DataMissing)?)
        }
        (_, Some("external-certificate")) => {
            txn.add_external_certificate(ctx.parent.as_ref().ok_or(OfcError::DataMissing)?)
        }
        ("switch", _) => txn.add_bridge(&ctx.node),
        (_, Some("switch")) => {
            let bridge = key_of(ctx.parent.as_ref().ok_or(OfcError::DataMissing)?, "id")?;
            match name {
                "datapath-id" => txn.mod_bridge_datapath(&bridge, value.as_deref()),
                "lost-connection-behavior" => {
                    txn.mod_bridge_failmode(&bridge, value.as_deref())
                }
                _ => Ok(()),
            }
        }
        (_, Some("queue")) => {
            let rid = key_of(
                ctx.parent.as_ref().ok_or(OfcError::DataMissing)?,
                "resource-id",
            )?;
            match name {
                "id" => txn.add_queue_id(&rid, &ctx.node),
                "port" => txn.add_queue_port(&rid, &ctx.node),
                _ => Ok(()),
            }
        }
        (_, Some("properties")) => {
            let rid = key_of(
                ctx.grandparent.as_ref().ok_or(OfcError::DataMissing)?,
                "resource-id",
            )?;
            txn.mod_queue_options(&rid, name, Some(&ctx.node))
        }
        (_, Some("flow-table")) => {
            let table_id = key_of(ctx.parent.as_ref().ok_or(OfcError::DataMissing)?, "table-id")?;
            match name {
                "name" => txn.mod_flowtable_name(&table_id, value.as_deref()),
                "resource-id" => txn.mod_flowtable_resid(&table_id, value.as_deref()),
                _ => Ok(()),
            }
        }
        ("controller", _) => {
            let bridge = key_of(
                ctx.grandparent.as_ref().ok_or(OfcError::DataMissing)?,
                "id",
            )?;
            txn.add_controller(&ctx.node, &bridge)
        }
        (_, Some("controller")) => {
            let id = key_of(ctx.parent.as_ref().ok_or(OfcError::DataMissing)?, "id")?;
            match name {
                "local-ip-address" => txn.mod_controller_lip(&id, value.as_deref()),
                "ip-address" | "port" | "protocol" => {
                    txn.mod_controller_target(&id, name, value.as_deref())
                }
                _ => Ok(()),
            }
        }
        ("requested-number", _) => {
            let port = key_of(ctx.parent.as_ref().ok_or(OfcError::DataMissing)?, "name")?;
            txn.mod_port_reqnumber(&port, value.as_deref())
        }
        (_, Some(p)) if TUNNEL_NAMES.contains(&p) => {
            let port = key_of(
                ctx.grandparent.as_ref().ok_or(OfcError::DataMissing)?,
                "name",
            )?;
            txn.mod_port_tunnel_opt(&port, &ctx.node, value.as_deref())
        }
        (t, _) if TUNNEL_NAMES.contains(&t) => {
            let port = key_of(ctx.parent.as_ref().ok_or(OfcError::DataMissing)?, "name")?;
            txn.mod_port_add_tunnel(&port, &ctx.node)
        }
        (bit_name, _) if PortBit::from_leaf(bit_name).is_some() => {
            let port = key_of(
                ctx.grandparent.as_ref().ok_or(OfcError::DataMissing)?,
                "name",
            )?;
            let bridge = txn.state().bridge_with_port(&port).map(|b| b.name.clone());
            of.set_port_bit(
                bridge.as_deref(),
                &port,
                PortBit::from_leaf(bit_name).expect("bit name just matched"),
                value.as_deref(),
            )
        }
        ("advertised", _) => {
            let port = key_of(
                ctx.grandparent.as_ref().ok_or(OfcError::DataMissing)?,
                "name",
            )?;
            for c in &ctx.node.children {
                if let XMLNode::Element(leaf) = c {
                    txn.add_port_advert(&port, leaf)?;
                }
            }
            Ok(())
        }
        (_, Some("advertised")) => {
            let port = key_of(ctx.great.as_ref().ok_or(OfcError::DataMissing)?, "name")?;
            txn.add_port_advert(&port, &ctx.node)
        }
        ("configuration", _) => {
            // the wrapper itself has no row; its leaves dispatch on their own
            for c in &ctx.node.children {
                if let XMLNode::Element(leaf) = c
                    && let Some(bit) = PortBit::from_leaf(&leaf.name)
                {
                    let port =
                        key_of(ctx.parent.as_ref().ok_or(OfcError::DataMissing)?, "name")?;
                    let bridge = txn.state().bridge_with_port(&port).map(|b| b.name.clone());
                    of.set_port_bit(bridge.as_deref(), &port, bit, text_of(leaf).as_deref())?;
                }
            }
            Ok(())
        }
        (e, _) if ENDPOINT_NAMES.contains(&e) => Ok(()),
        (other, p) => {
            warn!("create: unknown element {other} (parent: {p:?})");
            Ok(())
        }
    }
}

/// Performs the "replace" semantics: the matched original is deleted and
/// the edit subtree created in its place; a missing original degenerates to
/// plain creation.
pub fn replace_node(
    orig: &mut XmlDoc,
    edit: &mut XmlDoc,
    path: &[usize],
    target: &mut ApplyTarget,
) -> Result<(), OfcError> {
    let Some(edit_root) = edit.root.as_ref() else {
        // replacing with empty data clears the configuration
        return delete_node(orig, &[], target, true);
    };
    match find_equiv(orig, edit_root, path) {
        None => create_node(orig, edit, path, target),
        Some(orig_path) => {
            delete_node(orig, &orig_path, target, true)?;
            create_node(orig, edit, path, target)
        }
    }
}

/// Performs the "merge" semantics on the edit node at `path`.
pub fn merge_node(
    orig: &mut XmlDoc,
    edit: &mut XmlDoc,
    path: &[usize],
    target: &mut ApplyTarget,
) -> Result<(), OfcError> {
    let Some(edit_root) = edit.root.as_ref() else {
        return Ok(());
    };
    let Some(node) = node_at(edit_root, path) else {
        return Ok(());
    };

    if find_equiv(orig, edit_root, path).is_none() {
        return create_node(orig, edit, path, target);
    }

    let node_name = node.name.clone();
    let parent_name = path
        .split_last()
        .and_then(|(_, p)| node_at(edit_root, p))
        .map(|e| e.name.clone());
    if is_key(&node_name, parent_name.as_deref()) {
        // keys are never merged; the leaf stays in place so its list entry
        // keeps matching, only the operation marker goes
        if let Some(root) = edit.root.as_mut()
            && let Some(node) = node_at_mut(root, path)
        {
            remove_operation_attr(node);
        }
        return Ok(());
    }

    let leaf = node
        .children
        .first()
        .is_some_and(|c| matches!(c, XMLNode::Text(_)));
    if leaf {
        // a leaf merge replaces the previous value; new leaf-list entries
        // were already routed to create by the equivalence lookup
        return replace_node(orig, edit, path, target);
    }

    // recurse into the non-key children; each recursion consumes its node
    let mut from = 0;
    loop {
        let Some(node) = edit.root.as_ref().and_then(|r| node_at(r, path)) else {
            return Ok(());
        };
        let next = node
            .children
            .iter()
            .enumerate()
            .skip(from)
            .find_map(|(i, c)| match c {
                XMLNode::Element(e) => Some((i, e.name.clone())),
                _ => None,
            });
        let Some((idx, child_name)) = next else {
            break;
        };
        if is_key(&child_name, Some(node.name.as_str())) {
            from = idx + 1;
            continue;
        }
        let mut child_path = path.to_vec();
        child_path.push(idx);
        merge_node(orig, edit, &child_path, target)?;
        from = idx;
    }

    unlink(edit, path);
    Ok(())
}

/// Helper for the phase-2 relief: checks whether the edit node holds
/// exactly its schema default value.
pub fn holds_default(node: &Element, parent: Option<&str>) -> bool {
    match super::matching::default_value(&node.name, parent) {
        Some(def) => text_of(node).as_deref() == Some(def),
        None => false,
    }
}
