// src/core/edit/matching.rs

//! Element matching for edit-config: schema defaults, list keys, the
//! NETCONF equivalence rules, and equivalent-node lookup between the edit
//! document and the configuration being edited.

use crate::core::xml::{XmlDoc, child, element_children, ns_matches, node_at, text_of};
use xmltree::Element;

/// The schema default value of a leaf, when one is defined. Keyed by the
/// leaf name and, where needed, its parent.
pub fn default_value(name: &str, parent: Option<&str>) -> Option<&'static str> {
    match name {
        "lost-connection-behavior" => Some("failSecureMode"),
        "port" if parent == Some("controller") => Some("6633"),
        "protocol" => Some("tls"),
        "checksum-present" | "key-present" | "auto-negotiate" => Some("true"),
        "no-receive" | "no-forward" | "no-packet-in" => Some("false"),
        "admin-state" => Some("up"),
        _ => None,
    }
}

/// Whether an element is the key leaf of a list instance. The list→key
/// mapping is a fixed table; no YANG introspection happens at runtime.
pub fn is_key(name: &str, parent: Option<&str>) -> bool {
    match name {
        "id" => matches!(parent, Some("switch") | Some("controller")),
        "table-id" => true,
        "name" => parent != Some("flow-table"),
        "resource-id" => parent != Some("flow-table"),
        _ => false,
    }
}

/// Decides whether two elements are equal for NETCONF purposes: names and
/// namespaces agree (with the wildcard rule on the edit side), and either
/// both are leaf-list-like entries with equal text, or their designated key
/// children match. `parent`/`grandparent` are the local names of the
/// matched node's ancestors.
pub fn matching_elements(
    edit: &Element,
    node: &Element,
    parent: Option<&str>,
    grandparent: Option<&str>,
) -> bool {
    if edit.name != node.name {
        return false;
    }
    if !ns_matches(edit, node) {
        return false;
    }

    // leaf-list-like entries compare by their text content; the `port`
    // case only fires for leaf-refs, since a full port list entry has no
    // text child
    let text_compared = matches!(node.name.as_str(), "queue" | "flow-table" | "rate" | "medium")
        || (node.name == "port" && parent == Some("resources"));
    if text_compared
        && let (Some(t1), Some(t2)) = (text_of(edit), text_of(node))
    {
        return t1 == t2;
    }

    // designated list keys
    let key = match node.name.as_str() {
        "controller" | "switch" => "id",
        "port" if grandparent == Some("capable-switch") => "name",
        "flow-table" if grandparent == Some("capable-switch") => "table-id",
        "queue" | "owned-certificate" | "external-certificate"
            if grandparent == Some("capable-switch") =>
        {
            "resource-id"
        }
        _ => return true,
    };
    match (
        child(edit, key).and_then(text_of),
        child(node, key).and_then(text_of),
    ) {
        (Some(k1), Some(k2)) => k1 == k2,
        _ => false,
    }
}

/// The local names of the nodes along `path` in the edit document,
/// excluding the node itself: (parent, grandparent) of the last element.
pub fn ancestor_names(root: &Element, path: &[usize]) -> (Option<String>, Option<String>) {
    let parent = path
        .split_last()
        .and_then(|(_, p)| node_at(root, p))
        .map(|e| e.name.clone());
    let grandparent = if path.len() >= 2 {
        node_at(root, &path[..path.len() - 2]).map(|e| e.name.clone())
    } else {
        None
    };
    (parent, grandparent)
}

/// Finds the equivalent of the edit node at `path` inside `orig`, walking
/// the ancestor chain from the root and matching level by level. Returns
/// the index path of the equivalent, or `None`.
pub fn find_equiv(orig: &XmlDoc, edit_root: &Element, path: &[usize]) -> Option<Vec<usize>> {
    let orig_root = orig.root.as_ref()?;
    if !matching_elements(edit_root, orig_root, None, None) {
        return None;
    }
    let mut orig_path: Vec<usize> = Vec::with_capacity(path.len());
    for depth in 0..path.len() {
        let edit_node = node_at(edit_root, &path[..=depth])?;
        let (parent, grandparent) = ancestor_names(edit_root, &path[..=depth]);
        let orig_parent = node_at(orig_root, &orig_path)?;
        let (idx, _) = element_children(orig_parent).find(|(_, cand)| {
            matching_elements(edit_node, cand, parent.as_deref(), grandparent.as_deref())
        })?;
        orig_path.push(idx);
    }
    Some(orig_path)
}
