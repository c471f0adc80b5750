// src/core/xml.rs

//! Small helpers over the `xmltree` element tree.
//!
//! All three datastores and the edit engine work on XML trees end-to-end.
//! Nodes inside a document are addressed by index paths (`&[usize]` into the
//! `children` vectors), since the tree carries no parent links.

use crate::core::errors::OfcError;
use xmltree::{Element, EmitterConfig, XMLNode};

/// The NETCONF base namespace. Edit data carrying this namespace (or none at
/// all) matches elements in any namespace, per the RFC 6241 wildcard rule.
pub const NC_NS_BASE: &str = "urn:ietf:params:xml:ns:netconf:base:1.0";

/// The OF-CONFIG YANG module namespace used in rendered documents.
pub const OFC_NS: &str = "urn:onf:config:yang";

/// An XML document: at most one root element. An empty document is a valid
/// state for the startup and candidate datastores.
#[derive(Debug, Clone, Default)]
pub struct XmlDoc {
    pub root: Option<Element>,
}

impl XmlDoc {
    /// Parses a document from text. Blank text nodes are stripped so that
    /// formatted input compares equal to compact input. An empty (or
    /// whitespace-only) input yields an empty document.
    pub fn parse(text: &str) -> Result<Self, OfcError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let mut root = Element::parse(text.as_bytes())?;
        strip_blank_text(&mut root);
        Ok(Self { root: Some(root) })
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Serializes the document without an XML declaration, for embedding in
    /// an rpc-reply. An empty document dumps to an empty string.
    pub fn dump(&self) -> Result<String, OfcError> {
        self.write(EmitterConfig::new().write_document_declaration(false))
    }

    /// Serializes the document formatted and with the XML declaration, for
    /// persistent storage.
    pub fn dump_formatted(&self) -> Result<String, OfcError> {
        self.write(
            EmitterConfig::new()
                .perform_indent(true)
                .write_document_declaration(true),
        )
    }

    fn write(&self, config: EmitterConfig) -> Result<String, OfcError> {
        let Some(root) = &self.root else {
            return Ok(String::new());
        };
        let mut buf = Vec::new();
        root.write_with_config(&mut buf, config)?;
        Ok(String::from_utf8(buf)?)
    }
}

/// Recursively removes whitespace-only text nodes, the equivalent of parsing
/// with blanks ignored.
pub fn strip_blank_text(el: &mut Element) {
    el.children.retain(|c| match c {
        XMLNode::Text(t) => !t.trim().is_empty(),
        XMLNode::Element(_) | XMLNode::CData(_) => true,
        _ => false,
    });
    for child in el.children.iter_mut() {
        if let XMLNode::Element(e) = child {
            strip_blank_text(e);
        }
    }
}

/// Returns the element at the given index path, or `None` when the path
/// does not lead to an element.
pub fn node_at<'a>(root: &'a Element, path: &[usize]) -> Option<&'a Element> {
    let mut cur = root;
    for &i in path {
        cur = match cur.children.get(i)? {
            XMLNode::Element(e) => e,
            _ => return None,
        };
    }
    Some(cur)
}

/// Mutable variant of [`node_at`].
pub fn node_at_mut<'a>(root: &'a mut Element, path: &[usize]) -> Option<&'a mut Element> {
    let mut cur = root;
    for &i in path {
        cur = match cur.children.get_mut(i)? {
            XMLNode::Element(e) => e,
            _ => return None,
        };
    }
    Some(cur)
}

/// Unlinks the node at `path` from the tree under `root`. The root itself
/// (empty path) cannot be removed here; the caller owns the document.
pub fn remove_at(root: &mut Element, path: &[usize]) -> bool {
    let Some((&last, parent_path)) = path.split_last() else {
        return false;
    };
    match node_at_mut(root, parent_path) {
        Some(parent) if last < parent.children.len() => {
            parent.children.remove(last);
            true
        }
        _ => false,
    }
}

/// Iterates the element children of a node together with their child index.
pub fn element_children(el: &Element) -> impl Iterator<Item = (usize, &Element)> {
    el.children.iter().enumerate().filter_map(|(i, c)| match c {
        XMLNode::Element(e) => Some((i, e)),
        _ => None,
    })
}

/// Finds the first child element with the given local name.
pub fn child<'a>(el: &'a Element, name: &str) -> Option<&'a Element> {
    element_children(el).map(|(_, e)| e).find(|e| e.name == name)
}

/// The trimmed text content of an element, `None` when the element has no
/// non-blank text.
pub fn text_of(el: &Element) -> Option<String> {
    for c in &el.children {
        if let XMLNode::Text(t) = c {
            let t = t.trim();
            if !t.is_empty() {
                return Some(t.to_string());
            }
        }
    }
    None
}

/// The text of the named key child. A list entry without its key is a
/// malformed payload.
pub fn key_of(el: &Element, key: &str) -> Result<String, OfcError> {
    child(el, key)
        .and_then(text_of)
        .ok_or_else(|| OfcError::BadElement(format!("invalid key of {}", el.name)))
}

/// Namespace comparison with the RFC 6241 wildcard rule: edit data with a
/// missing, empty, or base-NETCONF namespace matches any element namespace.
pub fn ns_matches(edit: &Element, node: &Element) -> bool {
    match edit.namespace.as_deref().map(str::trim) {
        None | Some("") | Some(NC_NS_BASE) => true,
        Some(ns) => node.namespace.as_deref() == Some(ns),
    }
}

/// The value of the `operation` attribute, if present. The NETCONF base
/// namespace is the only one defining this attribute, so it is looked up
/// by local name regardless of how the parser keyed the prefix.
pub fn operation_attr(el: &Element) -> Option<&str> {
    el.attributes
        .get("operation")
        .or_else(|| {
            el.attributes
                .iter()
                .find(|(k, _)| k.ends_with(":operation"))
                .map(|(_, v)| v)
        })
        .map(String::as_str)
}

pub fn remove_operation_attr(el: &mut Element) {
    el.attributes
        .retain(|k, _| k != "operation" && !k.ends_with(":operation"));
}

/// Escapes text for direct inclusion in hand-built XML markup.
pub fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
