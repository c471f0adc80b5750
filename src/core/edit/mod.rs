// src/core/edit/mod.rs

//! The edit-config processor: a schema-aware XML-tree differ/applier for
//! the NETCONF `merge`/`replace`/`create`/`delete`/`remove` operations.
//!
//! An edit runs in four phases: operation classification with the
//! hierarchy-compatibility check, the existence pre-check (with
//! default-value relief), compaction of redundant operation attributes,
//! and ordered application. Application against the running datastore
//! dispatches typed database mutations and OpenFlow port-mod calls; any
//! other target is edited as a plain XML mirror.

pub mod apply;
pub mod matching;

use crate::core::errors::OfcError;
use crate::core::openflow::PortMutator;
use crate::core::ovsdb::Txn;
use crate::core::xml::{XmlDoc, element_children, node_at, operation_attr, remove_operation_attr};
use std::str::FromStr;
use strum_macros::{Display, EnumString};
use xmltree::Element;

use matching::{ancestor_names, find_equiv};

/// An explicit edit-config operation attached to an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum EditOp {
    Merge,
    Replace,
    Create,
    Delete,
    Remove,
}

impl EditOp {
    fn removes(self) -> bool {
        matches!(self, EditOp::Delete | EditOp::Remove)
    }

    fn creates(self) -> bool {
        matches!(self, EditOp::Create | EditOp::Replace)
    }
}

/// The edit-config default operation. Absence of the element means
/// `merge`; `none` leaves untagged data untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum DefaultOperation {
    #[default]
    Merge,
    Replace,
    None,
}

/// The server's with-defaults basic mode, consulted by the default-value
/// relief rules of the existence pre-check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WithDefaults {
    Explicit,
    #[default]
    ReportAll,
    Trim,
}

/// Where an edit applies: the running datastore (through a transaction and
/// the port mutator) or an in-memory XML mirror (startup, candidate).
pub enum ApplyTarget<'a> {
    Running {
        txn: &'a mut Txn,
        of: &'a dyn PortMutator,
        switch_id: &'a mut Option<String>,
    },
    Mirror,
}

/// The explicit operation of an element, if any. An unknown value is a
/// `bad-attribute` error.
fn op_of(el: &Element) -> Result<Option<EditOp>, OfcError> {
    match operation_attr(el) {
        None => Ok(None),
        Some(raw) => EditOp::from_str(raw)
            .map(Some)
            .map_err(|_| OfcError::BadAttribute("operation".into())),
    }
}

/// Collects the index paths of every element bearing the given explicit
/// operation, in document order.
fn collect_op_paths(root: &Element, op: EditOp) -> Result<Vec<Vec<usize>>, OfcError> {
    fn walk(
        el: &Element,
        op: EditOp,
        path: &mut Vec<usize>,
        out: &mut Vec<Vec<usize>>,
    ) -> Result<(), OfcError> {
        if op_of(el)? == Some(op) {
            out.push(path.clone());
        }
        for (i, c) in element_children(el) {
            path.push(i);
            walk(c, op, path, out)?;
            path.pop();
        }
        Ok(())
    }
    let mut out = Vec::new();
    walk(root, op, &mut Vec::new(), &mut out)?;
    Ok(out)
}

fn first_op_path(doc: &XmlDoc, op: EditOp) -> Result<Option<Vec<usize>>, OfcError> {
    match &doc.root {
        Some(root) => Ok(collect_op_paths(root, op)?.into_iter().next()),
        None => Ok(None),
    }
}

/// Phase 1: every explicitly tagged element must be compatible with its
/// tagged ancestors and with the default operation.
fn check_hierarchy(edit: &XmlDoc, defop: DefaultOperation) -> Result<(), OfcError> {
    let Some(root) = &edit.root else {
        return Ok(());
    };
    fn walk(
        root: &Element,
        el: &Element,
        path: &mut Vec<usize>,
        defop: DefaultOperation,
    ) -> Result<(), OfcError> {
        if let Some(op) = op_of(el)? {
            if op.removes() && defop == DefaultOperation::Replace {
                return Err(OfcError::OperationFailed(
                    "remove operation under a replace default operation".into(),
                ));
            }
            // walk toward the root looking for an incompatible ancestor
            for depth in 0..path.len() {
                let ancestor = node_at(root, &path[..depth]).expect("path is valid");
                if let Some(anc_op) = op_of(ancestor)? {
                    if (op.removes() && anc_op.creates()) || (op.creates() && anc_op.removes()) {
                        return Err(OfcError::OperationFailed(format!(
                            "operation {op} on {} is incompatible with {anc_op} on {}",
                            el.name, ancestor.name
                        )));
                    }
                }
            }
        }
        for (i, c) in element_children(el) {
            path.push(i);
            walk(root, c, path, defop)?;
            path.pop();
        }
        Ok(())
    }
    walk(root, root, &mut Vec::new(), defop)
}

/// Phase 2: `delete` requires the data to exist, `create` requires it not
/// to. A node holding exactly its schema default value is relieved when the
/// with-defaults basic mode says the server would produce it anyway.
fn check_existence(
    op: EditOp,
    orig: &mut XmlDoc,
    edit: &mut XmlDoc,
    defaults: WithDefaults,
) -> Result<(), OfcError> {
    let Some(root) = edit.root.as_ref() else {
        return Ok(());
    };
    let mut paths = collect_op_paths(root, op)?;
    // reverse order keeps earlier paths valid when a relieved node is
    // unlinked
    paths.reverse();
    for path in paths {
        let root = edit.root.as_ref().expect("edit root present");
        let Some(node) = node_at(root, &path) else {
            continue;
        };
        let found = find_equiv(orig, root, &path);
        match op {
            EditOp::Delete if found.is_none() => {
                let (parent, _) = ancestor_names(root, &path);
                if defaults == WithDefaults::ReportAll && apply::holds_default(node, parent.as_deref())
                {
                    // deleting a default-valued leaf succeeds with nothing
                    // to do
                    if let Some(r) = edit.root.as_mut() {
                        crate::core::xml::remove_at(r, &path);
                    }
                } else {
                    return Err(OfcError::DataMissing);
                }
            }
            EditOp::Create => {
                if let Some(orig_path) = found {
                    let (parent, _) = ancestor_names(root, &path);
                    if defaults == WithDefaults::Trim
                        && apply::holds_default(node, parent.as_deref())
                    {
                        // drop the old instance so the default value can be
                        // recreated
                        if let Some(r) = orig.root.as_mut() {
                            crate::core::xml::remove_at(r, &orig_path);
                        }
                    } else {
                        return Err(OfcError::DataExists);
                    }
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Phase 3: elides an explicit operation attribute wherever it equals the
/// operation already in force from an ancestor (or the default operation).
/// Applying this twice is the same as applying it once.
pub fn compact_operations(edit: &mut XmlDoc, defop: DefaultOperation) -> Result<(), OfcError> {
    fn walk(el: &mut Element, supreme: Option<EditOp>) -> Result<(), OfcError> {
        let own = op_of(el)?;
        let effective = match own {
            Some(op) => {
                if Some(op) == supreme {
                    remove_operation_attr(el);
                }
                Some(op)
            }
            None => supreme,
        };
        for c in el.children.iter_mut() {
            if let xmltree::XMLNode::Element(e) = c {
                walk(e, effective)?;
            }
        }
        Ok(())
    }
    let supreme = match defop {
        DefaultOperation::Merge => Some(EditOp::Merge),
        DefaultOperation::Replace => Some(EditOp::Replace),
        DefaultOperation::None => None,
    };
    if let Some(root) = edit.root.as_mut() {
        walk(root, supreme)?;
    }
    Ok(())
}

/// Phase 4: performs the operations in their fixed order, exhausting each
/// before moving on, then applies the default operation to what remains.
fn edit_operations(
    orig: &mut XmlDoc,
    edit: &mut XmlDoc,
    defop: DefaultOperation,
    target: &mut ApplyTarget,
) -> Result<(), OfcError> {
    // a replace default operation replaces the whole document up front
    if defop == DefaultOperation::Replace {
        if edit.root.is_none() {
            return apply::delete_node(orig, &[], target, true);
        }
        while edit.root.is_some() {
            apply::replace_node(orig, edit, &[], target)?;
        }
        return Ok(());
    }

    // delete: every equivalent of the tagged node is removed
    while let Some(path) = first_op_path(edit, EditOp::Delete)? {
        let root = edit.root.as_ref().expect("edit root present");
        if find_equiv(orig, root, &path).is_none() {
            return Err(OfcError::DataMissing);
        }
        loop {
            let root = edit.root.as_ref().expect("edit root present");
            match find_equiv(orig, root, &path) {
                Some(orig_path) => apply::delete_node(orig, &orig_path, target, true)?,
                None => break,
            }
        }
        apply::delete_node(edit, &path, target, false)?;
    }

    // remove: like delete, but absence is not an error
    while let Some(path) = first_op_path(edit, EditOp::Remove)? {
        let root = edit.root.as_ref().expect("edit root present");
        let found = find_equiv(orig, root, &path);
        apply::delete_node(edit, &path, target, false)?;
        if let Some(orig_path) = found {
            apply::delete_node(orig, &orig_path, target, true)?;
        }
    }

    while let Some(path) = first_op_path(edit, EditOp::Replace)? {
        apply::replace_node(orig, edit, &path, target)?;
    }

    while let Some(path) = first_op_path(edit, EditOp::Create)? {
        apply::create_node(orig, edit, &path, target)?;
    }

    while let Some(path) = first_op_path(edit, EditOp::Merge)? {
        apply::merge_node(orig, edit, &path, target)?;
    }

    // whatever remains falls under the default operation
    if defop == DefaultOperation::Merge {
        while edit.root.is_some() {
            apply::merge_node(orig, edit, &[], target)?;
        }
    }
    Ok(())
}

/// Applies an edit-config document to the given original.
///
/// For the running datastore the caller provides an open transaction and
/// the port mutator; the first failing mutation aborts the remaining work
/// and the caller decides whether to commit or abort. Transactions never
/// straddle invocations.
pub fn apply_edit(
    orig: &mut XmlDoc,
    mut edit: XmlDoc,
    defop: DefaultOperation,
    defaults: WithDefaults,
    target: &mut ApplyTarget,
) -> Result<(), OfcError> {
    check_hierarchy(&edit, defop)?;
    check_existence(EditOp::Delete, orig, &mut edit, defaults)?;
    check_existence(EditOp::Create, orig, &mut edit, defaults)?;
    compact_operations(&mut edit, defop)?;
    edit_operations(orig, &mut edit, defop, target)
}
