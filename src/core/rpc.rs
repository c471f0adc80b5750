// src/core/rpc.rs

//! NETCONF RPC parsing and rpc-reply assembly.
//!
//! The transport framing and session negotiation live with the agent; this
//! module turns an `<rpc>` payload into a typed operation and builds the
//! serialized replies the server hands back.

use crate::core::datastore::{CopySource, Datastore, ErrorOption};
use crate::core::edit::DefaultOperation;
use crate::core::errors::OfcError;
use crate::core::xml::{NC_NS_BASE, XmlDoc, child, element_children, text_of, xml_escape};
use std::str::FromStr;
use xmltree::Element;

/// The NETCONF notifications capability; create-subscription is only valid
/// when the session negotiated it.
pub const NOTIFICATIONS_CAP: &str = "urn:ietf:params:netconf:capability:notification:1.0";

/// The default capability set this server advertises to its agents.
pub fn default_capabilities() -> Vec<String> {
    vec![
        "urn:ietf:params:netconf:base:1.0".to_string(),
        "urn:ietf:params:netconf:capability:writable-running:1.0".to_string(),
        "urn:ietf:params:netconf:capability:candidate:1.0".to_string(),
        "urn:ietf:params:netconf:capability:startup:1.0".to_string(),
        "urn:ietf:params:netconf:capability:rollback-on-error:1.0".to_string(),
        NOTIFICATIONS_CAP.to_string(),
        "urn:ietf:params:netconf:capability:with-defaults:1.0?basic-mode=report-all".to_string(),
        "urn:onf:config:yang?module=of-config&revision=2014-06-30".to_string(),
        "urn:ietf:params:xml:ns:yang:ietf-netconf-server?module=ietf-netconf-server".to_string(),
    ]
}

/// A parsed RPC operation.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcOp {
    Get,
    GetConfig {
        source: Datastore,
    },
    EditConfig {
        target: Datastore,
        default_op: DefaultOperation,
        error_op: ErrorOption,
        config: String,
    },
    CopyConfig {
        target: Datastore,
        source: RpcSource,
    },
    DeleteConfig {
        target: Datastore,
    },
    Lock {
        target: Datastore,
    },
    Unlock {
        target: Datastore,
    },
    CloseSession,
    KillSession {
        session_id: String,
    },
    CreateSubscription,
}

/// A copy-config source before it is bound to datastore storage.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcSource {
    Datastore(Datastore),
    Config(String),
}

impl From<RpcSource> for CopySource {
    fn from(s: RpcSource) -> Self {
        match s {
            RpcSource::Datastore(d) => CopySource::Datastore(d),
            RpcSource::Config(c) => CopySource::Config(c),
        }
    }
}

/// Extracts the message-id attribute without insisting on a parseable
/// document, so that even a malformed request gets an addressed error
/// reply.
pub fn message_id_of(text: &str) -> String {
    XmlDoc::parse(text)
        .ok()
        .and_then(|doc| doc.root)
        .and_then(|root| root.attributes.get("message-id").cloned())
        .unwrap_or_else(|| "0".to_string())
}

fn datastore_of(container: &Element, which: &str) -> Result<Datastore, OfcError> {
    let inner = element_children(container)
        .map(|(_, e)| e)
        .next()
        .ok_or_else(|| OfcError::BadElement(which.to_string()))?;
    Datastore::from_str(&inner.name).map_err(|_| OfcError::BadElement(which.to_string()))
}

fn dump_inner(el: &Element) -> Result<String, OfcError> {
    match element_children(el).map(|(_, e)| e).next() {
        Some(inner) => XmlDoc {
            root: Some(inner.clone()),
        }
        .dump(),
        None => Ok(String::new()),
    }
}

/// Parses an `<rpc>` payload into its typed operation.
pub fn parse_rpc(text: &str) -> Result<RpcOp, OfcError> {
    let doc = XmlDoc::parse(text).map_err(|_| OfcError::BadElement("rpc".into()))?;
    let root = doc.root.ok_or_else(|| OfcError::BadElement("rpc".into()))?;
    if root.name != "rpc" {
        return Err(OfcError::BadElement(root.name.clone()));
    }
    let op = element_children(&root)
        .map(|(_, e)| e)
        .next()
        .ok_or_else(|| OfcError::MissingElement("operation".into()))?;

    match op.name.as_str() {
        "get" => Ok(RpcOp::Get),
        "get-config" => {
            let source = child(op, "source")
                .ok_or_else(|| OfcError::MissingElement("source".into()))?;
            Ok(RpcOp::GetConfig {
                source: datastore_of(source, "source")?,
            })
        }
        "edit-config" => {
            let target = child(op, "target")
                .ok_or_else(|| OfcError::MissingElement("target".into()))?;
            let default_op = match child(op, "default-operation").and_then(text_of) {
                None => DefaultOperation::Merge,
                Some(v) => DefaultOperation::from_str(&v)
                    .map_err(|_| OfcError::BadElement("default-operation".into()))?,
            };
            let error_op = match child(op, "error-option").and_then(text_of).as_deref() {
                None | Some("stop-on-error") => ErrorOption::StopOnError,
                Some("continue-on-error") => ErrorOption::ContinueOnError,
                Some("rollback-on-error") => ErrorOption::RollbackOnError,
                Some(_) => return Err(OfcError::BadElement("error-option".into())),
            };
            let config = child(op, "config")
                .ok_or_else(|| OfcError::MissingElement("config".into()))?;
            Ok(RpcOp::EditConfig {
                target: datastore_of(target, "target")?,
                default_op,
                error_op,
                config: dump_inner(config)?,
            })
        }
        "copy-config" => {
            let target = child(op, "target")
                .ok_or_else(|| OfcError::MissingElement("target".into()))?;
            let source = child(op, "source")
                .ok_or_else(|| OfcError::MissingElement("source".into()))?;
            let source = match child(source, "config") {
                Some(cfg) => RpcSource::Config(dump_inner(cfg)?),
                None => RpcSource::Datastore(datastore_of(source, "source")?),
            };
            Ok(RpcOp::CopyConfig {
                target: datastore_of(target, "target")?,
                source,
            })
        }
        "delete-config" => {
            let target = child(op, "target")
                .ok_or_else(|| OfcError::MissingElement("target".into()))?;
            Ok(RpcOp::DeleteConfig {
                target: datastore_of(target, "target")?,
            })
        }
        "lock" | "unlock" => {
            let target = child(op, "target")
                .ok_or_else(|| OfcError::MissingElement("target".into()))?;
            let target = datastore_of(target, "target")?;
            Ok(if op.name == "lock" {
                RpcOp::Lock { target }
            } else {
                RpcOp::Unlock { target }
            })
        }
        "close-session" => Ok(RpcOp::CloseSession),
        "kill-session" => {
            let sid = child(op, "session-id")
                .and_then(text_of)
                .ok_or_else(|| OfcError::MissingElement("session-id".into()))?;
            Ok(RpcOp::KillSession { session_id: sid })
        }
        "create-subscription" => Ok(RpcOp::CreateSubscription),
        other => Err(OfcError::OperationNotSupported(other.to_string())),
    }
}

// --- reply assembly ---

pub fn reply_ok(message_id: &str) -> String {
    format!(
        "<rpc-reply message-id=\"{}\" xmlns=\"{NC_NS_BASE}\"><ok/></rpc-reply>",
        xml_escape(message_id)
    )
}

pub fn reply_data(message_id: &str, data: &str) -> String {
    format!(
        "<rpc-reply message-id=\"{}\" xmlns=\"{NC_NS_BASE}\"><data>{data}</data></rpc-reply>",
        xml_escape(message_id)
    )
}

pub fn reply_error(message_id: &str, error: &OfcError) -> String {
    let info = match error.info_session_id() {
        Some(sid) => format!(
            "<error-info><session-id>{}</session-id></error-info>",
            xml_escape(sid)
        ),
        None => String::new(),
    };
    format!(
        concat!(
            "<rpc-reply message-id=\"{}\" xmlns=\"{}\"><rpc-error>",
            "<error-type>{}</error-type>",
            "<error-tag>{}</error-tag>",
            "<error-severity>error</error-severity>",
            "<error-message>{}</error-message>",
            "{}",
            "</rpc-error></rpc-reply>"
        ),
        xml_escape(message_id),
        NC_NS_BASE,
        error.error_type(),
        error.error_tag(),
        xml_escape(&error.to_string()),
        info
    )
}

/// The `<hello>` message the agent sends on its NETCONF stream.
pub fn hello(session_id: &str, capabilities: &[String]) -> String {
    let mut caps = String::new();
    for c in capabilities {
        caps.push_str(&format!("<capability>{}</capability>", xml_escape(c)));
    }
    format!(
        concat!(
            "<hello xmlns=\"{}\"><capabilities>{}</capabilities>",
            "<session-id>{}</session-id></hello>"
        ),
        NC_NS_BASE,
        caps,
        xml_escape(session_id)
    )
}
