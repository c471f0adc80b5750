// src/core/errors.rs

//! Defines the primary error type for the entire application.

use std::sync::Arc;
use thiserror::Error;

/// The main error enum. Every failure a NETCONF client can observe maps to
/// one of the RFC 6241 error tags; the remaining variants are internal
/// conditions that surface as `operation-failed` on the wire.
#[derive(Error, Debug)]
pub enum OfcError {
    #[error("IO Error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("XML parse error: {0}")]
    Xml(String),

    /// Malformed or wrong-namespace payload, unknown `operation` attribute.
    #[error("Bad element: {0}")]
    BadElement(String),

    /// A required child element is absent.
    #[error("Missing element: {0}")]
    MissingElement(String),

    #[error("Bad attribute: {0}")]
    BadAttribute(String),

    /// `create` on data that already exists.
    #[error("Data exists")]
    DataExists,

    /// `delete` on data that does not exist.
    #[error("Data missing")]
    DataMissing,

    /// Feature was not negotiated for this session.
    #[error("Operation not supported: {0}")]
    OperationNotSupported(String),

    #[error("Operation failed: {0}")]
    OperationFailed(String),

    /// The datastore is locked by another session; carries the holder's
    /// session id for the `<error-info>` element.
    #[error("Lock denied, session {0} holds the lock")]
    LockDenied(String),
}

impl OfcError {
    /// The RFC 6241 `error-tag` string for this error.
    pub fn error_tag(&self) -> &'static str {
        match self {
            OfcError::BadElement(_) => "bad-element",
            OfcError::MissingElement(_) => "missing-element",
            OfcError::BadAttribute(_) => "bad-attribute",
            OfcError::DataExists => "data-exists",
            OfcError::DataMissing => "data-missing",
            OfcError::OperationNotSupported(_) => "operation-not-supported",
            OfcError::LockDenied(_) => "lock-denied",
            OfcError::Io(_) | OfcError::Xml(_) | OfcError::OperationFailed(_) => {
                "operation-failed"
            }
        }
    }

    /// The RFC 6241 `error-type` string for this error.
    pub fn error_type(&self) -> &'static str {
        match self {
            OfcError::BadElement(_)
            | OfcError::MissingElement(_)
            | OfcError::BadAttribute(_)
            | OfcError::LockDenied(_) => "protocol",
            _ => "application",
        }
    }

    /// The session id to report in `<error-info>`, if any.
    pub fn info_session_id(&self) -> Option<&str> {
        match self {
            OfcError::LockDenied(sid) => Some(sid),
            _ => None,
        }
    }
}

// Manual implementation of Clone because `std::io::Error` is not cloneable.
// We wrap it in an Arc to allow for cheap, shared cloning.
impl Clone for OfcError {
    fn clone(&self) -> Self {
        match self {
            OfcError::Io(e) => OfcError::Io(Arc::clone(e)),
            OfcError::Xml(s) => OfcError::Xml(s.clone()),
            OfcError::BadElement(s) => OfcError::BadElement(s.clone()),
            OfcError::MissingElement(s) => OfcError::MissingElement(s.clone()),
            OfcError::BadAttribute(s) => OfcError::BadAttribute(s.clone()),
            OfcError::DataExists => OfcError::DataExists,
            OfcError::DataMissing => OfcError::DataMissing,
            OfcError::OperationNotSupported(s) => OfcError::OperationNotSupported(s.clone()),
            OfcError::OperationFailed(s) => OfcError::OperationFailed(s.clone()),
            OfcError::LockDenied(s) => OfcError::LockDenied(s.clone()),
        }
    }
}

impl PartialEq for OfcError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (OfcError::Io(e1), OfcError::Io(e2)) => e1.to_string() == e2.to_string(),
            (OfcError::Xml(s1), OfcError::Xml(s2)) => s1 == s2,
            (OfcError::BadElement(s1), OfcError::BadElement(s2)) => s1 == s2,
            (OfcError::MissingElement(s1), OfcError::MissingElement(s2)) => s1 == s2,
            (OfcError::BadAttribute(s1), OfcError::BadAttribute(s2)) => s1 == s2,
            (OfcError::OperationNotSupported(s1), OfcError::OperationNotSupported(s2)) => s1 == s2,
            (OfcError::OperationFailed(s1), OfcError::OperationFailed(s2)) => s1 == s2,
            (OfcError::LockDenied(s1), OfcError::LockDenied(s2)) => s1 == s2,
            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}

// --- From trait implementations for easy error conversion ---

impl From<std::io::Error> for OfcError {
    fn from(e: std::io::Error) -> Self {
        OfcError::Io(Arc::new(e))
    }
}

impl From<xmltree::ParseError> for OfcError {
    fn from(e: xmltree::ParseError) -> Self {
        OfcError::Xml(e.to_string())
    }
}

impl From<xmltree::Error> for OfcError {
    fn from(e: xmltree::Error) -> Self {
        OfcError::Xml(e.to_string())
    }
}

impl From<uuid::Error> for OfcError {
    fn from(e: uuid::Error) -> Self {
        OfcError::OperationFailed(format!("invalid UUID: {e}"))
    }
}

impl From<std::string::FromUtf8Error> for OfcError {
    fn from(e: std::string::FromUtf8Error) -> Self {
        OfcError::BadElement(format!("payload is not valid UTF-8: {e}"))
    }
}
