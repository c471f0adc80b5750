// src/core/openflow.rs

//! The OpenFlow port mutator: flips one port-config bit on a bridge via its
//! local management channel.
//!
//! Port configuration bits (`no-receive`, `no-forward`, `no-packet-in`,
//! `admin-state`) are not stored in the database; they travel over a
//! short-lived OpenFlow connection to `unix:<rundir>/<bridge>.mgmt`. The
//! exchange is HELLO, one PORT_MOD touching only the requested bit, close.

use crate::core::errors::OfcError;
use crate::core::ovsdb::OvsdbClient;
use bitflags::bitflags;
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

bitflags! {
    /// OpenFlow port config flags, identical across 1.0 and 1.3 for the
    /// bits the model exposes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PortConfig: u32 {
        const PORT_DOWN    = 1 << 0;
        const NO_RECV      = 1 << 2;
        const NO_FWD       = 1 << 5;
        const NO_PACKET_IN = 1 << 6;
    }
}

/// One mutable port-config bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortBit {
    NoReceive,
    NoForward,
    NoPacketIn,
    AdminState,
}

impl PortBit {
    /// Maps a configuration leaf name to its bit.
    pub fn from_leaf(name: &str) -> Option<Self> {
        match name {
            "no-receive" => Some(Self::NoReceive),
            "no-forward" => Some(Self::NoForward),
            "no-packet-in" => Some(Self::NoPacketIn),
            "admin-state" => Some(Self::AdminState),
            _ => None,
        }
    }

    pub fn flag(self) -> PortConfig {
        match self {
            Self::NoReceive => PortConfig::NO_RECV,
            Self::NoForward => PortConfig::NO_FWD,
            Self::NoPacketIn => PortConfig::NO_PACKET_IN,
            Self::AdminState => PortConfig::PORT_DOWN,
        }
    }

    /// Whether the flag is raised for the given leaf value. A missing value
    /// means the leaf's default (`false`, `admin-state up`).
    pub fn raised(self, value: Option<&str>) -> Result<bool, OfcError> {
        match (self, value.map(str::trim).filter(|v| !v.is_empty())) {
            (Self::AdminState, None | Some("up")) => Ok(false),
            (Self::AdminState, Some("down")) => Ok(true),
            (_, None | Some("false")) => Ok(false),
            (_, Some("true")) => Ok(true),
            (_, Some(other)) => Err(OfcError::BadElement(format!(
                "invalid port configuration value '{other}'"
            ))),
        }
    }
}

/// The seam between the edit engine and the management channel.
pub trait PortMutator: Send + Sync {
    fn set_port_bit(
        &self,
        bridge: Option<&str>,
        port: &str,
        bit: PortBit,
        value: Option<&str>,
    ) -> Result<(), OfcError>;
}

/// The highest protocol version this side speaks (OpenFlow 1.3).
const OFP_VERSION_MAX: u8 = 0x04;

const OFPT_HELLO: u8 = 0;
const OFPT_ERROR: u8 = 1;
/// PORT_MOD message type: 15 in 1.0, 16 from 1.1 on.
const OFPT10_PORT_MOD: u8 = 15;
const OFPT13_PORT_MOD: u8 = 16;

const IO_TIMEOUT: Duration = Duration::from_millis(500);

/// Talks OpenFlow to the per-bridge management socket.
pub struct MgmtChannel {
    rundir: PathBuf,
    db: Arc<OvsdbClient>,
}

impl MgmtChannel {
    pub fn new(rundir: impl Into<PathBuf>, db: Arc<OvsdbClient>) -> Self {
        Self {
            rundir: rundir.into(),
            db,
        }
    }

    fn connect(&self, bridge: &str) -> Result<UnixStream, OfcError> {
        let primary = self.rundir.join(format!("{bridge}.mgmt"));
        let stream = UnixStream::connect(&primary).or_else(|e| {
            // fall back to the datapath name when the bridge file is absent
            let snapshot = self.db.snapshot();
            match snapshot
                .bridge_by_name(bridge)
                .and_then(|b| b.other_config.get("datapath-id"))
            {
                Some(dp) => UnixStream::connect(self.rundir.join(format!("{dp}.mgmt"))),
                None => Err(e),
            }
        });
        let stream = stream.map_err(|e| {
            OfcError::OperationFailed(format!(
                "cannot open management channel for bridge {bridge}: {e}"
            ))
        })?;
        stream.set_read_timeout(Some(IO_TIMEOUT))?;
        stream.set_write_timeout(Some(IO_TIMEOUT))?;
        Ok(stream)
    }
}

fn header(version: u8, msg_type: u8, length: u16, xid: u32) -> [u8; 8] {
    let mut h = [0u8; 8];
    h[0] = version;
    h[1] = msg_type;
    h[2..4].copy_from_slice(&length.to_be_bytes());
    h[4..8].copy_from_slice(&xid.to_be_bytes());
    h
}

/// Exchanges HELLO messages and returns the negotiated version, the lower
/// of ours and the peer's.
fn negotiate(stream: &mut UnixStream) -> Result<u8, OfcError> {
    stream.write_all(&header(OFP_VERSION_MAX, OFPT_HELLO, 8, 1))?;
    let mut peer = [0u8; 8];
    stream.read_exact(&mut peer)?;
    if peer[1] != OFPT_HELLO {
        return Err(OfcError::OperationFailed(
            "management channel did not answer with HELLO".into(),
        ));
    }
    // drain hello elements the peer may append
    let total = u16::from_be_bytes([peer[2], peer[3]]) as usize;
    if total > 8 {
        let mut rest = vec![0u8; total - 8];
        stream.read_exact(&mut rest)?;
    }
    let version = peer[0].min(OFP_VERSION_MAX);
    if version == 0 {
        return Err(OfcError::OperationFailed(
            "no common OpenFlow version with the switch".into(),
        ));
    }
    Ok(version)
}

fn parse_mac(mac: Option<&str>) -> [u8; 6] {
    let mut out = [0u8; 6];
    if let Some(mac) = mac {
        for (i, part) in mac.split(':').take(6).enumerate() {
            out[i] = u8::from_str_radix(part, 16).unwrap_or(0);
        }
    }
    out
}

fn port_mod(version: u8, xid: u32, port_no: u32, hw_addr: [u8; 6], mask: u32, config: u32) -> Vec<u8> {
    let mut msg = Vec::with_capacity(40);
    if version == 0x01 {
        msg.extend_from_slice(&header(version, OFPT10_PORT_MOD, 32, xid));
        msg.extend_from_slice(&(port_no as u16).to_be_bytes());
        msg.extend_from_slice(&hw_addr);
        msg.extend_from_slice(&config.to_be_bytes());
        msg.extend_from_slice(&mask.to_be_bytes());
        msg.extend_from_slice(&0u32.to_be_bytes()); // advertise untouched
        msg.extend_from_slice(&[0u8; 4]);
    } else {
        msg.extend_from_slice(&header(version, OFPT13_PORT_MOD, 40, xid));
        msg.extend_from_slice(&port_no.to_be_bytes());
        msg.extend_from_slice(&[0u8; 4]);
        msg.extend_from_slice(&hw_addr);
        msg.extend_from_slice(&[0u8; 2]);
        msg.extend_from_slice(&config.to_be_bytes());
        msg.extend_from_slice(&mask.to_be_bytes());
        msg.extend_from_slice(&0u32.to_be_bytes());
        msg.extend_from_slice(&[0u8; 4]);
    }
    msg
}

impl PortMutator for MgmtChannel {
    fn set_port_bit(
        &self,
        bridge: Option<&str>,
        port: &str,
        bit: PortBit,
        value: Option<&str>,
    ) -> Result<(), OfcError> {
        let bridge = bridge.ok_or_else(|| {
            OfcError::OperationFailed(format!("port {port} is not attached to any bridge"))
        })?;
        let raised = bit.raised(value)?;

        let snapshot = self.db.snapshot();
        let iface = snapshot
            .interface_by_name(port)
            .ok_or(OfcError::DataMissing)?;
        let port_no = iface.ofport.unwrap_or(0) as u32;
        let hw_addr = parse_mac(iface.mac.as_deref());

        let mut stream = self.connect(bridge)?;
        let version = negotiate(&mut stream)?;
        debug!("port-mod {port} on {bridge}: {bit:?} -> {raised} (OF 0x{version:02x})");

        let mask = bit.flag().bits();
        let config = if raised { mask } else { 0 };
        stream.write_all(&port_mod(version, 2, port_no, hw_addr, mask, config))?;

        // the switch only talks back on failure; a short read timeout is the
        // success path
        let mut reply = [0u8; 8];
        match stream.read_exact(&mut reply) {
            Ok(()) if reply[1] == OFPT_ERROR => Err(OfcError::OperationFailed(format!(
                "switch rejected port-mod for {port}"
            ))),
            Ok(()) => Ok(()),
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut
                    || e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                Ok(())
            }
            Err(e) => {
                warn!("management channel read failed: {e}");
                Err(OfcError::OperationFailed(e.to_string()))
            }
        }
    }
}
