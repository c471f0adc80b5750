// src/core/comm.rs

//! The agent↔server IPC protocol: typed messages over a UNIX stream socket,
//! framed with a fixed-width op-tag and length-prefixed payload fields.
//!
//! Every request elicits exactly one reply whose tag echoes the request, or
//! `RESULT_ERROR` followed by an error string. The agent's process id rides
//! along as a 16-bit value so the server can signal it for kill-session.

use crate::core::errors::OfcError;
use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

// Op-tags on the wire.
const TAG_GET_CPBLTS: u32 = 1;
const TAG_SET_SESSION: u32 = 2;
const TAG_CLOSE_SESSION: u32 = 3;
const TAG_KILL_SESSION: u32 = 4;
const TAG_GENERICOP: u32 = 5;
const TAG_RESULT_ERROR: u32 = 6;

/// Upper bound for any single length-prefixed field, to keep a corrupt or
/// hostile peer from ballooning the receive buffer.
const MAX_FIELD: usize = 16 * 1024 * 1024;

/// Upper bound on the capability list length.
const MAX_CPBLTS: u32 = 1024;

/// A message from an agent to the server.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentRequest {
    GetCpblts,
    SetSession {
        ncsid: String,
        pid: u16,
        username: String,
        cpblts: Vec<String>,
    },
    CloseSession,
    KillSession {
        ncsid: String,
    },
    GenericOp {
        rpc: String,
    },
}

/// A reply from the server to an agent.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerReply {
    Cpblts(Vec<String>),
    SetSessionOk,
    CloseSessionOk,
    KillSessionOk,
    GenericReply { reply: String },
    Error { message: String },
}

// --- wire primitives ---

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn u32(&mut self) -> Option<u32> {
        let bytes = self.buf.get(self.pos..self.pos + 4)?;
        self.pos += 4;
        Some(u32::from_be_bytes(bytes.try_into().expect("4-byte slice")))
    }

    fn u16(&mut self) -> Option<u16> {
        let bytes = self.buf.get(self.pos..self.pos + 2)?;
        self.pos += 2;
        Some(u16::from_be_bytes(bytes.try_into().expect("2-byte slice")))
    }

    fn string(&mut self) -> Result<Option<String>, OfcError> {
        let Some(len) = self.u32() else {
            return Ok(None);
        };
        let len = len as usize;
        if len > MAX_FIELD {
            return Err(OfcError::OperationFailed(format!(
                "IPC field of {len} bytes exceeds the limit"
            )));
        }
        let Some(bytes) = self.buf.get(self.pos..self.pos + len) else {
            return Ok(None);
        };
        self.pos += len;
        Ok(Some(String::from_utf8(bytes.to_vec())?))
    }

    fn strings(&mut self) -> Result<Option<Vec<String>>, OfcError> {
        let Some(count) = self.u32() else {
            return Ok(None);
        };
        if count > MAX_CPBLTS {
            return Err(OfcError::OperationFailed(format!(
                "IPC list of {count} entries exceeds the limit"
            )));
        }
        let mut out = Vec::with_capacity(count as usize);
        for _ in 0..count {
            match self.string()? {
                Some(s) => out.push(s),
                None => return Ok(None),
            }
        }
        Ok(Some(out))
    }
}

fn put_string(dst: &mut BytesMut, s: &str) {
    dst.put_u32(s.len() as u32);
    dst.put_slice(s.as_bytes());
}

fn put_strings(dst: &mut BytesMut, list: &[String]) {
    dst.put_u32(list.len() as u32);
    for s in list {
        put_string(dst, s);
    }
}

// --- server side: decodes requests, encodes replies ---

#[derive(Debug, Default)]
pub struct ServerCodec;

impl Decoder for ServerCodec {
    type Item = AgentRequest;
    type Error = OfcError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let mut r = Reader::new(&src[..]);
        let Some(tag) = r.u32() else {
            return Ok(None);
        };
        let msg = match tag {
            TAG_GET_CPBLTS => AgentRequest::GetCpblts,
            TAG_CLOSE_SESSION => AgentRequest::CloseSession,
            TAG_KILL_SESSION => match r.string()? {
                Some(ncsid) => AgentRequest::KillSession { ncsid },
                None => return Ok(None),
            },
            TAG_GENERICOP => match r.string()? {
                Some(rpc) => AgentRequest::GenericOp { rpc },
                None => return Ok(None),
            },
            TAG_SET_SESSION => {
                let (Some(ncsid), Some(pid), Some(username), Some(cpblts)) =
                    (r.string()?, r.u16(), r.string()?, r.strings()?)
                else {
                    return Ok(None);
                };
                AgentRequest::SetSession {
                    ncsid,
                    pid,
                    username,
                    cpblts,
                }
            }
            other => {
                return Err(OfcError::OperationFailed(format!(
                    "unsupported IPC message tag {other}"
                )));
            }
        };
        let consumed = r.pos;
        src.advance(consumed);
        Ok(Some(msg))
    }
}

impl Encoder<ServerReply> for ServerCodec {
    type Error = OfcError;

    fn encode(&mut self, item: ServerReply, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            ServerReply::Cpblts(list) => {
                dst.put_u32(TAG_GET_CPBLTS);
                put_strings(dst, &list);
            }
            ServerReply::SetSessionOk => dst.put_u32(TAG_SET_SESSION),
            ServerReply::CloseSessionOk => dst.put_u32(TAG_CLOSE_SESSION),
            ServerReply::KillSessionOk => dst.put_u32(TAG_KILL_SESSION),
            ServerReply::GenericReply { reply } => {
                dst.put_u32(TAG_GENERICOP);
                put_string(dst, &reply);
            }
            ServerReply::Error { message } => {
                dst.put_u32(TAG_RESULT_ERROR);
                put_string(dst, &message);
            }
        }
        Ok(())
    }
}

// --- agent side: encodes requests, decodes replies ---

#[derive(Debug, Default)]
pub struct AgentCodec;

impl Encoder<AgentRequest> for AgentCodec {
    type Error = OfcError;

    fn encode(&mut self, item: AgentRequest, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            AgentRequest::GetCpblts => dst.put_u32(TAG_GET_CPBLTS),
            AgentRequest::CloseSession => dst.put_u32(TAG_CLOSE_SESSION),
            AgentRequest::KillSession { ncsid } => {
                dst.put_u32(TAG_KILL_SESSION);
                put_string(dst, &ncsid);
            }
            AgentRequest::GenericOp { rpc } => {
                dst.put_u32(TAG_GENERICOP);
                put_string(dst, &rpc);
            }
            AgentRequest::SetSession {
                ncsid,
                pid,
                username,
                cpblts,
            } => {
                dst.put_u32(TAG_SET_SESSION);
                put_string(dst, &ncsid);
                dst.put_u16(pid);
                put_string(dst, &username);
                put_strings(dst, &cpblts);
            }
        }
        Ok(())
    }
}

impl Decoder for AgentCodec {
    type Item = ServerReply;
    type Error = OfcError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let mut r = Reader::new(&src[..]);
        let Some(tag) = r.u32() else {
            return Ok(None);
        };
        let msg = match tag {
            TAG_GET_CPBLTS => match r.strings()? {
                Some(list) => ServerReply::Cpblts(list),
                None => return Ok(None),
            },
            TAG_SET_SESSION => ServerReply::SetSessionOk,
            TAG_CLOSE_SESSION => ServerReply::CloseSessionOk,
            TAG_KILL_SESSION => ServerReply::KillSessionOk,
            TAG_GENERICOP => match r.string()? {
                Some(reply) => ServerReply::GenericReply { reply },
                None => return Ok(None),
            },
            TAG_RESULT_ERROR => match r.string()? {
                Some(message) => ServerReply::Error { message },
                None => return Ok(None),
            },
            other => {
                return Err(OfcError::OperationFailed(format!(
                    "unsupported IPC message tag {other}"
                )));
            }
        };
        let consumed = r.pos;
        src.advance(consumed);
        Ok(Some(msg))
    }
}
