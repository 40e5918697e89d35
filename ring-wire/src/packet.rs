use bytes::{Buf, BufMut, BytesMut};

use crate::error::WireError;
use crate::frame::{
    put_list, put_string, try_get_i32, try_get_list, try_get_string, try_get_u8,
};

const OP_JOIN: u8 = 1;
const OP_JOIN_RESPONSE: u8 = 2;
const OP_SET_NEXT: u8 = 3;
const OP_SET_PREV: u8 = 4;
const OP_LIST: u8 = 5;
const OP_ELECTION: u8 = 6;
const OP_COORDINATOR: u8 = 7;

/// One framed ring-membership RPC, as carried over a single short-lived TCP
/// connection: one opcode byte, then the payload for that opcode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rpc {
    /// `join` request: the joining node's own identity.
    Join(String),
    /// `join` response: the predecessor identity the joiner should install.
    JoinResponse(String),
    SetNext(String),
    SetPrev(String),
    List(Vec<String>),
    Election(Vec<String>),
    Coordinator { ttl: i32, participants: Vec<String> },
}

impl Rpc {
    pub fn opcode(&self) -> u8 {
        match self {
            Rpc::Join(_) => OP_JOIN,
            Rpc::JoinResponse(_) => OP_JOIN_RESPONSE,
            Rpc::SetNext(_) => OP_SET_NEXT,
            Rpc::SetPrev(_) => OP_SET_PREV,
            Rpc::List(_) => OP_LIST,
            Rpc::Election(_) => OP_ELECTION,
            Rpc::Coordinator { .. } => OP_COORDINATOR,
        }
    }

    /// Serializes `self` onto `buf`: one opcode byte followed by the payload.
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.opcode());
        match self {
            Rpc::Join(id) | Rpc::JoinResponse(id) | Rpc::SetNext(id) | Rpc::SetPrev(id) => {
                put_string(buf, id);
            }
            Rpc::List(participants) | Rpc::Election(participants) => {
                put_list(buf, participants);
            }
            Rpc::Coordinator { ttl, participants } => {
                buf.put_i32(*ttl);
                put_list(buf, participants);
            }
        }
    }

    /// Attempts to decode one `Rpc` from the front of `buf`.
    ///
    /// Returns `Ok(None)` when `buf` does not yet hold a complete frame;
    /// the caller should read more bytes off the socket and retry. On
    /// success, the consumed bytes are advanced out of `buf` (mirroring
    /// `mqtt-codec`'s `Packet::parse` convention).
    pub fn decode(buf: &mut BytesMut) -> Result<Option<Rpc>, WireError> {
        let bytes = buf.bytes();
        let mut pos = 0usize;

        let opcode = match try_get_u8(bytes, &mut pos) {
            Some(op) => op,
            None => return Ok(None),
        };

        let rpc = match opcode {
            OP_JOIN => match try_get_string(bytes, &mut pos)? {
                Some(id) => Rpc::Join(id),
                None => return Ok(None),
            },
            OP_JOIN_RESPONSE => match try_get_string(bytes, &mut pos)? {
                Some(id) => Rpc::JoinResponse(id),
                None => return Ok(None),
            },
            OP_SET_NEXT => match try_get_string(bytes, &mut pos)? {
                Some(id) => Rpc::SetNext(id),
                None => return Ok(None),
            },
            OP_SET_PREV => match try_get_string(bytes, &mut pos)? {
                Some(id) => Rpc::SetPrev(id),
                None => return Ok(None),
            },
            OP_LIST => match try_get_list(bytes, &mut pos)? {
                Some(participants) => Rpc::List(participants),
                None => return Ok(None),
            },
            OP_ELECTION => match try_get_list(bytes, &mut pos)? {
                Some(participants) => Rpc::Election(participants),
                None => return Ok(None),
            },
            OP_COORDINATOR => {
                let ttl = match try_get_i32(bytes, &mut pos) {
                    Some(ttl) => ttl,
                    None => return Ok(None),
                };
                match try_get_list(bytes, &mut pos)? {
                    Some(participants) => Rpc::Coordinator { ttl, participants },
                    None => return Ok(None),
                }
            }
            other => return Err(WireError::UnknownOpcode(other)),
        };

        buf.advance(pos);
        Ok(Some(rpc))
    }
}
