//! Message headers.
//!
//! Three header shapes share the [`MessageHeader`] contract:
//!
//! ```text
//! StructHeader (20 bytes)    emsg:u32 target_job:u64 source_job:u64
//! ClientHeader (36 bytes)    emsg:u32 header_size:u8=36 header_version:u16=2
//!                            target_job:u64 source_job:u64 canary:u8=239
//!                            steam_id:u64 session_id:i32
//! ProtoHeader  (8 + n bytes) emsg|0x80000000:u32 len:i32 CMsgProtoBufHeader(len)
//! ```
//!
//! [`Header`] is the tagged union an inbound [`Packet`](super::packet::Packet)
//! holds once the shape has been chosen.

use crate::core::serialization::{Serializable, WireRead};
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::emsg::{self, EMsg};
use crate::protocol::job::JobId;
use crate::protocol::proto::CMsgProtoBufHeader;
use crate::steamid::SteamId;
use bytes::{BufMut, Bytes, BytesMut};
use prost::Message as _;
use std::fmt;

pub const STRUCT_HEADER_LEN: usize = 20;
pub const CLIENT_HEADER_LEN: usize = 36;

const CLIENT_HEADER_VERSION: u16 = 2;
const CLIENT_HEADER_CANARY: u8 = 239;

/// Operations common to every header shape.
pub trait MessageHeader: Send + Sync + fmt::Debug {
    /// Logical message type, protobuf bit stripped.
    fn emsg(&self) -> EMsg;

    fn is_proto(&self) -> bool;

    fn target_job(&self) -> JobId;
    fn set_target_job(&mut self, job: JobId);
    fn source_job(&self) -> JobId;
    fn set_source_job(&mut self, job: JobId);

    /// Session id, for shapes that carry one.
    fn session_id(&self) -> Option<i32> {
        None
    }

    /// Session identity, for shapes that carry one.
    fn steam_id(&self) -> Option<SteamId> {
        None
    }

    /// Stamps the session onto the header. A no-op for pre-login headers.
    fn set_session(&mut self, _session_id: i32, _steam_id: SteamId) {}

    /// Appends the wire form of the header to `out`.
    fn write_to(&self, out: &mut BytesMut);
}

/// Header of pre-login struct messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructHeader {
    pub emsg: EMsg,
    pub target_job: JobId,
    pub source_job: JobId,
}

impl StructHeader {
    pub fn new(emsg: EMsg) -> Self {
        Self {
            emsg,
            target_job: JobId::NONE,
            source_job: JobId::NONE,
        }
    }
}

impl Serializable for StructHeader {
    fn serialize(&self, out: &mut BytesMut) {
        out.reserve(STRUCT_HEADER_LEN);
        out.put_u32_le(self.emsg.into());
        out.put_u64_le(self.target_job.0);
        out.put_u64_le(self.source_job.0);
    }

    fn deserialize(input: &mut Bytes) -> Result<Self> {
        if input.len() < STRUCT_HEADER_LEN {
            return Err(ProtocolError::DecodeError(constants::ERR_TRUNCATED_HEADER.into()));
        }
        Ok(Self {
            emsg: emsg::mask(input.read_u32_le()?),
            target_job: JobId(input.read_u64_le()?),
            source_job: JobId(input.read_u64_le()?),
        })
    }
}

impl MessageHeader for StructHeader {
    fn emsg(&self) -> EMsg {
        self.emsg
    }

    fn is_proto(&self) -> bool {
        false
    }

    fn target_job(&self) -> JobId {
        self.target_job
    }

    fn set_target_job(&mut self, job: JobId) {
        self.target_job = job;
    }

    fn source_job(&self) -> JobId {
        self.source_job
    }

    fn set_source_job(&mut self, job: JobId) {
        self.source_job = job;
    }

    fn write_to(&self, out: &mut BytesMut) {
        self.serialize(out);
    }
}

/// Extended header of post-login struct messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHeader {
    pub emsg: EMsg,
    pub header_size: u8,
    pub header_version: u16,
    pub target_job: JobId,
    pub source_job: JobId,
    pub header_canary: u8,
    pub steam_id: SteamId,
    pub session_id: i32,
}

impl ClientHeader {
    pub fn new(emsg: EMsg) -> Self {
        Self {
            emsg,
            header_size: CLIENT_HEADER_LEN as u8,
            header_version: CLIENT_HEADER_VERSION,
            target_job: JobId::NONE,
            source_job: JobId::NONE,
            header_canary: CLIENT_HEADER_CANARY,
            steam_id: SteamId::default(),
            session_id: 0,
        }
    }
}

impl Serializable for ClientHeader {
    fn serialize(&self, out: &mut BytesMut) {
        out.reserve(CLIENT_HEADER_LEN);
        out.put_u32_le(self.emsg.into());
        out.put_u8(self.header_size);
        out.put_u16_le(self.header_version);
        out.put_u64_le(self.target_job.0);
        out.put_u64_le(self.source_job.0);
        out.put_u8(self.header_canary);
        out.put_u64_le(self.steam_id.as_u64());
        out.put_i32_le(self.session_id);
    }

    fn deserialize(input: &mut Bytes) -> Result<Self> {
        if input.len() < CLIENT_HEADER_LEN {
            return Err(ProtocolError::DecodeError(constants::ERR_TRUNCATED_HEADER.into()));
        }
        Ok(Self {
            emsg: emsg::mask(input.read_u32_le()?),
            header_size: input.read_u8()?,
            header_version: input.read_u16_le()?,
            target_job: JobId(input.read_u64_le()?),
            source_job: JobId(input.read_u64_le()?),
            header_canary: input.read_u8()?,
            steam_id: SteamId::from_u64(input.read_u64_le()?),
            session_id: input.read_i32_le()?,
        })
    }
}

impl MessageHeader for ClientHeader {
    fn emsg(&self) -> EMsg {
        self.emsg
    }

    fn is_proto(&self) -> bool {
        false
    }

    fn target_job(&self) -> JobId {
        self.target_job
    }

    fn set_target_job(&mut self, job: JobId) {
        self.target_job = job;
    }

    fn source_job(&self) -> JobId {
        self.source_job
    }

    fn set_source_job(&mut self, job: JobId) {
        self.source_job = job;
    }

    fn session_id(&self) -> Option<i32> {
        Some(self.session_id)
    }

    fn steam_id(&self) -> Option<SteamId> {
        Some(self.steam_id)
    }

    fn set_session(&mut self, session_id: i32, steam_id: SteamId) {
        self.session_id = session_id;
        self.steam_id = steam_id;
    }

    fn write_to(&self, out: &mut BytesMut) {
        self.serialize(out);
    }
}

/// Header of protobuf messages: the type tag, then a length-prefixed
/// protobuf envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtoHeader {
    pub emsg: EMsg,
    pub proto: CMsgProtoBufHeader,
}

impl ProtoHeader {
    pub fn new(emsg: EMsg) -> Self {
        Self {
            emsg,
            proto: CMsgProtoBufHeader::default(),
        }
    }
}

impl Serializable for ProtoHeader {
    fn serialize(&self, out: &mut BytesMut) {
        let envelope = self.proto.encode_to_vec();
        out.reserve(8 + envelope.len());
        out.put_u32_le(emsg::with_proto(self.emsg));
        out.put_i32_le(envelope.len() as i32);
        out.extend_from_slice(&envelope);
    }

    fn deserialize(input: &mut Bytes) -> Result<Self> {
        let raw = input.read_u32_le()?;
        let len = input.read_i32_le()?;
        let len = usize::try_from(len).map_err(|_| {
            ProtocolError::DecodeError(format!("negative protobuf header length {len}"))
        })?;
        let envelope = input.read_bytes(len)?;
        Ok(Self {
            emsg: emsg::mask(raw),
            proto: CMsgProtoBufHeader::decode(envelope)?,
        })
    }
}

impl MessageHeader for ProtoHeader {
    fn emsg(&self) -> EMsg {
        self.emsg
    }

    fn is_proto(&self) -> bool {
        true
    }

    fn target_job(&self) -> JobId {
        JobId(self.proto.jobid_target())
    }

    fn set_target_job(&mut self, job: JobId) {
        self.proto.jobid_target = Some(job.0);
    }

    fn source_job(&self) -> JobId {
        JobId(self.proto.jobid_source())
    }

    fn set_source_job(&mut self, job: JobId) {
        self.proto.jobid_source = Some(job.0);
    }

    fn session_id(&self) -> Option<i32> {
        Some(self.proto.client_sessionid())
    }

    fn steam_id(&self) -> Option<SteamId> {
        Some(SteamId::from_u64(self.proto.steamid()))
    }

    fn set_session(&mut self, session_id: i32, steam_id: SteamId) {
        self.proto.client_sessionid = Some(session_id);
        self.proto.steamid = Some(steam_id.as_u64());
    }

    fn write_to(&self, out: &mut BytesMut) {
        self.serialize(out);
    }
}

/// Inbound header of any shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Header {
    Struct(StructHeader),
    Client(ClientHeader),
    Proto(ProtoHeader),
}

impl Header {
    /// Human readable shape name, used in error messages.
    pub fn shape(&self) -> &'static str {
        match self {
            Header::Struct(_) => "struct",
            Header::Client(_) => "client struct",
            Header::Proto(_) => "protobuf",
        }
    }

    fn inner(&self) -> &dyn MessageHeader {
        match self {
            Header::Struct(h) => h,
            Header::Client(h) => h,
            Header::Proto(h) => h,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn MessageHeader {
        match self {
            Header::Struct(h) => h,
            Header::Client(h) => h,
            Header::Proto(h) => h,
        }
    }
}

impl MessageHeader for Header {
    fn emsg(&self) -> EMsg {
        self.inner().emsg()
    }

    fn is_proto(&self) -> bool {
        self.inner().is_proto()
    }

    fn target_job(&self) -> JobId {
        self.inner().target_job()
    }

    fn set_target_job(&mut self, job: JobId) {
        self.inner_mut().set_target_job(job);
    }

    fn source_job(&self) -> JobId {
        self.inner().source_job()
    }

    fn set_source_job(&mut self, job: JobId) {
        self.inner_mut().set_source_job(job);
    }

    fn session_id(&self) -> Option<i32> {
        self.inner().session_id()
    }

    fn steam_id(&self) -> Option<SteamId> {
        self.inner().steam_id()
    }

    fn set_session(&mut self, session_id: i32, steam_id: SteamId) {
        self.inner_mut().set_session(session_id, steam_id);
    }

    fn write_to(&self, out: &mut BytesMut) {
        self.inner().write_to(out);
    }
}
