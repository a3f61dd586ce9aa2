//! # Game Coordinator Messages
//!
//! GC traffic is tunnelled inside `ClientToGC` / `ClientFromGC` protobuf
//! messages. The inner payload has its own header and its own protobuf bit:
//!
//! ```text
//! struct: version:u16=1 target_job:u64 source_job:u64 body
//! proto:  msg|0x80000000:u32 len:i32 CMsgProtoBufHeader(len) body
//! ```

use crate::core::serialization::{Serializable, WireRead};
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::emsg::PROTO_MASK;
use crate::protocol::job::JobId;
use crate::protocol::proto::{CMsgGCClient, CMsgProtoBufHeader};
use bytes::{BufMut, Bytes, BytesMut};
use prost::Message as _;
use std::fmt;

pub const GC_STRUCT_HEADER_LEN: usize = 18;
const GC_STRUCT_HEADER_VERSION: u16 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcStructHeader {
    pub version: u16,
    pub target_job: JobId,
    pub source_job: JobId,
}

impl Default for GcStructHeader {
    fn default() -> Self {
        Self {
            version: GC_STRUCT_HEADER_VERSION,
            target_job: JobId::NONE,
            source_job: JobId::NONE,
        }
    }
}

impl Serializable for GcStructHeader {
    fn serialize(&self, out: &mut BytesMut) {
        out.put_u16_le(self.version);
        out.put_u64_le(self.target_job.0);
        out.put_u64_le(self.source_job.0);
    }

    fn deserialize(input: &mut Bytes) -> Result<Self> {
        if input.len() < GC_STRUCT_HEADER_LEN {
            return Err(ProtocolError::DecodeError(constants::ERR_TRUNCATED_HEADER.into()));
        }
        Ok(Self {
            version: input.read_u16_le()?,
            target_job: JobId(input.read_u64_le()?),
            source_job: JobId(input.read_u64_le()?),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GcProtoHeader {
    /// GC message type without the protobuf bit.
    pub msg_type: u32,
    pub proto: CMsgProtoBufHeader,
}

impl GcProtoHeader {
    pub fn new(msg_type: u32) -> Self {
        Self {
            msg_type: msg_type & !PROTO_MASK,
            proto: CMsgProtoBufHeader::default(),
        }
    }
}

impl Serializable for GcProtoHeader {
    fn serialize(&self, out: &mut BytesMut) {
        let envelope = self.proto.encode_to_vec();
        out.put_u32_le(self.msg_type | PROTO_MASK);
        out.put_i32_le(envelope.len() as i32);
        out.extend_from_slice(&envelope);
    }

    fn deserialize(input: &mut Bytes) -> Result<Self> {
        let raw = input.read_u32_le()?;
        let len = input.read_i32_le()?;
        let len = usize::try_from(len).map_err(|_| {
            ProtocolError::DecodeError(format!("negative GC header length {len}"))
        })?;
        let envelope = input.read_bytes(len)?;
        Ok(Self {
            msg_type: raw & !PROTO_MASK,
            proto: CMsgProtoBufHeader::decode(envelope)?,
        })
    }
}

/// An outbound Game Coordinator message.
pub trait GcMessage: Send + fmt::Debug {
    fn app_id(&self) -> u32;

    /// GC message type without the protobuf bit.
    fn msg_type(&self) -> u32;

    fn is_proto(&self) -> bool;

    fn target_job(&self) -> JobId;
    fn set_target_job(&mut self, job: JobId);
    fn source_job(&self) -> JobId;
    fn set_source_job(&mut self, job: JobId);

    /// Appends the inner header and body.
    fn write_to(&self, out: &mut BytesMut);

    /// Type tag as carried in the `CMsgGCClient` envelope.
    fn wire_msg_type(&self) -> u32 {
        if self.is_proto() {
            self.msg_type() | PROTO_MASK
        } else {
            self.msg_type()
        }
    }
}

#[derive(Debug, Clone)]
pub struct GcProtoMessage<T> {
    pub app_id: u32,
    pub header: GcProtoHeader,
    pub body: T,
}

impl<T: prost::Message + Default> GcProtoMessage<T> {
    pub fn new(app_id: u32, msg_type: u32, body: T) -> Self {
        Self {
            app_id,
            header: GcProtoHeader::new(msg_type),
            body,
        }
    }
}

impl<T: prost::Message + Default> GcMessage for GcProtoMessage<T> {
    fn app_id(&self) -> u32 {
        self.app_id
    }

    fn msg_type(&self) -> u32 {
        self.header.msg_type
    }

    fn is_proto(&self) -> bool {
        true
    }

    fn target_job(&self) -> JobId {
        JobId(self.header.proto.jobid_target())
    }

    fn set_target_job(&mut self, job: JobId) {
        self.header.proto.jobid_target = Some(job.0);
    }

    fn source_job(&self) -> JobId {
        JobId(self.header.proto.jobid_source())
    }

    fn set_source_job(&mut self, job: JobId) {
        self.header.proto.jobid_source = Some(job.0);
    }

    fn write_to(&self, out: &mut BytesMut) {
        self.header.serialize(out);
        out.extend_from_slice(&self.body.encode_to_vec());
    }
}

#[derive(Debug, Clone)]
pub struct GcStructMessage<T> {
    pub app_id: u32,
    pub msg_type: u32,
    pub header: GcStructHeader,
    pub body: T,
}

impl<T: Serializable + fmt::Debug + Send> GcStructMessage<T> {
    pub fn new(app_id: u32, msg_type: u32, body: T) -> Self {
        Self {
            app_id,
            msg_type: msg_type & !PROTO_MASK,
            header: GcStructHeader::default(),
            body,
        }
    }
}

impl<T: Serializable + fmt::Debug + Send> GcMessage for GcStructMessage<T> {
    fn app_id(&self) -> u32 {
        self.app_id
    }

    fn msg_type(&self) -> u32 {
        self.msg_type
    }

    fn is_proto(&self) -> bool {
        false
    }

    fn target_job(&self) -> JobId {
        self.header.target_job
    }

    fn set_target_job(&mut self, job: JobId) {
        self.header.target_job = job;
    }

    fn source_job(&self) -> JobId {
        self.header.source_job
    }

    fn set_source_job(&mut self, job: JobId) {
        self.header.source_job = job;
    }

    fn write_to(&self, out: &mut BytesMut) {
        self.header.serialize(out);
        self.body.serialize(out);
    }
}

/// An inbound GC message, header parsed and body left encoded.
#[derive(Debug, Clone, PartialEq)]
pub struct GcPacket {
    pub app_id: u32,
    pub msg_type: u32,
    pub is_proto: bool,
    pub gc_name: String,
    pub target_job: JobId,
    pub source_job: JobId,
    pub body: Bytes,
}

impl GcPacket {
    /// Unwraps a `ClientFromGC` envelope.
    pub fn new(wrapper: &CMsgGCClient) -> Result<Self> {
        let raw_type = wrapper.msgtype();
        let is_proto = raw_type & PROTO_MASK != 0;
        let mut input = Bytes::copy_from_slice(wrapper.payload());

        let (target_job, source_job) = if is_proto {
            let header = GcProtoHeader::deserialize(&mut input)?;
            (
                JobId(header.proto.jobid_target()),
                JobId(header.proto.jobid_source()),
            )
        } else {
            let header = GcStructHeader::deserialize(&mut input)?;
            (header.target_job, header.source_job)
        };

        Ok(Self {
            app_id: wrapper.appid(),
            msg_type: raw_type & !PROTO_MASK,
            is_proto,
            gc_name: wrapper.gcname().to_string(),
            target_job,
            source_job,
            body: input,
        })
    }

    pub fn read_proto<T: prost::Message + Default>(&self) -> Result<T> {
        if !self.is_proto {
            return Err(ProtocolError::DecodeError(format!(
                "GC message {} is not protobuf-encoded",
                self.msg_type
            )));
        }
        Ok(T::decode(self.body.clone())?)
    }

    pub fn read_struct<T: Serializable>(&self) -> Result<T> {
        if self.is_proto {
            return Err(ProtocolError::DecodeError(format!(
                "GC message {} is protobuf-encoded",
                self.msg_type
            )));
        }
        let mut input = self.body.clone();
        T::deserialize(&mut input)
    }
}

/// Wraps an outbound GC message into the `ClientToGC` envelope body.
pub fn wrap(msg: &dyn GcMessage) -> CMsgGCClient {
    let mut payload = BytesMut::new();
    msg.write_to(&mut payload);
    CMsgGCClient {
        appid: Some(msg.app_id()),
        msgtype: Some(msg.wire_msg_type()),
        payload: Some(payload.to_vec()),
        ..Default::default()
    }
}
