//! # Outbound Messages
//!
//! Every outbound unit implements [`Message`]: a header reachable through
//! the shared [`MessageHeader`] contract plus a body that knows how to
//! write itself. Three shapes are provided:
//!
//! - [`StructMessage`]: pre-login, 20-byte header, fixed-layout body
//! - [`ClientStructMessage`]: post-login, 36-byte header with session fields
//! - [`ProtoMessage`]: protobuf envelope header and protobuf body
//!
//! Struct shapes may carry raw trailing bytes after the body.
//!
//! ## Usage
//! ```rust
//! use steam_protocol::protocol::emsg::EMsg;
//! use steam_protocol::protocol::message::{Message, ProtoMessage};
//! use steam_protocol::protocol::proto::CMsgClientHeartBeat;
//!
//! let msg = ProtoMessage::new(EMsg::ClientHeartBeat, CMsgClientHeartBeat::default());
//! assert!(msg.is_proto());
//! assert_eq!(msg.emsg(), EMsg::ClientHeartBeat);
//! let wire = msg.to_bytes();
//! assert_eq!(&wire[..4], &(703u32 | 0x8000_0000).to_le_bytes());
//! ```

use crate::core::serialization::Serializable;
use crate::protocol::emsg::EMsg;
use crate::protocol::header::{ClientHeader, MessageHeader, ProtoHeader, StructHeader};
use crate::protocol::job::JobId;
use bytes::{Bytes, BytesMut};
use std::fmt;

/// A fixed-layout body tied to one message type.
pub trait MessageBody: Serializable + fmt::Debug + Send + Sync + 'static {
    const EMSG: EMsg;
}

/// An outbound message of any shape.
pub trait Message: Send + fmt::Debug {
    fn header(&self) -> &dyn MessageHeader;
    fn header_mut(&mut self) -> &mut dyn MessageHeader;

    /// Appends header, body and trailing payload to `out`.
    fn write_to(&self, out: &mut BytesMut);

    fn emsg(&self) -> EMsg {
        self.header().emsg()
    }

    fn is_proto(&self) -> bool {
        self.header().is_proto()
    }

    fn to_bytes(&self) -> Bytes {
        let mut out = BytesMut::new();
        self.write_to(&mut out);
        out.freeze()
    }
}

/// Pre-login struct message.
#[derive(Debug, Clone)]
pub struct StructMessage<T> {
    pub header: StructHeader,
    pub body: T,
    pub payload: Bytes,
}

impl<T: MessageBody> StructMessage<T> {
    pub fn new(body: T, payload: impl Into<Bytes>) -> Self {
        Self {
            header: StructHeader::new(T::EMSG),
            body,
            payload: payload.into(),
        }
    }
}

impl<T: MessageBody> Message for StructMessage<T> {
    fn header(&self) -> &dyn MessageHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut dyn MessageHeader {
        &mut self.header
    }

    fn write_to(&self, out: &mut BytesMut) {
        self.header.serialize(out);
        self.body.serialize(out);
        out.extend_from_slice(&self.payload);
    }
}

/// Post-login struct message carrying the session in its header.
#[derive(Debug, Clone)]
pub struct ClientStructMessage<T> {
    pub header: ClientHeader,
    pub body: T,
    pub payload: Bytes,
}

impl<T: MessageBody> ClientStructMessage<T> {
    pub fn new(body: T, payload: impl Into<Bytes>) -> Self {
        Self {
            header: ClientHeader::new(T::EMSG),
            body,
            payload: payload.into(),
        }
    }
}

impl<T: MessageBody> Message for ClientStructMessage<T> {
    fn header(&self) -> &dyn MessageHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut dyn MessageHeader {
        &mut self.header
    }

    fn write_to(&self, out: &mut BytesMut) {
        self.header.serialize(out);
        self.body.serialize(out);
        out.extend_from_slice(&self.payload);
    }
}

/// Protobuf-backed message.
#[derive(Debug, Clone)]
pub struct ProtoMessage<T> {
    pub header: ProtoHeader,
    pub body: T,
}

impl<T: prost::Message + Default> ProtoMessage<T> {
    pub fn new(emsg: EMsg, body: T) -> Self {
        Self {
            header: ProtoHeader::new(emsg),
            body,
        }
    }

    /// Builder form of [`MessageHeader::set_target_job`].
    pub fn with_target_job(mut self, job: JobId) -> Self {
        self.header.set_target_job(job);
        self
    }

    pub fn with_source_job(mut self, job: JobId) -> Self {
        self.header.set_source_job(job);
        self
    }

    /// Routes the message to an app's backend, as GC envelopes require.
    pub fn with_routing_app_id(mut self, app_id: u32) -> Self {
        self.header.proto.routing_appid = Some(app_id);
        self
    }
}

impl<T: prost::Message + Default> Message for ProtoMessage<T> {
    fn header(&self) -> &dyn MessageHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut dyn MessageHeader {
        &mut self.header
    }

    fn write_to(&self, out: &mut BytesMut) {
        self.header.serialize(out);
        out.extend_from_slice(&self.body.encode_to_vec());
    }
}
